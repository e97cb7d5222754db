// logging.rs — tracing subscriber setup shared by the binaries.
//
// Logs go to stderr. RUST_LOG adds to (and can override) the defaults.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &[&str] = &[
    "vf_daemon=info",
    "vf_generator=info",
    "vf_workspace=info",
    "vf_archive=info",
];

/// Install the global subscriber. `json` switches to one JSON object per line.
pub fn init(json: bool) -> Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("cannot install logger: {}", e))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("cannot install logger: {}", e))
    }
}
