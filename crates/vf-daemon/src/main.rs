//! # vf-daemon
//!
//! Standalone generation server.
//!
//! ```text
//! vf-daemon --config vf.toml --bind 0.0.0.0:8787
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use vf_daemon::{ConfigOverrides, DaemonConfig, DEFAULT_CONFIG_FILE};

/// variant-forge generation server.
#[derive(Parser)]
#[command(name = "vf-daemon", about = "variant-forge generation server")]
struct Cli {
    /// Config file (defaults apply when it does not exist).
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listen address, e.g. 127.0.0.1:8787.
    #[arg(long)]
    bind: Option<String>,

    /// Directory holding the generator scripts.
    #[arg(long)]
    scripts_dir: Option<PathBuf>,

    /// Parent directory for per-request workspaces.
    #[arg(long)]
    work_root: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    vf_daemon::logging::init(cli.log_json)?;

    let mut config = DaemonConfig::load_or_default(&cli.config)?;
    config.apply(ConfigOverrides {
        bind: cli.bind,
        scripts_dir: cli.scripts_dir,
        work_root: cli.work_root,
    });

    tracing::info!("Starting variant-forge daemon");
    tracing::info!("Scripts directory: {}", config.scripts_dir.display());
    vf_daemon::serve(config).await
}
