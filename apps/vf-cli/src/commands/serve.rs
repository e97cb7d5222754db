// serve.rs — Start the HTTP server.
//
// Same as running vf-daemon, under the operator CLI.

use vf_daemon::DaemonConfig;

pub fn execute(config: DaemonConfig) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(vf_daemon::serve(config))
}
