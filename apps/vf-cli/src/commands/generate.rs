// generate.rs — One generation run without the HTTP server.
//
// Goes through the same RequestHandler as a POST, so the workspace,
// staging, timeouts and cleanup behave exactly as they do when serving.

use std::fs;
use std::path::Path;

use anyhow::Context;
use vf_daemon::{DaemonConfig, GenerateRequest, GenerateResponse, RequestBody, RequestHandler};
use vf_generator::OutcomeStatus;

pub fn execute(config: DaemonConfig, input: Option<&Path>, output: &Path) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    fs::create_dir_all(&config.work_root)
        .with_context(|| format!("cannot create work root {}", config.work_root.display()))?;

    // An empty body means "use the default base file"; a named input that
    // happens to be empty must not fall through to it.
    let body = match input {
        Some(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
            if bytes.is_empty() {
                anyhow::bail!("input file {} is empty", path.display());
            }
            RequestBody::Raw(bytes)
        }
        None => RequestBody::Empty,
    };

    let handler = RequestHandler::new(config);
    let rt = tokio::runtime::Runtime::new()?;
    let response = rt.block_on(handler.handle(GenerateRequest::post(body)));

    let archive = match response {
        GenerateResponse::Archive { archive, .. } => archive,
        GenerateResponse::Failure(e) => {
            return Err(anyhow::Error::new(e).context("generation failed"));
        }
    };

    for outcome in &archive.manifest.outcomes {
        match &outcome.status {
            OutcomeStatus::Success => println!(
                "  ok       {} ({} ms)",
                outcome.script,
                outcome.duration_ms.unwrap_or_default()
            ),
            OutcomeStatus::Failed { reason } => {
                println!("  failed   {}: {}", outcome.script, reason)
            }
            OutcomeStatus::Skipped { reason } => {
                println!("  skipped  {}: {}", outcome.script, reason)
            }
        }
    }

    fs::write(output, &archive.bytes)
        .with_context(|| format!("cannot write {}", output.display()))?;
    tracing::debug!("archive written to {}", output.display());

    println!(
        "Wrote {} ({} files, {} bytes; {} succeeded, {} failed, {} skipped)",
        output.display(),
        archive.summary.entries.len(),
        archive.bytes.len(),
        archive.manifest.succeeded(),
        archive.manifest.failed(),
        archive.manifest.skipped()
    );
    Ok(())
}
