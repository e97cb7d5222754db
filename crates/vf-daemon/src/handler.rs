// handler.rs — Orchestrates one generation request end to end.
//
// validate → create workspace → stage scripts and base file → run every
// generator → archive the results → release the workspace.
//
// Key design:
// - Validation happens before anything touches the filesystem
// - The workspace is shared with blocking tasks as Arc<Workspace>; it is
//   released at exactly one explicit point after the pipeline, and by its
//   Drop if this future is cancelled before reaching it
// - The pipeline (staging through archiving) runs under the request
//   deadline; dropping it on expiry kills any generator still running
// - Generator failures never fail the request; they end up in the manifest

use std::sync::Arc;

use axum::http::Method;
use tracing::Instrument;
use vf_archive::{build_archive, collect_entries, ArchiveError, ArchiveOptions, Sidecar};
use vf_generator::{GeneratorRunner, OutcomeManifest, RunnerConfig};
use vf_workspace::{Workspace, WorkspaceError, WorkspaceId};

use crate::config::DaemonConfig;
use crate::error::HandlerError;
use crate::phase::{RequestPhase, RequestRun};
use crate::request::GenerateRequest;
use crate::response::{GenerateResponse, GeneratedArchive};

/// Archive entry name of the optional outcome manifest.
pub const MANIFEST_ENTRY: &str = "manifest.json";

pub struct RequestHandler {
    config: DaemonConfig,
    runner: GeneratorRunner,
}

impl RequestHandler {
    pub fn new(config: DaemonConfig) -> Self {
        let runner = GeneratorRunner::new(RunnerConfig {
            timeout: config.generator_timeout(),
            max_parallel: config.max_parallel,
        });
        Self { config, runner }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub async fn handle(&self, request: GenerateRequest) -> GenerateResponse {
        let id = WorkspaceId::generate();
        let span = tracing::info_span!("generate", request = %id);
        async move {
            let mut run = RequestRun::new(id.as_str());
            let encoding = request.encoding;

            match self.process(&mut run, id, request).await {
                Ok(archive) => {
                    tracing::info!(
                        entries = archive.summary.entries.len(),
                        bytes = archive.bytes.len(),
                        elapsed_ms = run.elapsed_ms(),
                        "request complete"
                    );
                    GenerateResponse::Archive { archive, encoding }
                }
                Err(e) => {
                    if e.status().is_server_error() {
                        tracing::error!(
                            kind = e.kind(),
                            elapsed_ms = run.elapsed_ms(),
                            "request failed: {}",
                            e
                        );
                    } else {
                        tracing::warn!(kind = e.kind(), "request rejected: {}", e);
                    }
                    GenerateResponse::Failure(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(
        &self,
        run: &mut RequestRun,
        id: WorkspaceId,
        request: GenerateRequest,
    ) -> Result<GeneratedArchive, HandlerError> {
        run.advance(RequestPhase::Validating)?;
        if request.method != Method::POST {
            run.advance(RequestPhase::Rejected)?;
            return Err(HandlerError::MethodNotAllowed(request.method.to_string()));
        }
        let payload = match request.body.into_payload() {
            Ok(payload) => payload,
            Err(e) => {
                run.advance(RequestPhase::Rejected)?;
                return Err(e);
            }
        };

        run.advance(RequestPhase::Staging)?;
        let work_root = self.config.work_root.clone();
        let layout = self.config.layout.clone();
        let workspace = match blocking(move || Workspace::create(work_root, id, layout)).await? {
            Ok(workspace) => Arc::new(workspace),
            Err(e) => {
                run.advance(RequestPhase::StagingFailure)?;
                return Err(HandlerError::Workspace(e));
            }
        };

        let deadline = self.config.request_deadline();
        let result =
            match tokio::time::timeout(deadline, self.pipeline(run, &workspace, payload)).await {
                Ok(result) => result,
                Err(_) => Err(HandlerError::DeadlineExceeded(deadline)),
            };
        let result = result.and_then(|archive| {
            run.advance(RequestPhase::Responding)?;
            Ok(archive)
        });

        if let Err(e) = run.advance(RequestPhase::Cleanup) {
            tracing::error!("{}", e);
        }
        release(workspace).await;
        if let Err(e) = run.advance(RequestPhase::Done) {
            tracing::error!("{}", e);
        }

        result
    }

    /// Staging through archiving. Runs under the request deadline.
    async fn pipeline(
        &self,
        run: &mut RequestRun,
        workspace: &Arc<Workspace>,
        payload: Option<Vec<u8>>,
    ) -> Result<GeneratedArchive, HandlerError> {
        let ws = Arc::clone(workspace);
        let scripts_dir = self.config.scripts_dir.clone();
        let default_base = self.config.default_base_path();
        let names: Vec<String> = self
            .config
            .generators
            .iter()
            .map(|g| g.name.clone())
            .collect();
        let (staging, origin) = blocking(move || {
            let staging = ws.stage_generators(names.iter().map(String::as_str), &scripts_dir);
            let origin = ws.stage_base_file(payload.as_deref(), Some(default_base.as_path()))?;
            Ok::<_, WorkspaceError>((staging, origin))
        })
        .await?
        .map_err(HandlerError::Staging)?;

        tracing::info!(
            staged = staging.staged.len(),
            skipped = staging.skipped.len(),
            base = ?origin,
            "workspace staged"
        );

        run.advance(RequestPhase::Running)?;
        let outcomes = self
            .runner
            .run_all(&self.config.generators, &staging, workspace.root())
            .await;
        let manifest = OutcomeManifest::new(workspace.id().as_str(), outcomes);
        tracing::info!(
            succeeded = manifest.succeeded(),
            failed = manifest.failed(),
            skipped = manifest.skipped(),
            "generators finished"
        );

        run.advance(RequestPhase::Archiving)?;
        let sidecar = if self.config.include_manifest {
            let json = manifest
                .to_json_pretty()
                .map_err(|e| HandlerError::Internal(format!("cannot serialize manifest: {}", e)))?;
            Some(Sidecar {
                name: MANIFEST_ENTRY.to_string(),
                bytes: json.into_bytes(),
            })
        } else {
            None
        };
        let options = ArchiveOptions {
            sidecar,
            ..ArchiveOptions::default()
        };

        let ws = Arc::clone(workspace);
        let archived = blocking(move || {
            let entries = collect_entries(&ws.results_dir())?;
            let summary = build_archive(&entries, &ws.archive_path(), &options)?;
            let bytes = summary.load()?;
            Ok::<_, ArchiveError>((summary, bytes))
        })
        .await?;

        match archived {
            Ok((summary, bytes)) => Ok(GeneratedArchive {
                bytes,
                manifest,
                summary,
                download_name: self.config.download_name.clone(),
            }),
            Err(e) => {
                run.advance(RequestPhase::ArchiveFailure)?;
                Err(HandlerError::Archive(e))
            }
        }
    }
}

/// Destroy the workspace. Failures are logged; the response stands.
async fn release(workspace: Arc<Workspace>) {
    let id = workspace.id().clone();
    match blocking(move || workspace.destroy()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!(workspace = %id, "workspace cleanup failed: {}", e),
        Err(e) => tracing::error!(workspace = %id, "workspace cleanup did not run: {}", e),
    }
}

/// Run filesystem work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, HandlerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| HandlerError::Internal(format!("blocking task failed: {}", e)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::request::RequestBody;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use vf_generator::GeneratorSpec;

    struct Env {
        scripts: TempDir,
        work: TempDir,
    }

    impl Env {
        fn new(scripts: &[(&str, &str)]) -> Self {
            let env = Self {
                scripts: tempdir().unwrap(),
                work: tempdir().unwrap(),
            };
            for (name, body) in scripts {
                fs::write(env.scripts.path().join(name), body).unwrap();
            }
            env
        }

        fn config(&self, names: &[&str]) -> DaemonConfig {
            DaemonConfig {
                scripts_dir: self.scripts.path().to_path_buf(),
                work_root: self.work.path().to_path_buf(),
                generators: names
                    .iter()
                    .map(|n| GeneratorSpec::new(*n).with_interpreter("sh"))
                    .collect(),
                ..DaemonConfig::default()
            }
        }

        fn workspaces_left(&self) -> usize {
            count_entries(self.work.path())
        }
    }

    fn count_entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn non_post_is_rejected_without_workspace() {
        let env = Env::new(&[("a.sh", "exit 0\n")]);
        let handler = RequestHandler::new(env.config(&["a.sh"]));

        let mut request = GenerateRequest::post(RequestBody::Raw(b"x".to_vec()));
        request.method = Method::GET;
        let response = handler.handle(request).await;

        assert_eq!(response.status().as_u16(), 405);
        assert_eq!(response.error().unwrap().kind(), "validation_error");
        assert_eq!(env.workspaces_left(), 0);
    }

    #[tokio::test]
    async fn missing_base_file_cleans_up() {
        let env = Env::new(&[("a.sh", "exit 0\n")]);
        let handler = RequestHandler::new(env.config(&["a.sh"]));

        let response = handler.handle(GenerateRequest::post(RequestBody::Empty)).await;

        assert!(matches!(
            response.error(),
            Some(HandlerError::Staging(WorkspaceError::BaseFileMissing { .. }))
        ));
        assert_eq!(env.workspaces_left(), 0);
    }

    #[tokio::test]
    async fn default_base_file_used_for_empty_body() {
        let env = Env::new(&[("copy.sh", "cp nepastoucher.xlsx résultats/copy.xlsx\n")]);
        let base_dir = env.scripts.path().join("fichier de base");
        fs::create_dir_all(&base_dir).unwrap();
        fs::write(base_dir.join("nepastoucher.xlsx"), b"default sheet").unwrap();
        let handler = RequestHandler::new(env.config(&["copy.sh"]));

        let response = handler.handle(GenerateRequest::post(RequestBody::Empty)).await;

        let archive = response.archive().expect("archive");
        let entries = vf_archive::read_entries(&archive.bytes).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bytes, b"default sheet");
    }

    #[tokio::test]
    async fn manifest_sidecar_included_when_enabled() {
        let env = Env::new(&[("ok.sh", "echo hi > résultats/hi.txt\n"), ("bad.sh", "exit 2\n")]);
        let mut config = env.config(&["ok.sh", "bad.sh", "gone.sh"]);
        config.include_manifest = true;
        let handler = RequestHandler::new(config);

        let response = handler
            .handle(GenerateRequest::post(RequestBody::Raw(b"base".to_vec())))
            .await;

        let archive = response.archive().expect("archive");
        assert_eq!(archive.manifest.succeeded(), 1);
        assert_eq!(archive.manifest.failed(), 1);
        assert_eq!(archive.manifest.skipped(), 1);

        let entries = vf_archive::read_entries(&archive.bytes).unwrap();
        let manifest = entries
            .iter()
            .find(|e| e.name == MANIFEST_ENTRY)
            .expect("manifest entry");
        let parsed: OutcomeManifest = serde_json::from_slice(&manifest.bytes).unwrap();
        assert_eq!(parsed.outcomes.len(), 3);
        assert_eq!(parsed.outcomes[2].script, "gone.sh");
        assert_eq!(env.workspaces_left(), 0);
    }

    #[tokio::test]
    async fn deadline_exceeded_still_releases_workspace() {
        let env = Env::new(&[("hang.sh", "sleep 30\n")]);
        let mut config = env.config(&["hang.sh"]);
        config.request_deadline_secs = 1;
        let handler = RequestHandler::new(config);

        let started = std::time::Instant::now();
        let response = handler
            .handle(GenerateRequest::post(RequestBody::Raw(b"base".to_vec())))
            .await;

        assert!(started.elapsed() < Duration::from_secs(15));
        assert_eq!(response.error().unwrap().kind(), "deadline_exceeded");
        assert_eq!(env.workspaces_left(), 0);
    }

    #[tokio::test]
    async fn cancelled_request_releases_workspace_and_kills_generator() {
        let markers = tempdir().unwrap();
        let started = markers.path().join("started");
        let late = markers.path().join("late");
        let script = format!(
            "touch '{}'\n(sleep 1; touch '{}') >/dev/null 2>&1 </dev/null &\nsleep 30\n",
            started.display(),
            late.display()
        );
        let env = Env::new(&[("hang.sh", script.as_str())]);
        let handler = Arc::new(RequestHandler::new(env.config(&["hang.sh"])));

        let task = tokio::spawn({
            let handler = Arc::clone(&handler);
            async move {
                handler
                    .handle(GenerateRequest::post(RequestBody::Raw(b"base".to_vec())))
                    .await
            }
        });
        for _ in 0..100 {
            if started.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(started.exists(), "generator never started");
        assert_eq!(env.workspaces_left(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(env.workspaces_left(), 0);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!late.exists(), "generator outlived its request");
    }

    #[tokio::test]
    async fn unusable_work_root_is_a_workspace_error() {
        let env = Env::new(&[("a.sh", "exit 0\n")]);
        let blocker = env.work.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let mut config = env.config(&["a.sh"]);
        config.work_root = blocker;
        let handler = RequestHandler::new(config);

        let response = handler
            .handle(GenerateRequest::post(RequestBody::Raw(b"base".to_vec())))
            .await;
        assert!(matches!(response.error(), Some(HandlerError::Workspace(_))));
    }
}
