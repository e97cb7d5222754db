// runner.rs — Best-effort execution of staged generators.
//
// Each staged generator runs as its own child process with the workspace
// root as working directory. A failing, crashing, or hanging generator is
// recorded and the batch moves on; nothing here aborts the request.
//
// Key design:
// - One outcome per allow-list entry, always in allow-list order
// - Per-generator timeout; on expiry the child is killed (kill_on_drop)
// - On unix each generator leads its own process group, and the group is
//   killed once the generator finishes, times out, or is cancelled, so
//   nothing it spawned outlives it
// - `max_parallel = 1` runs generators one after another; larger values
//   run them on a semaphore-bounded JoinSet
// - `run_all` returns only after every invocation has finished, so the
//   results directory is quiescent when the caller reads it

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use vf_workspace::{GeneratorScript, StagingReport};

use crate::allow_list::GeneratorSpec;
use crate::outcome::GenerationOutcome;

/// Environment variable carrying the workspace root to every generator.
pub const WORKSPACE_ENV: &str = "VF_WORKSPACE";

/// Diagnostics kept from a failing generator's stderr.
const MAX_DIAGNOSTIC_BYTES: usize = 2048;

/// Runner settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Wall-clock limit for a single generator.
    pub timeout: Duration,

    /// How many generators may run at once. 0 is treated as 1.
    pub max_parallel: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_parallel: 1,
        }
    }
}

/// Runs staged generators against a workspace.
#[derive(Debug, Clone, Default)]
pub struct GeneratorRunner {
    config: RunnerConfig,
}

/// One generator ready to run, with its slot in the allow-list.
struct Invocation {
    slot: usize,
    script: GeneratorScript,
    interpreter: Option<String>,
}

/// Outcomes gathered from concurrent tasks, indexed by allow-list slot.
#[derive(Clone)]
struct OutcomeCollector {
    slots: Arc<Mutex<Vec<Option<GenerationOutcome>>>>,
}

impl OutcomeCollector {
    fn new(len: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(vec![None; len])),
        }
    }

    fn record(&self, slot: usize, outcome: GenerationOutcome) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots[slot] = Some(outcome);
    }

    /// Ordered outcomes. A slot nobody filled belongs to a task that
    /// panicked before recording.
    fn into_outcomes(self, specs: &[GeneratorSpec]) -> Vec<GenerationOutcome> {
        let slots = match Arc::try_unwrap(self.slots) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|e| e.into_inner()),
            Err(shared) => shared.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        };
        slots
            .into_iter()
            .zip(specs)
            .map(|(outcome, spec)| {
                outcome.unwrap_or_else(|| {
                    GenerationOutcome::failed(&spec.name, "generator task panicked", None, None)
                })
            })
            .collect()
    }
}

impl GeneratorRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every staged generator and return one outcome per allow-list
    /// entry. Generators that staging skipped come back as `Skipped`
    /// without being run.
    pub async fn run_all(
        &self,
        specs: &[GeneratorSpec],
        staging: &StagingReport,
        workspace_root: &Path,
    ) -> Vec<GenerationOutcome> {
        let collector = OutcomeCollector::new(specs.len());
        let mut invocations = Vec::new();

        for (slot, spec) in specs.iter().enumerate() {
            match staging.script(&spec.name) {
                Some(script) => invocations.push(Invocation {
                    slot,
                    script: script.clone(),
                    interpreter: spec.interpreter.clone(),
                }),
                None => {
                    let reason = staging.skip_reason(&spec.name).unwrap_or("not staged");
                    collector.record(slot, GenerationOutcome::skipped(&spec.name, reason));
                }
            }
        }

        let parallel = self.config.max_parallel.max(1);
        if parallel == 1 {
            for inv in invocations {
                let outcome = invoke(
                    &inv.script,
                    inv.interpreter.as_deref(),
                    workspace_root,
                    self.config.timeout,
                )
                .await;
                collector.record(inv.slot, outcome);
            }
        } else {
            self.run_pooled(invocations, workspace_root, parallel, &collector)
                .await;
        }

        collector.into_outcomes(specs)
    }

    async fn run_pooled(
        &self,
        invocations: Vec<Invocation>,
        workspace_root: &Path,
        parallel: usize,
        collector: &OutcomeCollector,
    ) {
        let permits = Arc::new(Semaphore::new(parallel));
        let mut tasks = JoinSet::new();

        for inv in invocations {
            let permits = Arc::clone(&permits);
            let collector = collector.clone();
            let root: PathBuf = workspace_root.to_path_buf();
            let timeout = self.config.timeout;
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it were.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let outcome = invoke(&inv.script, inv.interpreter.as_deref(), &root, timeout).await;
                collector.record(inv.slot, outcome);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("generator task failed to complete: {}", e);
            }
        }
    }
}

/// Run one generator to completion (or timeout) and classify the result.
async fn invoke(
    script: &GeneratorScript,
    interpreter: Option<&str>,
    workspace_root: &Path,
    timeout: Duration,
) -> GenerationOutcome {
    let mut cmd = match interpreter {
        Some(program) => {
            let mut cmd = Command::new(program);
            cmd.arg(&script.staged);
            cmd
        }
        None => Command::new(&script.staged),
    };
    cmd.current_dir(workspace_root)
        .env("PYTHONPATH", workspace_root)
        .env(WORKSPACE_ENV, workspace_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    tracing::debug!(script = %script.name, "starting generator");

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(script = %script.name, "generator failed to spawn: {}", e);
            return GenerationOutcome::failed(
                &script.name,
                format!("failed to spawn: {}", e),
                None,
                None,
            );
        }
    };

    let _group = ProcessGroup {
        leader: child.id(),
    };
    let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
    let elapsed = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            tracing::info!(script = %script.name, duration_ms = elapsed, "generator succeeded");
            GenerationOutcome::success(&script.name, elapsed)
        }
        Ok(Ok(output)) => {
            let code = output.status.code();
            let status = match code {
                Some(c) => format!("exit status {}", c),
                None => "terminated by signal".to_string(),
            };
            let tail = diagnostic_tail(&output.stderr);
            tracing::warn!(
                script = %script.name,
                duration_ms = elapsed,
                "generator failed: {}",
                status
            );
            if !tail.is_empty() {
                tracing::debug!(script = %script.name, "generator stderr: {}", tail);
            }
            let reason = if tail.is_empty() {
                status
            } else {
                format!("{}: {}", status, tail)
            };
            GenerationOutcome::failed(&script.name, reason, Some(elapsed), code)
        }
        Ok(Err(e)) => {
            tracing::warn!(script = %script.name, "failed to wait for generator: {}", e);
            GenerationOutcome::failed(
                &script.name,
                format!("failed to wait: {}", e),
                Some(elapsed),
                None,
            )
        }
        Err(_) => {
            // The child was owned by the dropped future; kill_on_drop reaps it
            // and the group guard takes whatever it left behind.
            tracing::warn!(
                script = %script.name,
                timeout_secs = timeout.as_secs(),
                "generator timed out"
            );
            GenerationOutcome::failed(&script.name, "timeout", Some(elapsed), None)
        }
    }
}

/// The process group a generator leads. Dropping it kills every member
/// still alive, so a generator's background children cannot keep writing
/// into the workspace after its outcome is recorded.
struct ProcessGroup {
    leader: Option<u32>,
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pid) = self.leader {
            kill_group(pid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        // ESRCH: the group is already empty.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid, "failed to kill generator process group: {}", e),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Last `MAX_DIAGNOSTIC_BYTES` of stderr, trimmed, lossily decoded.
fn diagnostic_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(MAX_DIAGNOSTIC_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::outcome::OutcomeStatus;
    use std::fs;
    use tempfile::tempdir;
    use vf_workspace::{Workspace, WorkspaceId, WorkspaceLayout};

    struct Fixture {
        _work: tempfile::TempDir,
        scripts: tempfile::TempDir,
        workspace: Workspace,
    }

    fn fixture() -> Fixture {
        let work = tempdir().unwrap();
        let scripts = tempdir().unwrap();
        let workspace =
            Workspace::create(work.path(), WorkspaceId::generate(), WorkspaceLayout::default())
                .unwrap();
        Fixture {
            _work: work,
            scripts,
            workspace,
        }
    }

    impl Fixture {
        fn script(&self, name: &str, body: &str) -> GeneratorSpec {
            fs::write(self.scripts.path().join(name), body).unwrap();
            GeneratorSpec::new(name).with_interpreter("sh")
        }

        fn stage(&self, specs: &[GeneratorSpec]) -> StagingReport {
            self.workspace
                .stage_generators(specs.iter().map(|s| s.name.as_str()), self.scripts.path())
        }
    }

    #[tokio::test]
    async fn failure_is_isolated_and_batch_continues() {
        let fx = fixture();
        let specs = vec![
            fx.script("first.sh", "echo one > résultats/one.txt\n"),
            fx.script("broken.sh", "echo 'bad input' >&2\nexit 3\n"),
            fx.script("third.sh", "echo three > résultats/three.txt\n"),
        ];
        let staging = fx.stage(&specs);

        let outcomes = GeneratorRunner::default()
            .run_all(&specs, &staging, fx.workspace.root())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].exit_code, Some(3));
        match &outcomes[1].status {
            OutcomeStatus::Failed { reason } => {
                assert!(reason.starts_with("exit status 3"));
                assert!(reason.contains("bad input"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(outcomes[2].is_success());
        assert!(fx.workspace.results_dir().join("one.txt").exists());
        assert!(fx.workspace.results_dir().join("three.txt").exists());
    }

    #[tokio::test]
    async fn skipped_generators_keep_their_slot() {
        let fx = fixture();
        let present = fx.script("present.sh", "exit 0\n");
        let specs = vec![
            GeneratorSpec::new("missing.sh").with_interpreter("sh"),
            present,
        ];
        let staging = fx.stage(&specs);

        let outcomes = GeneratorRunner::default()
            .run_all(&specs, &staging, fx.workspace.root())
            .await;

        assert_eq!(outcomes[0].script, "missing.sh");
        assert!(matches!(outcomes[0].status, OutcomeStatus::Skipped { .. }));
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn hanging_generator_times_out() {
        let fx = fixture();
        let specs = vec![
            fx.script("hang.sh", "sleep 30\n"),
            fx.script("quick.sh", "exit 0\n"),
        ];
        let staging = fx.stage(&specs);
        let runner = GeneratorRunner::new(RunnerConfig {
            timeout: Duration::from_millis(300),
            max_parallel: 1,
        });

        let started = Instant::now();
        let outcomes = runner.run_all(&specs, &staging, fx.workspace.root()).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(
            outcomes[0].status,
            OutcomeStatus::Failed {
                reason: "timeout".to_string()
            }
        );
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn timeout_kills_background_writers() {
        let fx = fixture();
        let specs = vec![fx.script(
            "spawner.sh",
            "(sleep 1; echo late > résultats/late.txt) >/dev/null 2>&1 </dev/null &\n\
             sleep 30\n",
        )];
        let staging = fx.stage(&specs);
        let runner = GeneratorRunner::new(RunnerConfig {
            timeout: Duration::from_millis(300),
            max_parallel: 1,
        });

        let outcomes = runner.run_all(&specs, &staging, fx.workspace.root()).await;
        assert_eq!(
            outcomes[0].status,
            OutcomeStatus::Failed {
                reason: "timeout".to_string()
            }
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(fs::read_dir(fx.workspace.results_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn finished_generator_leaves_no_stragglers() {
        let fx = fixture();
        let specs = vec![fx.script(
            "detach.sh",
            "(sleep 1; echo late > résultats/late.txt) >/dev/null 2>&1 </dev/null &\n\
             echo now > résultats/now.txt\n",
        )];
        let staging = fx.stage(&specs);

        let outcomes = GeneratorRunner::default()
            .run_all(&specs, &staging, fx.workspace.root())
            .await;
        assert!(outcomes[0].is_success(), "{:?}", outcomes[0]);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(fx.workspace.results_dir().join("now.txt").exists());
        assert!(!fx.workspace.results_dir().join("late.txt").exists());
    }

    #[tokio::test]
    async fn generators_see_workspace_root() {
        let fx = fixture();
        let specs = vec![fx.script(
            "env.sh",
            "test \"$(pwd -P)\" = \"$(cd \"$VF_WORKSPACE\" && pwd -P)\" || exit 9\n\
             test -f nepastoucher.xlsx || exit 8\n\
             test \"$PYTHONPATH\" = \"$VF_WORKSPACE\" || exit 7\n",
        )];
        fx.workspace.stage_base_file(Some(b"base"), None).unwrap();
        let staging = fx.stage(&specs);

        let outcomes = GeneratorRunner::default()
            .run_all(&specs, &staging, fx.workspace.root())
            .await;
        assert!(outcomes[0].is_success(), "{:?}", outcomes[0]);
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_failure_not_a_panic() {
        let fx = fixture();
        fs::write(fx.scripts.path().join("x.py"), "print(1)").unwrap();
        let specs =
            vec![GeneratorSpec::new("x.py").with_interpreter("definitely-not-a-real-interpreter")];
        let staging = fx.stage(&specs);

        let outcomes = GeneratorRunner::default()
            .run_all(&specs, &staging, fx.workspace.root())
            .await;
        match &outcomes[0].status {
            OutcomeStatus::Failed { reason } => assert!(reason.starts_with("failed to spawn")),
            other => panic!("expected spawn failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pooled_run_keeps_allow_list_order() {
        let fx = fixture();
        let specs = vec![
            fx.script("slow.sh", "sleep 0.4\necho s > résultats/slow.txt\n"),
            fx.script("fail.sh", "exit 1\n"),
            fx.script("fast.sh", "echo f > résultats/fast.txt\n"),
        ];
        let staging = fx.stage(&specs);
        let runner = GeneratorRunner::new(RunnerConfig {
            timeout: Duration::from_secs(10),
            max_parallel: 3,
        });

        let outcomes = runner.run_all(&specs, &staging, fx.workspace.root()).await;

        let names: Vec<&str> = outcomes.iter().map(|o| o.script.as_str()).collect();
        assert_eq!(names, ["slow.sh", "fail.sh", "fast.sh"]);
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert!(outcomes[2].is_success());
        // run_all only returns once the slow writer is done.
        assert!(fx.workspace.results_dir().join("slow.txt").exists());
    }

    #[tokio::test]
    async fn direct_executable_runs_without_interpreter() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        let path = fx.scripts.path().join("direct");
        fs::write(&path, "#!/bin/sh\necho ok > résultats/direct.txt\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        let specs = vec![GeneratorSpec::new("direct")];
        let staging = fx.stage(&specs);

        let outcomes = GeneratorRunner::default()
            .run_all(&specs, &staging, fx.workspace.root())
            .await;
        assert!(outcomes[0].is_success(), "{:?}", outcomes[0]);
    }

    #[test]
    fn diagnostic_tail_keeps_the_end() {
        let mut stderr = vec![b'x'; 5000];
        stderr.extend_from_slice(b"final line\n");
        let tail = diagnostic_tail(&stderr);
        assert!(tail.len() <= MAX_DIAGNOSTIC_BYTES);
        assert!(tail.ends_with("final line"));
    }
}
