// phase.rs — Lifecycle of one generation request.
//
// The happy path is linear:
//
//   Idle → Validating → Staging → Running → Archiving → Responding → Cleanup → Done
//
// Failure exits: Validating → Rejected (nothing was created),
// Staging → StagingFailure (workspace creation failed, nothing to clean up),
// Archiving → ArchiveFailure → Cleanup. Any phase that owns a workspace may
// jump straight to Cleanup when the request ends early.

use std::fmt;
use std::time::Instant;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Validating,
    Rejected,
    Staging,
    StagingFailure,
    Running,
    Archiving,
    ArchiveFailure,
    Responding,
    Cleanup,
    Done,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestPhase::Idle => "idle",
            RequestPhase::Validating => "validating",
            RequestPhase::Rejected => "rejected",
            RequestPhase::Staging => "staging",
            RequestPhase::StagingFailure => "staging_failure",
            RequestPhase::Running => "running",
            RequestPhase::Archiving => "archiving",
            RequestPhase::ArchiveFailure => "archive_failure",
            RequestPhase::Responding => "responding",
            RequestPhase::Cleanup => "cleanup",
            RequestPhase::Done => "done",
        };
        f.write_str(name)
    }
}

impl RequestPhase {
    pub fn can_transition_to(&self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Rejected)
                | (Validating, Staging)
                | (Staging, Running)
                | (Staging, StagingFailure)
                | (Staging, Cleanup)
                | (Running, Archiving)
                | (Running, Cleanup)
                | (Archiving, Responding)
                | (Archiving, ArchiveFailure)
                | (Archiving, Cleanup)
                | (ArchiveFailure, Cleanup)
                | (Responding, Cleanup)
                | (Cleanup, Done)
        )
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestPhase::Rejected | RequestPhase::StagingFailure | RequestPhase::Done
        )
    }
}

#[derive(Debug, Error)]
#[error("request {request_id}: invalid phase transition {from} -> {to}")]
pub struct PhaseError {
    pub request_id: String,
    pub from: RequestPhase,
    pub to: RequestPhase,
}

/// Phase tracker for one request.
#[derive(Debug)]
pub struct RequestRun {
    request_id: String,
    phase: RequestPhase,
    started: Instant,
}

impl RequestRun {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            phase: RequestPhase::Idle,
            started: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn advance(&mut self, next: RequestPhase) -> Result<(), PhaseError> {
        if !self.phase.can_transition_to(next) {
            return Err(PhaseError {
                request_id: self.request_id.clone(),
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(
            request = %self.request_id,
            from = %self.phase,
            to = %next,
            "phase transition"
        );
        self.phase = next;
        Ok(())
    }
}
