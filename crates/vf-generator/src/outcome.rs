// outcome.rs — Per-generator results and the manifest that aggregates them.
//
// Every allow-listed generator yields exactly one GenerationOutcome, even
// when it was never run. A failure is data here, not an error: the request
// carries on and the manifest records what happened.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a single generator fared.
///
/// Serializes as `{"status": "failed", "reason": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Exited with status 0.
    Success,

    /// Ran but did not succeed: non-zero exit, signal, spawn error, or timeout.
    Failed { reason: String },

    /// Never ran (not found at staging time, bad name, copy failure).
    Skipped { reason: String },
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Failed { .. } => write!(f, "failed"),
            OutcomeStatus::Skipped { .. } => write!(f, "skipped"),
        }
    }
}

/// Result of one attempted generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Allow-list name of the generator.
    pub script: String,

    #[serde(flatten)]
    pub status: OutcomeStatus,

    /// Wall-clock run time. Absent for skipped generators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Process exit code, when the process exited normally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl GenerationOutcome {
    pub fn success(script: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            script: script.into(),
            status: OutcomeStatus::Success,
            duration_ms: Some(duration_ms),
            exit_code: Some(0),
        }
    }

    pub fn failed(
        script: impl Into<String>,
        reason: impl Into<String>,
        duration_ms: Option<u64>,
        exit_code: Option<i32>,
    ) -> Self {
        Self {
            script: script.into(),
            status: OutcomeStatus::Failed {
                reason: reason.into(),
            },
            duration_ms,
            exit_code,
        }
    }

    pub fn skipped(script: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            status: OutcomeStatus::Skipped {
                reason: reason.into(),
            },
            duration_ms: None,
            exit_code: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success)
    }
}

/// All outcomes for one request, in allow-list order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeManifest {
    /// Workspace (and request) the outcomes belong to.
    pub workspace_id: String,

    /// When the last generator finished.
    pub completed_at: DateTime<Utc>,

    pub outcomes: Vec<GenerationOutcome>,
}

impl OutcomeManifest {
    pub fn new(workspace_id: impl Into<String>, outcomes: Vec<GenerationOutcome>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            completed_at: Utc::now(),
            outcomes,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Success))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped { .. }))
    }

    /// True when every allow-listed generator succeeded.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(GenerationOutcome::is_success)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}
