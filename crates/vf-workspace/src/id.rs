// id.rs — Workspace identifiers.
//
// An id is `<unix millis>-<16 hex digit nonce>`. The timestamp keeps ids
// roughly sortable in a shared work root; the nonce separates requests that
// arrive in the same millisecond. Ids double as directory names, so they are
// restricted to `[0-9a-z-]`.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

/// Unique identifier for one request's workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Generate a fresh id from the current time and a random nonce.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let nonce: u64 = rand::random();
        Self(format!("{}-{:016x}", millis, nonce))
    }

    /// Parse an existing id, rejecting anything that is not a safe
    /// single directory name.
    pub fn parse(value: impl Into<String>) -> Result<Self, WorkspaceError> {
        let value = value.into();
        let valid = !value.is_empty()
            && !value.starts_with('-')
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == '-');
        if !valid {
            return Err(WorkspaceError::InvalidId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_distinct() {
        let ids: HashSet<WorkspaceId> = (0..500).map(|_| WorkspaceId::generate()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn generated_id_round_trips_through_parse() {
        let id = WorkspaceId::generate();
        let parsed = WorkspaceId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn generated_id_has_timestamp_and_nonce() {
        let id = WorkspaceId::generate();
        let (millis, nonce) = id.as_str().split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(nonce.len(), 16);
    }

    #[test]
    fn parse_rejects_path_like_values() {
        for bad in ["", "../escape", "a/b", "UPPER", "-leading", "sp ace"] {
            assert!(
                matches!(WorkspaceId::parse(bad), Err(WorkspaceError::InvalidId(_))),
                "accepted {bad:?}"
            );
        }
    }
}
