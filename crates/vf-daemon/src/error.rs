// error.rs — Request-level errors and their HTTP mapping.
//
// Only errors that end a request live here. A generator that fails or a
// script that is missing is recorded in the outcome manifest instead.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;
use vf_archive::ArchiveError;
use vf_workspace::WorkspaceError;

use crate::phase::PhaseError;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// Anything but POST. Rejected before any workspace exists.
    #[error("method not allowed")]
    MethodNotAllowed(String),

    /// Body or query string could not be decoded (bad base64, malformed
    /// multipart, duplicate query keys).
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Body exceeds the configured upload limit.
    #[error("request body too large")]
    PayloadTooLarge,

    /// The per-request workspace could not be created.
    #[error("cannot create workspace: {0}")]
    Workspace(#[source] WorkspaceError),

    /// The workspace exists but the base file could not be placed in it.
    #[error("cannot stage base file: {0}")]
    Staging(#[source] WorkspaceError),

    #[error("cannot build archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("request deadline of {}s exceeded", .0.as_secs())]
    DeadlineExceeded(Duration),

    /// The request lifecycle was driven out of order.
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Stable machine-readable kind, sent as `"kind"` in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::MethodNotAllowed(_) => "validation_error",
            HandlerError::InvalidBody(_) => "invalid_body",
            HandlerError::PayloadTooLarge => "payload_too_large",
            HandlerError::Workspace(_) | HandlerError::Staging(_) => "workspace_error",
            HandlerError::Archive(_) => "archive_error",
            HandlerError::DeadlineExceeded(_) => "deadline_exceeded",
            HandlerError::Phase(_) | HandlerError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            HandlerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_statuses() {
        let cases = [
            (
                HandlerError::MethodNotAllowed("GET".into()),
                "validation_error",
                405,
            ),
            (HandlerError::InvalidBody("x".into()), "invalid_body", 400),
            (HandlerError::PayloadTooLarge, "payload_too_large", 413),
            (
                HandlerError::Staging(WorkspaceError::BaseFileMissing {
                    searched: "x".into(),
                }),
                "workspace_error",
                500,
            ),
            (
                HandlerError::DeadlineExceeded(Duration::from_secs(600)),
                "deadline_exceeded",
                500,
            ),
            (HandlerError::Internal("x".into()), "internal_error", 500),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status().as_u16(), status);
        }
    }

    #[test]
    fn method_not_allowed_message_is_fixed() {
        assert_eq!(
            HandlerError::MethodNotAllowed("PUT".into()).to_string(),
            "method not allowed"
        );
        assert_eq!(
            HandlerError::DeadlineExceeded(Duration::from_secs(5)).to_string(),
            "request deadline of 5s exceeded"
        );
    }
}
