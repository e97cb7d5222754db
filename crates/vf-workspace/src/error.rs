// error.rs — Error types for the workspace subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The per-request directory could not be created. Nothing exists on
    /// disk yet, so there is nothing to clean up.
    #[error("cannot create workspace at {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file I/O operation failed inside an existing workspace.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No base file was uploaded and no default base file is available.
    #[error("no base file: nothing uploaded and no default base file at {searched}")]
    BaseFileMissing { searched: String },

    /// A layout entry is not a single plain path component.
    #[error("invalid workspace layout: {field} = '{value}' must be a single path component")]
    InvalidLayout { field: &'static str, value: String },

    /// A workspace id contains characters outside `[0-9a-z-]`.
    #[error("invalid workspace id: '{0}'")]
    InvalidId(String),
}
