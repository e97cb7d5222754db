// error.rs — Error types for the archive builder.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while scanning results or writing the archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem I/O failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip writer or reader rejected the data.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
