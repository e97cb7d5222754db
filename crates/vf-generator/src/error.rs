// error.rs — Error types for the generator subsystem.
//
// Running generators never produces an error: every failure is recorded
// as an outcome. These errors cover a malformed allow-list only.

use thiserror::Error;

/// Errors in the generator allow-list.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The allow-list has no entries.
    #[error("generator allow-list is empty")]
    EmptyAllowList,

    /// A generator name is not a single plain file name.
    #[error("invalid generator name: '{0}'")]
    InvalidName(String),

    /// The same generator appears twice.
    #[error("duplicate generator in allow-list: '{0}'")]
    Duplicate(String),

    /// An interpreter was given as an empty string.
    #[error("generator '{0}' has an empty interpreter")]
    EmptyInterpreter(String),
}
