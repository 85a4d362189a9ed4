//! Storage error types

use std::path::PathBuf;
use std::time::Duration;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage errors
///
/// `PathConflict` and `CommittedFatalError` display only the committed
/// message so every rank of a job reports the same line.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Timed out after {waited:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("{0}")]
    PathConflict(String),

    #[error("{0}")]
    CommittedFatalError(String),

    #[error("Database file {0} does not exist!")]
    DatabaseNotFound(PathBuf),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// True for errors that every cooperating process observes identically.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::PathConflict(_) | Self::CommittedFatalError(_))
    }
}
