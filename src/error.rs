//! Crate-level error type

use crate::config::ValidationError;
use crate::profiler::ProfilerError;
use crate::storage::StorageError;
use crate::telemetry::TelemetryError;

/// Result type for gpusnap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Any error surfaced to the command line.
///
/// Storage errors are forwarded unchanged so that a committed failure prints
/// the same line on every rank.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Profiler(#[from] ProfilerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
