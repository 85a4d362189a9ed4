//! Profiler error types

use crate::storage::StorageError;
use crate::telemetry::TelemetryError;
use std::path::PathBuf;

/// Result type for profiling operations
pub type Result<T> = std::result::Result<T, ProfilerError>;

/// Errors raised while supervising a workload.
///
/// A workload exceeding its runtime budget is not an error; see
/// [`RunOutcome::TimedOut`](super::RunOutcome::TimedOut).
#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    #[error("Empty workload command")]
    EmptyCommand,

    #[error("Script {path} contains no commands")]
    EmptyScript { path: PathBuf },

    #[error("Failed to read script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sampler thread panicked")]
    SamplerPanicked,

    #[error("Table shaping failed: {0}")]
    Shape(#[from] StorageError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
