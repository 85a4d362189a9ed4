//! Telemetry error types

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Telemetry errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry backend unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown target {target}; available targets: {available:?}")]
    UnknownTarget { target: u32, available: Vec<u32> },

    #[error("Failed to read target {target}: {message}")]
    Read { target: u32, message: String },

    #[error("Telemetry context already closed")]
    ContextClosed,

    #[error("Backend error: {0}")]
    Backend(String),
}
