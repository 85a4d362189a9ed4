//! Profile spec validation

use super::schema::ProfileSpec;

/// Validation error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid sampling time: {0}ms (must be > 0)")]
    InvalidSamplingTime(u64),

    #[error("Invalid max runtime: {0}s (must be > 0)")]
    InvalidMaxRuntime(u64),

    #[error("Invalid targets per node: {0} (must be > 0)")]
    InvalidTargetsPerNode(u32),

    #[error("Invalid mock device count: {0} (must be > 0)")]
    InvalidMockDevices(u32),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnvironment { var: String, value: String },
}

/// Check numeric ranges of a profile spec
pub fn validate_spec(spec: &ProfileSpec) -> Result<(), ValidationError> {
    if spec.sampling_time_ms == 0 {
        return Err(ValidationError::InvalidSamplingTime(spec.sampling_time_ms));
    }
    if spec.max_runtime_s == 0 {
        return Err(ValidationError::InvalidMaxRuntime(spec.max_runtime_s));
    }
    if spec.targets_per_node == 0 {
        return Err(ValidationError::InvalidTargetsPerNode(spec.targets_per_node));
    }
    if spec.mock_devices == 0 {
        return Err(ValidationError::InvalidMockDevices(spec.mock_devices));
    }
    Ok(())
}
