//! YAML schema for a profiling run.
//!
//! Every key is optional; omitted keys take the defaults below, and CLI flags
//! override whatever the file sets.
//!
//! ```yaml
//! sampling_time_ms: 500
//! max_runtime_s: 600
//! lock_timeout_s: 900
//! targets_per_node: 4
//! output_file: run.sqlite
//! label: baseline
//! backend: nvml
//! if_exists: fail
//! ```

use crate::profiler::ProfilerConfig;
use crate::storage::{IfExists, WriteOptions};
use crate::telemetry::MetricGroup;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_sampling_time_ms() -> u64 {
    500
}

fn default_max_runtime_s() -> u64 {
    600
}

fn default_lock_timeout_s() -> u64 {
    900
}

fn default_targets_per_node() -> u32 {
    4
}

fn default_mock_devices() -> u32 {
    1
}

/// Telemetry backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// NVIDIA Management Library (requires the `nvml` feature)
    #[default]
    Nvml,
    /// Synthetic in-process readings
    Mock,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nvml" => Ok(BackendKind::Nvml),
            "mock" => Ok(BackendKind::Mock),
            _ => Err(format!("Unknown backend: {s}. Valid backends: nvml, mock")),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Nvml => write!(f, "nvml"),
            BackendKind::Mock => write!(f, "mock"),
        }
    }
}

/// Complete profiling specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileSpec {
    /// Sampling interval in milliseconds
    #[serde(default = "default_sampling_time_ms")]
    pub sampling_time_ms: u64,

    /// Runtime budget per command in seconds
    #[serde(default = "default_max_runtime_s")]
    pub max_runtime_s: u64,

    /// How long to wait for the output lock, in seconds
    #[serde(default = "default_lock_timeout_s")]
    pub lock_timeout_s: u64,

    /// Divisor for the rank-index fallback when the scheduler does not list
    /// this rank's targets
    #[serde(default = "default_targets_per_node")]
    pub targets_per_node: u32,

    /// Explicit targets; overrides the scheduler environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub backend: BackendKind,

    /// Device count for the mock backend
    #[serde(default = "default_mock_devices")]
    pub mock_devices: u32,

    #[serde(default)]
    pub if_exists: IfExists,
}

impl Default for ProfileSpec {
    fn default() -> Self {
        Self {
            sampling_time_ms: default_sampling_time_ms(),
            max_runtime_s: default_max_runtime_s(),
            lock_timeout_s: default_lock_timeout_s(),
            targets_per_node: default_targets_per_node(),
            targets: Vec::new(),
            output_file: None,
            label: None,
            backend: BackendKind::default(),
            mock_devices: default_mock_devices(),
            if_exists: IfExists::default(),
        }
    }
}

impl ProfileSpec {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_time_ms)
    }

    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime_s)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_s)
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions { if_exists: self.if_exists, timeout: self.lock_timeout() }
    }

    /// Session parameters for the given resolved targets
    pub fn profiler_config(&self, targets: Vec<u32>) -> ProfilerConfig {
        ProfilerConfig {
            targets,
            sampling_interval: self.sampling_interval(),
            max_runtime: self.max_runtime(),
            label: self.label.clone(),
            groups: MetricGroup::ALL.to_vec(),
        }
    }
}
