//! GPU telemetry capture.
//!
//! A [`TelemetryBackend`] enumerates targets and opens a native monitoring
//! context; a [`Sampler`] turns that context into a stream of per-tick
//! [`MetricSample`]s. Two backends ship: an in-process [`MockBackend`] and an
//! NVML binding behind the `nvml` feature.

mod backend;
mod error;
mod fields;
mod mock;
mod nvml;
mod sampler;

pub use backend::{FieldValues, TargetInfo, TelemetryBackend, TelemetryContext, TelemetrySession};
pub use error::{Result, TelemetryError};
pub use fields::{
    FieldKind, MetricField, MetricGroup, MetricSample, TARGET_COLUMN, TIMESTAMP_COLUMN,
};
pub use mock::{MockBackend, MockProbe};
pub use nvml::NvmlBackend;
pub use sampler::{SampleStream, Sampler, Tick};
