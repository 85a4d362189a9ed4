//! Seam between the sampler and the native telemetry binding.

use super::error::{Result, TelemetryError};
use super::fields::MetricField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field readings returned by one snapshot; absent fields are missing
pub type FieldValues = BTreeMap<MetricField, f64>;

/// Static description of a target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub id: u32,
    pub name: String,
    pub memory_total_mb: u64,
}

/// Native telemetry binding
pub trait TelemetryBackend {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Identifiers of every target visible to this process
    fn enumerate(&self) -> Result<Vec<u32>>;

    /// Open a monitoring context for `targets`
    fn open(&self, targets: &[u32]) -> Result<Box<dyn TelemetrySession>>;
}

/// Open monitoring context
pub trait TelemetrySession: Send {
    fn describe(&mut self, target: u32) -> Result<TargetInfo>;

    /// Read `fields` for one target
    fn snapshot(&mut self, target: u32, fields: &[MetricField]) -> Result<FieldValues>;

    /// Release the native context
    fn close(&mut self) -> Result<()>;
}

/// Scoped telemetry context.
///
/// Closed explicitly with [`TelemetryContext::close`], or on drop if the
/// owner bails out early. Never left to process teardown.
pub struct TelemetryContext {
    session: Option<Box<dyn TelemetrySession>>,
    targets: Vec<u32>,
    backend: String,
}

impl TelemetryContext {
    /// Open a context after checking every target is visible
    pub fn open(backend: &dyn TelemetryBackend, targets: &[u32]) -> Result<Self> {
        let available = backend.enumerate()?;
        if let Some(&missing) = targets.iter().find(|t| !available.contains(t)) {
            return Err(TelemetryError::UnknownTarget { target: missing, available });
        }

        let session = backend.open(targets)?;
        log::debug!("opened {} context for targets {targets:?}", backend.name());
        Ok(Self { session: Some(session), targets: targets.to_vec(), backend: backend.name().into() })
    }

    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&mut self) -> Result<&mut dyn TelemetrySession> {
        match self.session.as_mut() {
            Some(s) => Ok(s.as_mut()),
            None => Err(TelemetryError::ContextClosed),
        }
    }

    /// Close the native context. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(mut s) => {
                log::debug!("closing {} context", self.backend);
                s.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for TelemetryContext {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close {} context: {e}", self.backend);
        }
    }
}

impl std::fmt::Debug for TelemetryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryContext")
            .field("backend", &self.backend)
            .field("targets", &self.targets)
            .field("open", &self.is_open())
            .finish()
    }
}
