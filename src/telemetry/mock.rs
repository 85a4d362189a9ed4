//! In-process telemetry backend for tests and GPU-less machines.
//!
//! Readings are modelled after an RTX 4090 under load, with a small seeded
//! jitter per tick so time series are not flat.

use super::backend::{FieldValues, TargetInfo, TelemetryBackend, TelemetrySession};
use super::error::{Result, TelemetryError};
use super::fields::MetricField;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Total VRAM in megabytes for the mock device
const MOCK_GPU_MEMORY_TOTAL_MB: u64 = 24576;
/// Baseline VRAM in use
const MOCK_GPU_MEMORY_USED_MB: f64 = 8192.0;
/// Typical board power draw in watts
const MOCK_GPU_POWER_WATTS: f64 = 250.0;
/// SM clock in MHz
const MOCK_GPU_CLOCK_MHZ: f64 = 2100.0;
/// Memory clock in MHz
const MOCK_GPU_MEMORY_CLOCK_MHZ: f64 = 10_000.0;
/// PCIe throughput in bytes/s
const MOCK_GPU_PCIE_BYTES: f64 = 2_048_000.0;

/// Shared counters for observing a mock backend from tests
#[derive(Debug, Default)]
pub struct MockProbe {
    opened: AtomicUsize,
    closed: AtomicUsize,
    reads: AtomicUsize,
    failing_reads: AtomicUsize,
}

impl MockProbe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Snapshot calls made, successful or not
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make the next `n` snapshot calls fail
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Mock backend exposing `num_devices` targets
#[derive(Debug, Clone)]
pub struct MockBackend {
    num_devices: u32,
    seed: u64,
    probe: Arc<MockProbe>,
}

impl MockBackend {
    pub fn new(num_devices: u32) -> Self {
        Self { num_devices, seed: 0x5eed, probe: Arc::new(MockProbe::default()) }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn num_devices(&self) -> u32 {
        self.num_devices
    }

    pub fn probe(&self) -> Arc<MockProbe> {
        Arc::clone(&self.probe)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TelemetryBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn enumerate(&self) -> Result<Vec<u32>> {
        Ok((0..self.num_devices).collect())
    }

    fn open(&self, _targets: &[u32]) -> Result<Box<dyn TelemetrySession>> {
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            rng: StdRng::seed_from_u64(self.seed),
            probe: Arc::clone(&self.probe),
            closed: false,
        }))
    }
}

struct MockSession {
    rng: StdRng,
    probe: Arc<MockProbe>,
    closed: bool,
}

impl MockSession {
    fn read(&mut self, target: u32, field: MetricField) -> f64 {
        let jitter: f64 = self.rng.random_range(-1.0..1.0);
        let offset = f64::from(target);
        match field {
            MetricField::DevGpuUtil => (75.0 + offset + jitter * 20.0).clamp(0.0, 100.0).round(),
            MetricField::DevFbUsed => (MOCK_GPU_MEMORY_USED_MB + jitter * 512.0).round(),
            MetricField::DevFbFree => {
                (MOCK_GPU_MEMORY_TOTAL_MB as f64 - MOCK_GPU_MEMORY_USED_MB - jitter * 512.0).round()
            }
            MetricField::DevPowerUsage => MOCK_GPU_POWER_WATTS + jitter * 20.0,
            MetricField::DevGpuTemp => (65.0 + jitter * 5.0).round(),
            MetricField::DevSmClock => MOCK_GPU_CLOCK_MHZ,
            MetricField::DevMemClock => MOCK_GPU_MEMORY_CLOCK_MHZ,
            MetricField::ProfSmActive => (0.7 + jitter * 0.2).clamp(0.0, 1.0),
            MetricField::ProfSmOccupancy => (0.4 + jitter * 0.1).clamp(0.0, 1.0),
            MetricField::ProfPipeTensorActive => (0.3 + jitter * 0.2).clamp(0.0, 1.0),
            MetricField::ProfDramActive => (0.5 + jitter * 0.2).clamp(0.0, 1.0),
            MetricField::ProfPcieTxBytes | MetricField::ProfPcieRxBytes => {
                (MOCK_GPU_PCIE_BYTES * (1.0 + jitter * 0.1)).round()
            }
        }
    }
}

impl TelemetrySession for MockSession {
    fn describe(&mut self, target: u32) -> Result<TargetInfo> {
        Ok(TargetInfo {
            id: target,
            name: format!("Mock GPU {target}"),
            memory_total_mb: MOCK_GPU_MEMORY_TOTAL_MB,
        })
    }

    fn snapshot(&mut self, target: u32, fields: &[MetricField]) -> Result<FieldValues> {
        if self.closed {
            return Err(TelemetryError::ContextClosed);
        }
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        if self.probe.take_failure() {
            return Err(TelemetryError::Read { target, message: "injected failure".into() });
        }
        Ok(fields.iter().map(|f| (*f, self.read(target, *f))).collect())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.probe.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_enumerates_devices() {
        let backend = MockBackend::new(3);
        assert_eq!(backend.enumerate().unwrap(), vec![0, 1, 2]);
        assert_eq!(backend.num_devices(), 3);
    }

    #[test]
    fn test_mock_snapshot_ranges() {
        let backend = MockBackend::new(1);
        let mut session = backend.open(&[0]).unwrap();
        for _ in 0..50 {
            let v = session.snapshot(0, &MetricField::ALL).unwrap();
            let util = v[&MetricField::DevGpuUtil];
            assert!((0.0..=100.0).contains(&util));
            assert_eq!(util.fract(), 0.0);
            assert!((0.0..=1.0).contains(&v[&MetricField::ProfSmActive]));
        }
    }

    #[test]
    fn test_mock_snapshot_only_requested_fields() {
        let backend = MockBackend::new(1);
        let mut session = backend.open(&[0]).unwrap();
        let v = session.snapshot(0, &[MetricField::DevGpuTemp]).unwrap();
        assert_eq!(v.len(), 1);
        assert!(v.contains_key(&MetricField::DevGpuTemp));
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let backend = MockBackend::new(1);
        let probe = backend.probe();
        let mut session = backend.open(&[0]).unwrap();
        probe.fail_next_reads(2);
        assert!(session.snapshot(0, &MetricField::ALL).is_err());
        assert!(session.snapshot(0, &MetricField::ALL).is_err());
        assert!(session.snapshot(0, &MetricField::ALL).is_ok());
        assert_eq!(probe.reads(), 3);
    }

    #[test]
    fn test_same_seed_same_readings() {
        let a = MockBackend::new(1).with_seed(7);
        let b = MockBackend::new(1).with_seed(7);
        let va = a.open(&[0]).unwrap().snapshot(0, &MetricField::ALL).unwrap();
        let vb = b.open(&[0]).unwrap().snapshot(0, &MetricField::ALL).unwrap();
        assert_eq!(va, vb);
    }

    #[test]
    fn test_snapshot_after_close_fails() {
        let backend = MockBackend::new(1);
        let mut session = backend.open(&[0]).unwrap();
        session.close().unwrap();
        assert_eq!(session.snapshot(0, &MetricField::ALL), Err(TelemetryError::ContextClosed));
        assert_eq!(backend.probe().closed(), 1);
    }
}
