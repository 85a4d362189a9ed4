//! NVML telemetry backend (`nvml` feature).
//!
//! NVML exposes the device-level fields only; profiling fields come back
//! missing. The NVML library is initialised per session and shut down when
//! the session is closed.

#[cfg(feature = "nvml")]
mod imp {
    use crate::telemetry::backend::{FieldValues, TargetInfo, TelemetryBackend, TelemetrySession};
    use crate::telemetry::error::{Result, TelemetryError};
    use crate::telemetry::fields::MetricField;
    use nvml_wrapper::enum_wrappers::device::{Clock, PcieUtilCounter, TemperatureSensor};
    use nvml_wrapper::Nvml;

    const MIB: u64 = 1024 * 1024;

    fn backend_err(e: nvml_wrapper::error::NvmlError) -> TelemetryError {
        TelemetryError::Backend(e.to_string())
    }

    /// NVML-backed telemetry
    #[derive(Debug, Default)]
    pub struct NvmlBackend;

    impl NvmlBackend {
        pub fn new() -> Result<Self> {
            Nvml::init()
                .map_err(|e| TelemetryError::Unavailable(format!("NVML init failed: {e}")))?
                .shutdown()
                .map_err(backend_err)?;
            Ok(Self)
        }
    }

    impl TelemetryBackend for NvmlBackend {
        fn name(&self) -> &str {
            "nvml"
        }

        fn enumerate(&self) -> Result<Vec<u32>> {
            let nvml = Nvml::init().map_err(|e| TelemetryError::Unavailable(e.to_string()))?;
            let count = nvml.device_count().map_err(backend_err)?;
            nvml.shutdown().map_err(backend_err)?;
            Ok((0..count).collect())
        }

        fn open(&self, _targets: &[u32]) -> Result<Box<dyn TelemetrySession>> {
            let nvml = Nvml::init().map_err(|e| TelemetryError::Unavailable(e.to_string()))?;
            Ok(Box::new(NvmlSession { nvml: Some(nvml) }))
        }
    }

    struct NvmlSession {
        nvml: Option<Nvml>,
    }

    impl NvmlSession {
        fn nvml(&self) -> Result<&Nvml> {
            self.nvml.as_ref().ok_or(TelemetryError::ContextClosed)
        }
    }

    impl TelemetrySession for NvmlSession {
        fn describe(&mut self, target: u32) -> Result<TargetInfo> {
            let device = self.nvml()?.device_by_index(target).map_err(backend_err)?;
            let name = device.name().map_err(backend_err)?;
            let memory = device.memory_info().map_err(backend_err)?;
            Ok(TargetInfo { id: target, name, memory_total_mb: memory.total / MIB })
        }

        fn snapshot(&mut self, target: u32, fields: &[MetricField]) -> Result<FieldValues> {
            let device = self
                .nvml()?
                .device_by_index(target)
                .map_err(|e| TelemetryError::Read { target, message: e.to_string() })?;

            let mut values = FieldValues::new();
            for field in fields {
                // Unsupported counters are left missing rather than failing the tick.
                let value = match field {
                    MetricField::DevGpuUtil => {
                        device.utilization_rates().ok().map(|u| f64::from(u.gpu))
                    }
                    MetricField::DevFbUsed => {
                        device.memory_info().ok().map(|m| (m.used / MIB) as f64)
                    }
                    MetricField::DevFbFree => {
                        device.memory_info().ok().map(|m| (m.free / MIB) as f64)
                    }
                    MetricField::DevPowerUsage => {
                        device.power_usage().ok().map(|mw| f64::from(mw) / 1000.0)
                    }
                    MetricField::DevGpuTemp => {
                        device.temperature(TemperatureSensor::Gpu).ok().map(f64::from)
                    }
                    MetricField::DevSmClock => device.clock_info(Clock::SM).ok().map(f64::from),
                    MetricField::DevMemClock => {
                        device.clock_info(Clock::Memory).ok().map(f64::from)
                    }
                    MetricField::ProfPcieTxBytes => device
                        .pcie_throughput(PcieUtilCounter::Send)
                        .ok()
                        .map(|kb| f64::from(kb) * 1024.0),
                    MetricField::ProfPcieRxBytes => device
                        .pcie_throughput(PcieUtilCounter::Receive)
                        .ok()
                        .map(|kb| f64::from(kb) * 1024.0),
                    MetricField::ProfSmActive
                    | MetricField::ProfSmOccupancy
                    | MetricField::ProfPipeTensorActive
                    | MetricField::ProfDramActive => None,
                };
                if let Some(v) = value {
                    values.insert(*field, v);
                }
            }
            Ok(values)
        }

        fn close(&mut self) -> Result<()> {
            match self.nvml.take() {
                Some(nvml) => nvml.shutdown().map_err(backend_err),
                None => Ok(()),
            }
        }
    }
}

#[cfg(not(feature = "nvml"))]
mod imp {
    use crate::telemetry::backend::{TelemetryBackend, TelemetrySession};
    use crate::telemetry::error::{Result, TelemetryError};

    /// Placeholder when built without the `nvml` feature
    #[derive(Debug, Default)]
    pub struct NvmlBackend;

    const DISABLED: &str = "built without the `nvml` feature; rebuild with --features nvml or use --backend mock";

    impl NvmlBackend {
        pub fn new() -> Result<Self> {
            Err(TelemetryError::Unavailable(DISABLED.into()))
        }
    }

    impl TelemetryBackend for NvmlBackend {
        fn name(&self) -> &str {
            "nvml"
        }

        fn enumerate(&self) -> Result<Vec<u32>> {
            Err(TelemetryError::Unavailable(DISABLED.into()))
        }

        fn open(&self, _targets: &[u32]) -> Result<Box<dyn TelemetrySession>> {
            Err(TelemetryError::Unavailable(DISABLED.into()))
        }
    }
}

pub use imp::NvmlBackend;

#[cfg(all(test, not(feature = "nvml")))]
mod tests {
    use super::*;
    use crate::telemetry::{TelemetryBackend, TelemetryError};

    #[test]
    fn test_disabled_backend_reports_unavailable() {
        assert!(matches!(NvmlBackend::new(), Err(TelemetryError::Unavailable(_))));
        let backend = NvmlBackend;
        assert!(matches!(backend.enumerate(), Err(TelemetryError::Unavailable(_))));
        assert!(backend.open(&[0]).is_err());
    }
}
