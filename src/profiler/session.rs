//! A profiling session: one telemetry context, any number of epochs.

use super::command::WorkloadCommand;
use super::epoch::{EpochCollector, RunInfo};
use super::error::Result;
use super::runner::{RunReport, WorkloadRunner};
use crate::storage::Epoch;
use crate::telemetry::{
    MetricField, MetricGroup, Sampler, TargetInfo, TelemetryBackend, TelemetryContext,
};
use std::time::Duration;

/// Default sampling interval
pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_millis(500);
/// Default runtime budget per command
pub const DEFAULT_MAX_RUNTIME: Duration = Duration::from_secs(600);

/// Session parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerConfig {
    /// Targets to sample; empty means every target the backend reports
    pub targets: Vec<u32>,
    pub sampling_interval: Duration,
    /// Budget for each command, not the whole session
    pub max_runtime: Duration,
    pub label: Option<String>,
    pub groups: Vec<MetricGroup>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            max_runtime: DEFAULT_MAX_RUNTIME,
            label: None,
            groups: MetricGroup::ALL.to_vec(),
        }
    }
}

/// Owns the telemetry context for the whole session.
///
/// The context is closed by [`ProfilingSession::finish`], or on drop when a
/// run fails part way.
#[derive(Debug)]
pub struct ProfilingSession {
    context: TelemetryContext,
    sampler: Sampler,
    targets: Vec<TargetInfo>,
    config: ProfilerConfig,
    epochs: Vec<Epoch>,
}

impl ProfilingSession {
    pub fn open(backend: &dyn TelemetryBackend, config: ProfilerConfig) -> Result<Self> {
        let requested =
            if config.targets.is_empty() { backend.enumerate()? } else { config.targets.clone() };
        let fields: Vec<MetricField> = config.groups.iter().flat_map(|g| g.fields()).collect();
        let sampler = Sampler::new(&requested, config.sampling_interval, fields)?;

        let mut context = TelemetryContext::open(backend, sampler.targets())?;
        let session = context.session()?;
        let targets = sampler
            .targets()
            .iter()
            .map(|&id| {
                session.describe(id).unwrap_or_else(|e| {
                    log::warn!("could not describe target {id}: {e}");
                    TargetInfo { id, ..TargetInfo::default() }
                })
            })
            .collect();

        log::info!(
            "profiling targets {:?} every {}ms with {} backend",
            sampler.targets(),
            config.sampling_interval.as_millis(),
            backend.name()
        );
        Ok(Self { context, sampler, targets, config, epochs: Vec::new() })
    }

    /// Targets being sampled, after de-duplication
    pub fn targets(&self) -> &[TargetInfo] {
        &self.targets
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Epochs recorded so far
    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    /// Supervise one command and record its epoch.
    ///
    /// A timed-out command still records an epoch; only spawn and wait
    /// failures are errors.
    pub fn run(&mut self, command: &WorkloadCommand) -> Result<RunReport> {
        let session = self.context.session()?;
        let report =
            WorkloadRunner::new(&self.sampler).run(session, command, self.config.max_runtime)?;

        let mut collector = EpochCollector::new(&self.config.groups)?;
        collector.record_all(&report.ticks)?;
        let info = RunInfo::from_report(&report, self.config.label.as_deref());
        self.epochs.push(collector.finish(&info, &self.targets)?);

        log::debug!("epoch {} recorded {} samples", self.epochs.len() - 1, report.sample_count());
        Ok(report)
    }

    /// Run commands in order, one epoch each
    pub fn run_all(&mut self, commands: &[WorkloadCommand]) -> Result<Vec<RunReport>> {
        commands.iter().map(|c| self.run(c)).collect()
    }

    /// Close the telemetry context and hand back the recorded epochs
    pub fn finish(self) -> Result<Vec<Epoch>> {
        let mut context = self.context;
        context.close()?;
        Ok(self.epochs)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::profiler::ProfilerError;
    use crate::telemetry::{MockBackend, TelemetryError};

    fn config() -> ProfilerConfig {
        ProfilerConfig {
            sampling_interval: Duration::from_millis(20),
            max_runtime: Duration::from_secs(10),
            label: Some("unit".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let c = ProfilerConfig::default();
        assert_eq!(c.sampling_interval, Duration::from_millis(500));
        assert_eq!(c.max_runtime, Duration::from_secs(600));
        assert!(c.targets.is_empty());
        assert_eq!(c.groups, MetricGroup::ALL.to_vec());
    }

    #[test]
    fn test_empty_targets_means_all() {
        let backend = MockBackend::new(3);
        let session = ProfilingSession::open(&backend, config()).unwrap();
        let ids: Vec<u32> = session.targets().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(session.targets()[1].name, "Mock GPU 1");
    }

    #[test]
    fn test_unknown_target_rejected_before_open() {
        let backend = MockBackend::new(1);
        let cfg = ProfilerConfig { targets: vec![4], ..config() };
        let err = ProfilingSession::open(&backend, cfg).unwrap_err();
        assert!(matches!(err, ProfilerError::Telemetry(TelemetryError::UnknownTarget { .. })));
        assert_eq!(backend.probe().opened(), 0);
    }

    #[test]
    fn test_context_opened_once_and_closed_on_finish() {
        let backend = MockBackend::new(2);
        let probe = backend.probe();
        let mut session = ProfilingSession::open(&backend, config()).unwrap();
        let commands = WorkloadCommand::parse_script("true\nsleep 0.05\n");
        let reports = session.run_all(&commands).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(probe.closed(), 0);

        let epochs = session.finish().unwrap();
        assert_eq!(epochs.len(), 2);
        assert_eq!(probe.opened(), 1);
        assert_eq!(probe.closed(), 1);
        assert!(epochs.iter().all(|e| e.label.as_deref() == Some("unit")));
        assert!(epochs.iter().all(|e| e.table("gpu_0-1").is_some_and(|t| !t.is_empty())));
    }

    #[test]
    fn test_context_closed_when_run_fails() {
        let backend = MockBackend::new(1);
        let probe = backend.probe();
        {
            let mut session = ProfilingSession::open(&backend, config()).unwrap();
            let bad = WorkloadCommand::wrap(&["/nonexistent/gpusnap-binary"]).unwrap();
            assert!(session.run(&bad).is_err());
            assert!(session.epochs().is_empty());
        }
        assert_eq!(probe.closed(), 1);
    }

    #[test]
    fn test_timed_out_command_still_records_epoch() {
        let backend = MockBackend::new(1);
        let cfg = ProfilerConfig { max_runtime: Duration::from_millis(200), ..config() };
        let mut session = ProfilingSession::open(&backend, cfg).unwrap();
        let report = session.run(&WorkloadCommand::wrap(&["sleep", "30"]).unwrap()).unwrap();
        assert!(report.outcome.timed_out());

        let epochs = session.finish().unwrap();
        assert_eq!(epochs.len(), 1);
        assert!(epochs[0].table("gpu_0").is_some_and(|t| !t.is_empty()));
    }
}
