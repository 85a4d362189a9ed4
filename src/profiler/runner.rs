//! Workload supervision.
//!
//! The child runs as a subprocess while the sampler ticks on a scoped thread.
//! Whichever comes first, child exit or the runtime budget, stops both.

use super::command::WorkloadCommand;
use super::error::{ProfilerError, Result};
use crate::telemetry::{Sampler, TelemetrySession, Tick};
use chrono::{DateTime, Utc};
use std::process::Child;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a supervised invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Child exited on its own; `None` when killed by a signal
    Completed { exit_code: Option<i32> },
    /// Runtime budget exceeded; child was killed, samples kept
    TimedOut,
}

impl RunOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self, RunOutcome::TimedOut)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::Completed { exit_code } => *exit_code,
            RunOutcome::TimedOut => None,
        }
    }
}

/// Result of one supervised invocation
#[derive(Debug, Clone)]
pub struct RunReport {
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: RunOutcome,
    /// Every tick taken while the child ran
    pub ticks: Vec<Tick>,
}

impl RunReport {
    pub fn sample_count(&self) -> usize {
        self.ticks.iter().map(Vec::len).sum()
    }
}

/// Runs commands under a sampler
#[derive(Debug, Clone, Copy)]
pub struct WorkloadRunner<'a> {
    sampler: &'a Sampler,
}

impl<'a> WorkloadRunner<'a> {
    pub fn new(sampler: &'a Sampler) -> Self {
        Self { sampler }
    }

    /// Run `command` to completion or until `max_runtime` elapses.
    ///
    /// A timeout kills the child's whole process group and stops the
    /// sampler; the samples taken so far are returned with
    /// [`RunOutcome::TimedOut`].
    pub fn run(
        &self,
        session: &mut dyn TelemetrySession,
        command: &WorkloadCommand,
        max_runtime: Duration,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut child = command.spawn()?;
        log::info!("started `{command}` (pid {})", child.id());

        let sampler = self.sampler;
        let deadline = started.checked_add(max_runtime).unwrap_or_else(|| far_future(started));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let (ticks, outcome) = thread::scope(|s| {
            let sampling = s.spawn(move || sampler.stream(session, &stop_rx).collect::<Vec<Tick>>());

            let outcome = supervise(&mut child, command, deadline);
            if outcome.is_err() {
                terminate(&mut child);
            }
            // The receiver may already be gone if the sampler panicked.
            let _ = stop_tx.send(());
            (sampling.join(), outcome)
        });

        let ticks = ticks.map_err(|_| ProfilerError::SamplerPanicked)?;
        let outcome = outcome?;
        let elapsed = started.elapsed();

        match outcome {
            RunOutcome::TimedOut => log::warn!(
                "`{command}` exceeded max runtime of {:.1}s and was killed",
                max_runtime.as_secs_f64()
            ),
            RunOutcome::Completed { exit_code: Some(0) } => {
                log::info!("`{command}` finished in {:.1}s", elapsed.as_secs_f64())
            }
            RunOutcome::Completed { exit_code } => {
                log::warn!("`{command}` exited with status {exit_code:?}")
            }
        }

        Ok(RunReport { command: command.display().to_string(), started_at, elapsed, outcome, ticks })
    }
}

fn supervise(child: &mut Child, command: &WorkloadCommand, deadline: Instant) -> Result<RunOutcome> {
    loop {
        let status = child
            .try_wait()
            .map_err(|source| ProfilerError::Wait { command: command.display().to_string(), source })?;
        if let Some(status) = status {
            return Ok(RunOutcome::Completed { exit_code: status.code() });
        }

        let now = Instant::now();
        if now >= deadline {
            terminate(child);
            return Ok(RunOutcome::TimedOut);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn far_future(from: Instant) -> Instant {
    from + Duration::from_secs(u64::from(u32::MAX))
}

/// Kill the child's process group, then the child, then reap it
fn terminate(child: &mut Child) {
    kill_process_group(child.id());
    if let Err(e) = child.kill() {
        log::debug!("kill of pid {} failed: {e}", child.id());
    }
    if let Err(e) = child.wait() {
        log::warn!("failed to reap pid {}: {e}", child.id());
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    if let Ok(pid) = libc::pid_t::try_from(pid) {
        // Negative pid targets the group created by `process_group(0)`.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
