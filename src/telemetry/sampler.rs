//! Periodic sampling of a fixed target set.

use super::backend::TelemetrySession;
use super::error::{Result, TelemetryError};
use super::fields::{MetricField, MetricSample};
use chrono::Utc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// One tick: one sample per target, in target order
pub type Tick = Vec<MetricSample>;

/// Samples a de-duplicated target list every `interval`
#[derive(Debug, Clone)]
pub struct Sampler {
    targets: Vec<u32>,
    interval: Duration,
    fields: Vec<MetricField>,
}

impl Sampler {
    /// Build a sampler. Duplicate targets are dropped, first occurrence wins.
    pub fn new(targets: &[u32], interval: Duration, fields: Vec<MetricField>) -> Result<Self> {
        if interval.is_zero() {
            return Err(TelemetryError::Backend("sampling interval must be positive".into()));
        }
        if targets.is_empty() {
            return Err(TelemetryError::Backend("no targets to sample".into()));
        }
        let mut unique = Vec::with_capacity(targets.len());
        for t in targets {
            if !unique.contains(t) {
                unique.push(*t);
            }
        }
        Ok(Self { targets: unique, interval, fields })
    }

    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn fields(&self) -> &[MetricField] {
        &self.fields
    }

    /// Take one reading of every target.
    ///
    /// A failed read is retried once; a second failure records the target as
    /// missing for this tick instead of aborting.
    pub fn tick(&self, session: &mut dyn TelemetrySession) -> Tick {
        self.targets.iter().map(|&target| self.read_target(session, target)).collect()
    }

    fn read_target(&self, session: &mut dyn TelemetrySession, target: u32) -> MetricSample {
        let timestamp = Utc::now();
        let values = match session.snapshot(target, &self.fields) {
            Ok(v) => Ok(v),
            Err(first) => {
                log::debug!("retrying read of target {target}: {first}");
                session.snapshot(target, &self.fields)
            }
        };

        match values {
            Ok(v) => MetricSample {
                target_id: target,
                timestamp,
                values: self.fields.iter().map(|f| (*f, v.get(f).copied())).collect(),
            },
            Err(e) => {
                log::warn!("target {target} missing this tick: {e}");
                MetricSample::missing(target, timestamp, &self.fields)
            }
        }
    }

    /// Lazy tick stream that ends when `stop` fires or its sender is dropped.
    ///
    /// The first tick is taken immediately and unconditionally, so every
    /// stream yields at least one tick. Later ticks follow every `interval`;
    /// a stop signal ends the stream within one interval.
    pub fn stream<'a>(
        &'a self,
        session: &'a mut dyn TelemetrySession,
        stop: &'a Receiver<()>,
    ) -> SampleStream<'a> {
        SampleStream { sampler: self, session, stop, next_due: None, primed: false }
    }
}

/// Iterator over ticks; see [`Sampler::stream`]
pub struct SampleStream<'a> {
    sampler: &'a Sampler,
    session: &'a mut dyn TelemetrySession,
    stop: &'a Receiver<()>,
    next_due: Option<Instant>,
    primed: bool,
}

impl Iterator for SampleStream<'_> {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        if self.primed {
            let wait = match self.next_due {
                Some(due) => due.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            match self.stop.recv_timeout(wait) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return None,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        self.primed = true;
        let started = Instant::now();
        let tick = self.sampler.tick(self.session);
        self.next_due = started
            .checked_add(self.sampler.interval)
            .or_else(|| started.checked_add(Duration::from_secs(u64::from(u32::MAX))));
        Some(tick)
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_targets_unique_and_order_preserving(targets in prop::collection::vec(0u32..8, 1..32)) {
            let s = Sampler::new(&targets, Duration::from_millis(1), vec![]).unwrap();
            let kept = s.targets();

            for (i, t) in kept.iter().enumerate() {
                prop_assert!(!kept[..i].contains(t));
            }
            for t in &targets {
                prop_assert!(kept.contains(t));
            }
            let firsts: Vec<usize> = kept
                .iter()
                .map(|t| targets.iter().position(|x| x == t).unwrap())
                .collect();
            prop_assert!(firsts.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
