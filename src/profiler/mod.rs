//! Workload supervision and epoch collection.
//!
//! A [`ProfilingSession`] opens the telemetry context once, runs each
//! [`WorkloadCommand`] under a [`WorkloadRunner`], and shapes the ticks of
//! every run into one [`Epoch`](crate::storage::Epoch) with an
//! [`EpochCollector`].

mod command;
mod epoch;
mod error;
mod runner;
mod session;

pub use command::WorkloadCommand;
pub use epoch::{
    target_table_name, EpochCollector, RunInfo, RUN_INFO_TABLE, TARGETS_TABLE, TARGET_ID_SEPARATOR,
};
pub use error::{ProfilerError, Result};
pub use runner::{RunOutcome, RunReport, WorkloadRunner};
pub use session::{
    ProfilerConfig, ProfilingSession, DEFAULT_MAX_RUNTIME, DEFAULT_SAMPLING_INTERVAL,
};
