//! gpusnap: GPU telemetry capture for distributed jobs.
//!
//! Each rank of a job wraps its workload, samples its GPUs on a fixed
//! interval while the workload runs, and writes the samples into one shared
//! SQLite file:
//! - `telemetry`: metric catalogue, backend seam and interval sampler
//! - `profiler`: workload supervision and per-run epochs
//! - `storage`: multi-writer coordination and the SQLite table store
//! - `analysis`: per-target summaries of a persisted database
//! - `config` / `cli`: YAML profile specs, scheduler environment and commands
//!
//! # Example
//!
//! ```ignore
//! use gpusnap::profiler::{ProfilerConfig, ProfilingSession, WorkloadCommand};
//! use gpusnap::storage::{open_for_write, WriteOptions};
//! use gpusnap::telemetry::MockBackend;
//!
//! let writer = open_for_write("run.sqlite", WriteOptions::default())?;
//! let mut session = ProfilingSession::open(&MockBackend::new(1), ProfilerConfig::default())?;
//! session.run(&WorkloadCommand::wrap(&["python", "train.py"])?)?;
//! writer.dump(&session.finish()?)?;
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod profiler;
pub mod storage;
pub mod telemetry;

pub use error::{Error, Result};
