//! CLI module for gpusnap
//!
//! This module contains the CLI command handlers and console output helpers.

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::{init_logging, LogLevel};

// Re-export Cli from config for convenience
pub use crate::config::Cli;
