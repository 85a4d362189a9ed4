//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! gpusnap profile -o run.sqlite --wrap python train.py
//! gpusnap profile --script sweep.sh --label sweep -m 1200 -f
//! gpusnap analyze -i run.sqlite --verbosity high --show-metadata
//! ```

mod core;

pub use core::{apply_overrides, parse_args, AnalyzeArgs, Cli, Command, ProfileArgs};

#[cfg(test)]
mod tests;
