//! gpusnap CLI
//!
//! # Usage
//!
//! ```bash
//! # Sample GPUs while a command runs
//! gpusnap profile -o run.sqlite --wrap python train.py
//!
//! # One epoch per script line, overwriting an old file
//! gpusnap profile --script sweep.sh -f
//!
//! # Summarize a recorded file
//! gpusnap analyze -i run.sqlite --verbosity high
//! ```

use clap::Parser;
use gpusnap::cli::{init_logging, run_command, Cli, LogLevel};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LogLevel::from_flags(cli.quiet, cli.verbose));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
