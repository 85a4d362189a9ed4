//! CLI command implementations

mod analyze;
mod profile;


use crate::cli::LogLevel;
use crate::config::{Cli, Command};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.quiet, cli.verbose);

    match cli.command {
        Command::Profile(args) => profile::run_profile(args, log_level),
        Command::Analyze(args) => analyze::run_analyze(args, log_level),
    }
}
