//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::analysis::Verbosity;
use crate::config::schema::{BackendKind, ProfileSpec};
use crate::storage::IfExists;

/// gpusnap: GPU telemetry capture for distributed jobs
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "gpusnap")]
#[command(author = "PAIML")]
#[command(version)]
#[command(about = "Sample GPU telemetry while a workload runs and store it in a shared SQLite file")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a workload and record GPU metrics
    Profile(ProfileArgs),

    /// Summarize a recorded database
    Analyze(AnalyzeArgs),
}

/// Arguments for the profile command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ProfileArgs {
    /// Command to run, with its arguments; must come last
    #[arg(
        short,
        long,
        num_args = 1..,
        allow_hyphen_values = true,
        value_name = "CMD",
        required_unless_present = "script",
        conflicts_with = "script"
    )]
    pub wrap: Vec<String>,

    /// Script whose lines are run one after another, one epoch each
    #[arg(short, long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// YAML profile spec
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Workload label stored with every epoch
    #[arg(short, long)]
    pub label: Option<String>,

    /// Maximum runtime per command in seconds
    #[arg(short, long, value_name = "SECS")]
    pub max_runtime: Option<u64>,

    /// Sampling interval in milliseconds
    #[arg(short = 't', long, value_name = "MS")]
    pub sampling_time: Option<u64>,

    /// Overwrite an existing output file
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Add tables to an existing output file
    #[arg(short, long)]
    pub append: bool,

    /// Output SQLite file (default: gpusnap_<jobid>.sqlite)
    #[arg(short, long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Comma-separated targets; overrides the scheduler environment
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub targets: Vec<u32>,

    /// Telemetry backend (nvml, mock)
    #[arg(long)]
    pub backend: Option<BackendKind>,

    /// Number of devices the mock backend exposes
    #[arg(long, value_name = "N")]
    pub mock_devices: Option<u32>,

    /// Seconds to wait for the output file lock
    #[arg(long, value_name = "SECS")]
    pub lock_timeout: Option<u64>,
}

/// Arguments for the analyze command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct AnalyzeArgs {
    /// Database written by `gpusnap profile`
    #[arg(short, long, value_name = "FILE")]
    pub input_file: PathBuf,

    /// Hide the metric summary
    #[arg(long)]
    pub no_summary: bool,

    /// Print the run_info and targets tables
    #[arg(long)]
    pub show_metadata: bool,

    /// Summary detail (low, medium, high)
    #[arg(long, default_value = "medium")]
    pub verbosity: Verbosity,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a ProfileSpec
pub fn apply_overrides(spec: &mut ProfileSpec, args: &ProfileArgs) {
    if let Some(ms) = args.sampling_time {
        spec.sampling_time_ms = ms;
    }
    if let Some(secs) = args.max_runtime {
        spec.max_runtime_s = secs;
    }
    if let Some(secs) = args.lock_timeout {
        spec.lock_timeout_s = secs;
    }
    if let Some(output) = &args.output_file {
        spec.output_file = Some(output.clone());
    }
    if let Some(label) = &args.label {
        spec.label = Some(label.clone());
    }
    if !args.targets.is_empty() {
        spec.targets = args.targets.clone();
    }
    if let Some(backend) = args.backend {
        spec.backend = backend;
    }
    if let Some(n) = args.mock_devices {
        spec.mock_devices = n;
    }
    if args.append || args.force_overwrite {
        spec.if_exists = IfExists::from_flags(args.append, args.force_overwrite);
    }
}
