//! Profile command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{
    apply_overrides, load_spec, validate_spec, BackendKind, JobEnvironment, ProfileArgs,
    ProfileSpec, TargetSource,
};
use crate::error::Result;
use crate::profiler::{ProfilingSession, RunReport, WorkloadCommand};
use crate::storage::{open_for_write, Claim};
use crate::telemetry::{MockBackend, NvmlBackend, TelemetryBackend};

/// Run the profile command
pub fn run_profile(args: ProfileArgs, level: LogLevel) -> std::result::Result<(), String> {
    profile(&args, level).map_err(|e| e.to_string())
}

fn profile(args: &ProfileArgs, level: LogLevel) -> Result<()> {
    let mut spec = match &args.config {
        Some(path) => {
            log(level, LogLevel::Verbose, &format!("Loading profile spec: {}", path.display()));
            load_spec(path)?
        }
        None => ProfileSpec::default(),
    };
    apply_overrides(&mut spec, args);
    validate_spec(&spec)?;

    let job = JobEnvironment::from_env(spec.targets_per_node)?;
    let targets = if spec.targets.is_empty() { job.targets.clone() } else { spec.targets.clone() };
    if spec.targets.is_empty() && job.source == TargetSource::All {
        log(level, LogLevel::Verbose, "No targets assigned; sampling every visible target");
    }
    let output = spec.output_file.clone().unwrap_or_else(|| job.default_output());

    let commands = workload_commands(args)?;

    // Claim the output before any workload runs so a bad path fails fast.
    let writer = open_for_write(&output, spec.write_options())?;
    let verb = match writer.claim() {
        Claim::Created => "Created",
        Claim::Overwrote => "Overwrote",
        Claim::Joined => "Joined",
    };
    log(level, LogLevel::Verbose, &format!("{verb} output: {}", output.display()));

    let backend = build_backend(&spec)?;
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "Backend: {}, sampling every {} ms, max runtime {} s",
            backend.name(),
            spec.sampling_time_ms,
            spec.max_runtime_s
        ),
    );

    let mut session = ProfilingSession::open(backend.as_ref(), spec.profiler_config(targets))?;
    let ids: Vec<String> = session.targets().iter().map(|t| t.id.to_string()).collect();
    log(
        level,
        LogLevel::Normal,
        &format!("Profiling {} command(s) on target(s) {}", commands.len(), ids.join(",")),
    );

    for command in &commands {
        let report = session.run(command)?;
        log(level, LogLevel::Normal, &describe(&report));
    }
    let epochs = session.finish()?;

    let written = writer.dump(&epochs)?;
    log(
        level,
        LogLevel::Normal,
        &format!("✓ Wrote {written} tables ({} epochs) to {}", epochs.len(), output.display()),
    );
    Ok(())
}

fn workload_commands(args: &ProfileArgs) -> Result<Vec<WorkloadCommand>> {
    match &args.script {
        Some(path) => Ok(WorkloadCommand::load_script(path)?),
        None => Ok(vec![WorkloadCommand::wrap(&args.wrap)?]),
    }
}

fn build_backend(spec: &ProfileSpec) -> Result<Box<dyn TelemetryBackend>> {
    Ok(match spec.backend {
        BackendKind::Mock => Box::new(MockBackend::new(spec.mock_devices)),
        BackendKind::Nvml => Box::new(NvmlBackend::new()?),
    })
}

fn describe(report: &RunReport) -> String {
    let status = if report.outcome.timed_out() {
        "timed out".to_string()
    } else {
        match report.outcome.exit_code() {
            Some(code) => format!("exit {code}"),
            None => "killed by signal".to_string(),
        }
    };
    format!(
        "  {} ({status}, {:.1}s, {} samples)",
        report.command,
        report.elapsed.as_secs_f64(),
        report.sample_count()
    )
}

