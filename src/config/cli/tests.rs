//! Tests for CLI argument parsing and overrides

use super::*;
use crate::analysis::Verbosity;
use crate::config::{BackendKind, ProfileSpec};
use crate::storage::IfExists;
use std::path::PathBuf;

fn profile(args: &[&str]) -> ProfileArgs {
    let argv = ["gpusnap", "profile"].into_iter().chain(args.iter().copied());
    let cli = parse_args(argv).unwrap();
    match cli.command {
        Command::Profile(args) => args,
        _ => panic!("Expected Profile command"),
    }
}

#[test]
fn test_parse_profile_wrap() {
    let args = profile(&["--wrap", "python", "train.py"]);
    assert_eq!(args.wrap, vec!["python", "train.py"]);
    assert_eq!(args.script, None);
    assert_eq!(args.max_runtime, None);
    assert_eq!(args.sampling_time, None);
    assert!(!args.force_overwrite);
    assert!(!args.append);
}

#[test]
fn test_wrapped_command_keeps_its_own_flags() {
    let args = profile(&["-m", "5", "-w", "python", "train.py", "--epochs", "3", "-q"]);
    assert_eq!(args.max_runtime, Some(5));
    assert_eq!(args.wrap, vec!["python", "train.py", "--epochs", "3", "-q"]);
}

#[test]
fn test_parse_profile_short_flags() {
    let args = profile(&[
        "-m", "30", "-t", "250", "-o", "out.sqlite", "-l", "baseline", "-f", "-w", "sleep", "5",
    ]);
    assert_eq!(args.max_runtime, Some(30));
    assert_eq!(args.sampling_time, Some(250));
    assert_eq!(args.output_file, Some(PathBuf::from("out.sqlite")));
    assert_eq!(args.label.as_deref(), Some("baseline"));
    assert!(args.force_overwrite);
    assert_eq!(args.wrap, vec!["sleep", "5"]);
}

#[test]
fn test_parse_profile_script() {
    let args = profile(&["--script", "sweep.sh", "--append"]);
    assert_eq!(args.script, Some(PathBuf::from("sweep.sh")));
    assert!(args.wrap.is_empty());
    assert!(args.append);
}

#[test]
fn test_profile_requires_wrap_or_script() {
    assert!(parse_args(["gpusnap", "profile", "-o", "out.sqlite"]).is_err());
}

#[test]
fn test_profile_wrap_and_script_conflict() {
    assert!(parse_args(["gpusnap", "profile", "--script", "a.sh", "--wrap", "true"]).is_err());
}

#[test]
fn test_parse_targets_and_backend() {
    let args = profile(&[
        "--targets", "0,2,3", "--backend", "mock", "--mock-devices", "4", "-w", "true",
    ]);
    assert_eq!(args.targets, vec![0, 2, 3]);
    assert_eq!(args.backend, Some(BackendKind::Mock));
    assert_eq!(args.mock_devices, Some(4));
}

#[test]
fn test_unknown_backend_rejected() {
    assert!(parse_args(["gpusnap", "profile", "--backend", "rocm", "-w", "true"]).is_err());
}

#[test]
fn test_global_flags() {
    let cli = parse_args(["gpusnap", "profile", "--quiet", "-w", "true"]).unwrap();
    assert!(cli.quiet);
    let cli = parse_args(["gpusnap", "-v", "analyze", "-i", "run.sqlite"]).unwrap();
    assert!(cli.verbose);
}

#[test]
fn test_parse_analyze_defaults() {
    let cli = parse_args(["gpusnap", "analyze", "-i", "run.sqlite"]).unwrap();
    match cli.command {
        Command::Analyze(args) => {
            assert_eq!(args.input_file, PathBuf::from("run.sqlite"));
            assert!(!args.no_summary);
            assert!(!args.show_metadata);
            assert_eq!(args.verbosity, Verbosity::Medium);
        }
        _ => panic!("Expected Analyze command"),
    }
}

#[test]
fn test_parse_analyze_options() {
    let cli = parse_args([
        "gpusnap",
        "analyze",
        "--input-file",
        "run.sqlite",
        "--no-summary",
        "--show-metadata",
        "--verbosity",
        "high",
    ])
    .unwrap();
    match cli.command {
        Command::Analyze(args) => {
            assert!(args.no_summary);
            assert!(args.show_metadata);
            assert_eq!(args.verbosity, Verbosity::High);
        }
        _ => panic!("Expected Analyze command"),
    }
}

#[test]
fn test_analyze_requires_input() {
    assert!(parse_args(["gpusnap", "analyze"]).is_err());
}

#[test]
fn test_apply_overrides() {
    let mut spec = ProfileSpec { label: Some("from-yaml".into()), ..Default::default() };
    let args = profile(&["-t", "100", "-m", "5", "-l", "cli", "--lock-timeout", "3", "-w", "true"]);
    apply_overrides(&mut spec, &args);
    assert_eq!(spec.sampling_time_ms, 100);
    assert_eq!(spec.max_runtime_s, 5);
    assert_eq!(spec.lock_timeout_s, 3);
    assert_eq!(spec.label.as_deref(), Some("cli"));
    assert_eq!(spec.if_exists, IfExists::Fail);
}

#[test]
fn test_overrides_keep_unset_values() {
    let mut spec = ProfileSpec {
        sampling_time_ms: 50,
        targets: vec![1],
        if_exists: IfExists::Overwrite,
        ..Default::default()
    };
    let args = profile(&["-w", "true"]);
    apply_overrides(&mut spec, &args);
    assert_eq!(spec.sampling_time_ms, 50);
    assert_eq!(spec.targets, vec![1]);
    assert_eq!(spec.if_exists, IfExists::Overwrite);
}

#[test]
fn test_append_wins_over_overwrite() {
    let mut spec = ProfileSpec::default();
    let args = profile(&["-f", "-a", "-w", "true"]);
    apply_overrides(&mut spec, &args);
    assert_eq!(spec.if_exists, IfExists::Append);
}
