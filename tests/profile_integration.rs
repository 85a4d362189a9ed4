//! End-to-end profiling against the mock backend.

#![cfg(unix)]

use gpusnap::analysis::{summarize, TableName, Verbosity};
use gpusnap::profiler::{ProfilerConfig, ProfilingSession, WorkloadCommand};
use gpusnap::storage::{open_for_write, IfExists, ReadHandle, WriteOptions};
use gpusnap::telemetry::MockBackend;
use std::collections::BTreeSet;
use std::time::Duration;
use tempfile::tempdir;

fn config() -> ProfilerConfig {
    ProfilerConfig {
        sampling_interval: Duration::from_millis(50),
        max_runtime: Duration::from_secs(10),
        label: Some("integration".into()),
        ..Default::default()
    }
}

#[test]
fn test_script_epochs_round_trip_through_storage() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("run.sqlite");
    let writer = open_for_write(&db, WriteOptions::default()).unwrap();

    let backend = MockBackend::new(2);
    let probe = backend.probe();
    let commands = WorkloadCommand::parse_script("sleep 0.2\n# skipped\ntrue\nexit 4\n");
    assert_eq!(commands.len(), 3);

    let mut session = ProfilingSession::open(&backend, config()).unwrap();
    assert_eq!(session.targets().len(), 2);
    let reports = session.run_all(&commands).unwrap();
    let epochs = session.finish().unwrap();
    assert_eq!(probe.opened(), 1);
    assert_eq!(probe.closed(), 1);
    assert_eq!(reports[2].outcome.exit_code(), Some(4));

    writer.dump(&epochs).unwrap();
    let tables = ReadHandle::open(&db).load().unwrap();
    for i in 0..3 {
        for base in ["gpu", "gpu_prof", "run_info", "targets"] {
            let name = format!("{base}_0-1_epoch:{i}");
            assert!(tables.contains_key(&name), "missing {name}");
            let parsed = TableName::parse(&name);
            assert_eq!((parsed.base, parsed.targets, parsed.epoch), (base, vec![0, 1], Some(i)));
        }
    }
    assert!(!tables.contains_key("gpu"));

    // Every tick samples both targets
    for (i, report) in reports.iter().enumerate() {
        let gpu = &tables[&format!("gpu_0-1_epoch:{i}")];
        assert_eq!(gpu.len(), report.ticks.len() * 2);
    }

    let summaries = summarize(&tables, Verbosity::Low);
    assert_eq!(summaries.len(), 6);
    assert_eq!(summaries[0].epoch, Some(0));
    assert_eq!(summaries[0].targets.len(), 2);
}

#[test]
fn test_utilization_stored_as_ratio() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("run.sqlite");
    let writer = open_for_write(&db, WriteOptions::default()).unwrap();

    let backend = MockBackend::new(1);
    let mut session = ProfilingSession::open(&backend, config()).unwrap();
    session.run(&WorkloadCommand::wrap(&["sleep", "0.2"]).unwrap()).unwrap();
    writer.dump(&session.finish().unwrap()).unwrap();

    let tables = ReadHandle::open(&db).load().unwrap();
    let util: Vec<f64> =
        tables["gpu_0"].column_values("DEV_GPU_UTIL").unwrap().filter_map(|v| v.as_f64()).collect();
    assert!(!util.is_empty());
    assert!(util.iter().all(|u| (0.0..=1.0).contains(u)));
}

#[test]
fn test_sessions_on_disjoint_targets_share_one_file() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("run.sqlite");
    let backend = MockBackend::new(2);

    for target in [0, 1] {
        let writer = open_for_write(&db, WriteOptions::default()).unwrap();
        let config = ProfilerConfig { targets: vec![target], ..config() };
        let mut session = ProfilingSession::open(&backend, config).unwrap();
        session.run(&WorkloadCommand::wrap(&["sleep", "0.1"]).unwrap()).unwrap();
        writer.dump(&session.finish().unwrap()).unwrap();
    }

    let tables = ReadHandle::open(&db).load().unwrap();
    assert!(tables.contains_key("gpu_0"));
    assert!(tables.contains_key("gpu_1"));
    assert!(tables.contains_key("run_info_0"));
    assert!(tables.contains_key("run_info_1"));
    let ids: BTreeSet<i64> = tables
        .values()
        .filter(|t| TableName::parse(t.name()).base == "gpu")
        .flat_map(|t| t.column_values("target_id").unwrap().filter_map(|v| v.as_i64()))
        .collect();
    assert_eq!(ids, BTreeSet::from([0, 1]));
}

#[test]
fn test_redump_same_epoch_count_is_idempotent() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("run.sqlite");
    let backend = MockBackend::new(1);
    let mut session = ProfilingSession::open(&backend, config()).unwrap();
    session.run_all(&WorkloadCommand::parse_script("true\ntrue\n")).unwrap();
    let epochs = session.finish().unwrap();

    let writer = open_for_write(&db, WriteOptions::default()).unwrap();
    writer.dump(&epochs).unwrap();
    let once = writer.load().unwrap();
    writer.dump(&epochs).unwrap();
    assert_eq!(writer.load().unwrap(), once);

    // A later job appending to the same file replaces same-named tables
    std::fs::remove_file(dir.path().join("run.sqlite.metadata")).unwrap();
    let options = WriteOptions { if_exists: IfExists::Append, ..Default::default() };
    let appender = open_for_write(&db, options).unwrap();
    appender.dump(&epochs).unwrap();
    assert_eq!(appender.load().unwrap(), once);
}
