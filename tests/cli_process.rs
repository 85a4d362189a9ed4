//! Ranks as real processes: several `gpusnap profile` invocations share one
//! output path.

#![cfg(unix)]

use gpusnap::analysis::TableName;
use gpusnap::storage::ReadHandle;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::{Command, Output};
use std::thread;
use tempfile::tempdir;

const RANKS: usize = 4;

fn profile_ranks(output: &Path) -> Vec<Output> {
    let handles: Vec<_> = (0..RANKS)
        .map(|rank| {
            let output = output.to_path_buf();
            thread::spawn(move || {
                Command::new(env!("CARGO_BIN_EXE_gpusnap"))
                    .args(["profile", "--backend", "mock", "--mock-devices", "4", "-t", "50"])
                    .arg("--targets")
                    .arg(rank.to_string())
                    .arg("-l")
                    .arg(format!("rank{rank}"))
                    .arg("-o")
                    .arg(&output)
                    .args(["-w", "sleep", "0.1"])
                    .env_remove("SLURM_STEP_GPUS")
                    .env_remove("SLURM_PROCID")
                    .output()
                    .unwrap()
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_ranks_share_fresh_output() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("job.sqlite");

    for out in profile_ranks(&db) {
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    }
    assert!(db.exists());
    let meta = std::fs::read_to_string(dir.path().join("job.sqlite.metadata")).unwrap();
    let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta["dbExists"], serde_json::Value::Bool(true));

    let tables = ReadHandle::open(&db).load().unwrap();
    let ids: BTreeSet<i64> = tables
        .values()
        .filter(|t| TableName::parse(t.name()).base == "gpu")
        .flat_map(|t| t.column_values("target_id").unwrap().filter_map(|v| v.as_i64()))
        .collect();
    assert_eq!(ids, (0..RANKS as i64).collect());
}

#[test]
fn test_ranks_report_identical_conflict() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("job.sqlite");
    std::fs::write(&db, b"old").unwrap();

    let outputs = profile_ranks(&db);
    let messages: Vec<String> = outputs
        .iter()
        .map(|o| {
            assert!(!o.status.success());
            String::from_utf8_lossy(&o.stderr).lines().last().unwrap_or_default().to_string()
        })
        .collect();
    assert!(messages[0].starts_with("Error: Output file"));
    assert!(messages.iter().all(|m| m == &messages[0]));
}

#[test]
fn test_analyze_reports_missing_file() {
    let out = Command::new(env!("CARGO_BIN_EXE_gpusnap"))
        .args(["analyze", "-i", "/nonexistent/job.sqlite"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));
}
