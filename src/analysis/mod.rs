//! Read-side analysis of a persisted database.
//!
//! Tables are loaded without interpretation by the storage layer; this module
//! splits the `_<targets>` and `_epoch:<i>` suffixes back off and summarizes
//! each metric table per target.

mod summary;

use crate::profiler::TARGET_ID_SEPARATOR;

pub use summary::{
    is_metric_table, summarize, ColumnStats, TableSummary, TargetSummary, Verbosity,
};

/// Suffix separating a table's base name from its epoch index
pub const EPOCH_SUFFIX: &str = "_epoch:";

/// Split a persisted table name into base name and epoch index.
///
/// Names without a well-formed suffix are returned whole.
pub fn split_epoch(name: &str) -> (&str, Option<usize>) {
    match name.rsplit_once(EPOCH_SUFFIX) {
        Some((base, idx)) if !base.is_empty() => match idx.parse::<usize>() {
            Ok(i) => (base, Some(i)),
            Err(_) => (name, None),
        },
        _ => (name, None),
    }
}

/// Split a rank's target suffix (`gpu_0-1` -> `gpu`, `[0, 1]`).
///
/// Expects the epoch suffix to be gone already. Names whose last `_` segment
/// is not a target id list are returned whole with no targets.
pub fn split_targets(name: &str) -> (&str, Vec<u32>) {
    let Some((base, tail)) = name.rsplit_once('_') else {
        return (name, Vec::new());
    };
    if base.is_empty() {
        return (name, Vec::new());
    }
    let ids: Option<Vec<u32>> = tail
        .split(TARGET_ID_SEPARATOR)
        .map(|id| if id.bytes().all(|b| b.is_ascii_digit()) { id.parse().ok() } else { None })
        .collect();
    match ids {
        Some(ids) => (base, ids),
        None => (name, Vec::new()),
    }
}

/// Persisted table name broken into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName<'a> {
    /// Table name without target or epoch suffix (`gpu`, `run_info`)
    pub base: &'a str,
    /// Targets of the rank that wrote the table; empty if unmarked
    pub targets: Vec<u32>,
    pub epoch: Option<usize>,
}

impl<'a> TableName<'a> {
    pub fn parse(name: &'a str) -> Self {
        let (rest, epoch) = split_epoch(name);
        let (base, targets) = split_targets(rest);
        Self { base, targets, epoch }
    }
}
