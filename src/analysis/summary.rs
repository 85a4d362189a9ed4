//! Per-target summary statistics for metric tables.

use super::TableName;
use crate::storage::{Table, Value};
use crate::telemetry::{MetricField, TARGET_COLUMN, TIMESTAMP_COLUMN};
use std::collections::BTreeMap;

/// How many metric columns a summary shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Utilization only
    Low,
    /// Utilization, memory, power and activity ratios
    #[default]
    Medium,
    /// Every metric column
    High,
}

impl Verbosity {
    /// Whether `column` is shown at this level
    pub fn includes(self, column: &str) -> bool {
        const LOW: &[MetricField] = &[MetricField::DevGpuUtil, MetricField::ProfSmActive];
        const MEDIUM: &[MetricField] = &[
            MetricField::DevFbUsed,
            MetricField::DevPowerUsage,
            MetricField::ProfPipeTensorActive,
            MetricField::ProfDramActive,
        ];

        let field = MetricField::from_name(column);
        match self {
            Verbosity::High => true,
            Verbosity::Medium => field.is_some_and(|f| LOW.contains(&f) || MEDIUM.contains(&f)),
            Verbosity::Low => field.is_some_and(|f| LOW.contains(&f)),
        }
    }
}

impl std::str::FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Verbosity::Low),
            "medium" => Ok(Verbosity::Medium),
            "high" => Ok(Verbosity::High),
            _ => Err(format!("Unknown verbosity: {s}. Valid levels: low, medium, high")),
        }
    }
}

/// Statistics of one column for one target
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub column: String,
    /// Non-null readings
    pub count: usize,
    /// Null readings
    pub missing: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    fn from_values(column: &str, values: &[Option<f64>]) -> Self {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let count = present.len();
        let missing = values.len() - count;
        if count == 0 {
            return Self {
                column: column.to_string(),
                count,
                missing,
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }

        let mean = present.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { column: column.to_string(), count, missing, mean, std_dev, min, max }
    }
}

/// Summary of one target within one table
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSummary {
    pub target_id: i64,
    pub samples: usize,
    /// Wall time covered by the samples, in seconds
    pub span_s: f64,
    pub columns: Vec<ColumnStats>,
}

/// Summary of one persisted metric table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    /// Persisted table name
    pub table: String,
    /// Table name without target or epoch suffix
    pub base: String,
    /// Targets of the rank that wrote the table
    pub rank_targets: Vec<u32>,
    pub epoch: Option<usize>,
    pub targets: Vec<TargetSummary>,
}

/// True for tables keyed by target and timestamp
pub fn is_metric_table(table: &Table) -> bool {
    table.column_index(TARGET_COLUMN).is_some() && table.column_index(TIMESTAMP_COLUMN).is_some()
}

/// Summarize every metric table, ordered by epoch, base name, then rank.
///
/// Tables without target and timestamp columns (`run_info`, `targets`) are
/// skipped.
pub fn summarize(tables: &BTreeMap<String, Table>, verbosity: Verbosity) -> Vec<TableSummary> {
    let mut summaries: Vec<TableSummary> = tables
        .values()
        .filter(|t| is_metric_table(t))
        .map(|t| summarize_table(t, verbosity))
        .collect();
    summaries.sort_by(|a, b| {
        (a.epoch, &a.base, &a.rank_targets).cmp(&(b.epoch, &b.base, &b.rank_targets))
    });
    summaries
}

fn summarize_table(table: &Table, verbosity: Verbosity) -> TableSummary {
    let TableName { base, targets: rank_targets, epoch } = TableName::parse(table.name());
    let target_idx = table.column_index(TARGET_COLUMN);
    let time_idx = table.column_index(TIMESTAMP_COLUMN);

    let shown: Vec<(usize, &str)> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, c)| {
            Some(*i) != target_idx && Some(*i) != time_idx && verbosity.includes(&c.name)
        })
        .map(|(i, c)| (i, c.name.as_str()))
        .collect();

    let mut by_target: BTreeMap<i64, Vec<&Vec<Value>>> = BTreeMap::new();
    for row in table.rows() {
        let target = target_idx.and_then(|i| row[i].as_i64()).unwrap_or(-1);
        by_target.entry(target).or_default().push(row);
    }

    let targets = by_target
        .into_iter()
        .map(|(target_id, rows)| {
            let times: Vec<i64> =
                rows.iter().filter_map(|r| time_idx.and_then(|i| r[i].as_i64())).collect();
            let span_s = match (times.iter().min(), times.iter().max()) {
                (Some(lo), Some(hi)) => (hi - lo) as f64 / 1000.0,
                _ => 0.0,
            };
            let columns = shown
                .iter()
                .map(|&(i, name)| {
                    let values: Vec<Option<f64>> = rows.iter().map(|r| r[i].as_f64()).collect();
                    ColumnStats::from_values(name, &values)
                })
                .collect();
            TargetSummary { target_id, samples: rows.len(), span_s, columns }
        })
        .collect();

    TableSummary {
        table: table.name().to_string(),
        base: base.to_string(),
        rank_targets,
        epoch,
        targets,
    }
}

impl std::fmt::Display for TableSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        if !self.rank_targets.is_empty() {
            let ids: Vec<String> = self.rank_targets.iter().map(u32::to_string).collect();
            write!(f, " [targets {}]", ids.join(","))?;
        }
        match self.epoch {
            Some(e) => writeln!(f, " (epoch {e})")?,
            None => writeln!(f)?,
        }
        for target in &self.targets {
            writeln!(
                f,
                "  target {}: {} samples over {:.1}s",
                target.target_id, target.samples, target.span_s
            )?;
            for c in &target.columns {
                if c.count == 0 {
                    writeln!(f, "    {:<24} no data ({} missing)", c.column, c.missing)?;
                    continue;
                }
                write!(
                    f,
                    "    {:<24} mean {:>10.3}  std {:>9.3}  min {:>10.3}  max {:>10.3}",
                    c.column, c.mean, c.std_dev, c.min, c.max
                )?;
                if c.missing > 0 {
                    write!(f, "  ({} missing)", c.missing)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
