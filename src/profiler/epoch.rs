//! Shaping ticks into epoch tables. Pure data reshaping, no I/O.

use super::error::Result;
use super::runner::RunReport;
use crate::storage::{Column, ColumnType, Epoch, Table, Value};
use crate::telemetry::{MetricGroup, MetricSample, TargetInfo};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Table describing the invocation that produced an epoch
pub const RUN_INFO_TABLE: &str = "run_info";
/// Table describing the sampled targets
pub const TARGETS_TABLE: &str = "targets";
/// Joins target ids in a table name's target suffix
pub const TARGET_ID_SEPARATOR: char = '-';

/// `<base>_<t0>-<t1>...` for a rank sampling `targets`.
///
/// Ranks sharing an output file sample disjoint targets, so their tables
/// never replace each other. No targets leaves `base` unchanged.
pub fn target_table_name(base: &str, targets: &[u32]) -> String {
    if targets.is_empty() {
        return base.to_string();
    }
    let ids: Vec<String> = targets.iter().map(u32::to_string).collect();
    format!("{base}_{}", ids.join(&TARGET_ID_SEPARATOR.to_string()))
}

/// Facts about one invocation, stored as a one-row `run_info` table
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub label: Option<String>,
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
}

impl RunInfo {
    pub fn from_report(report: &RunReport, label: Option<&str>) -> Self {
        Self {
            label: label.map(str::to_string),
            command: report.command.clone(),
            started_at: report.started_at,
            elapsed: report.elapsed,
            timed_out: report.outcome.timed_out(),
            exit_code: report.outcome.exit_code(),
        }
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("label", ColumnType::Text),
            Column::new("command", ColumnType::Text),
            Column::new("started_at", ColumnType::Text),
            Column::new("elapsed_s", ColumnType::Real),
            Column::new("timed_out", ColumnType::Integer),
            Column::new("exit_code", ColumnType::Integer),
        ]
    }

    fn to_table(&self) -> Result<Table> {
        let mut table = Table::new(RUN_INFO_TABLE, Self::schema())?;
        table.push_row(vec![
            self.label.clone().map_or(Value::Null, Value::Text),
            Value::Text(self.command.clone()),
            Value::Text(self.started_at.to_rfc3339()),
            Value::Real(self.elapsed.as_secs_f64()),
            Value::Integer(i64::from(self.timed_out)),
            self.exit_code.map_or(Value::Null, |c| Value::Integer(i64::from(c))),
        ])?;
        Ok(table)
    }
}

fn targets_table(targets: &[TargetInfo]) -> Result<Table> {
    let mut table = Table::new(
        TARGETS_TABLE,
        vec![
            Column::new("target_id", ColumnType::Integer),
            Column::new("name", ColumnType::Text),
            Column::new("memory_total_mb", ColumnType::Integer),
        ],
    )?;
    for t in targets {
        table.push_row(vec![
            Value::Integer(i64::from(t.id)),
            Value::Text(t.name.clone()),
            Value::Integer(i64::try_from(t.memory_total_mb).unwrap_or(i64::MAX)),
        ])?;
    }
    Ok(table)
}

/// Accumulates ticks of one invocation into one table per metric group
#[derive(Debug, Clone)]
pub struct EpochCollector {
    groups: Vec<(MetricGroup, Table)>,
    samples: usize,
}

impl EpochCollector {
    pub fn new(groups: &[MetricGroup]) -> Result<Self> {
        let groups = groups
            .iter()
            .map(|g| -> Result<(MetricGroup, Table)> {
                Ok((*g, Table::new(g.table_name(), g.schema())?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { groups, samples: 0 })
    }

    /// Samples recorded so far
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Add one tick. Each sample becomes one row in every group table;
    /// missing readings are stored as NULL.
    pub fn record(&mut self, tick: &[MetricSample]) -> Result<()> {
        for sample in tick {
            for (group, table) in &mut self.groups {
                table.push_row(row_for(*group, sample))?;
            }
            self.samples += 1;
        }
        Ok(())
    }

    /// Add every tick of a run
    pub fn record_all<'a, I>(&mut self, ticks: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Vec<MetricSample>>,
    {
        ticks.into_iter().try_for_each(|t| self.record(t))
    }

    /// Close the epoch: group tables first, then `run_info` and `targets`.
    ///
    /// Every table name carries the sampled target ids (see
    /// [`target_table_name`]).
    pub fn finish(self, run_info: &RunInfo, targets: &[TargetInfo]) -> Result<Epoch> {
        let ids: Vec<u32> = targets.iter().map(|t| t.id).collect();
        let mut tables: Vec<Table> = self.groups.into_iter().map(|(_, t)| t).collect();
        tables.push(run_info.to_table()?);
        tables.push(targets_table(targets)?);

        if !ids.is_empty() {
            for t in &mut tables {
                *t = t.renamed(target_table_name(t.name(), &ids));
            }
        }

        let mut epoch = Epoch::new(run_info.label.clone());
        epoch.tables = tables;
        Ok(epoch)
    }
}

fn row_for(group: MetricGroup, sample: &MetricSample) -> Vec<Value> {
    let mut row = vec![
        Value::Integer(i64::from(sample.target_id)),
        Value::Integer(sample.timestamp.timestamp_millis()),
    ];
    row.extend(group.fields().into_iter().map(|field| match sample.get(field) {
        None => Value::Null,
        Some(v) if !v.is_finite() => Value::Null,
        Some(v) => match field.column_type() {
            ColumnType::Integer => Value::Integer(v.round() as i64),
            _ => Value::Real(v),
        },
    }));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::RunOutcome;
    use crate::telemetry::{MetricField, TARGET_COLUMN};

    fn sample(target: u32, util: Option<f64>) -> MetricSample {
        let mut s = MetricSample::missing(target, Utc::now(), &MetricField::ALL);
        if let Some(u) = util {
            s.values.insert(MetricField::DevGpuUtil, Some(u));
            s.values.insert(MetricField::DevPowerUsage, Some(251.5));
            s.values.insert(MetricField::ProfSmActive, Some(0.25));
        }
        s
    }

    fn run_info() -> RunInfo {
        RunInfo {
            label: Some("baseline".into()),
            command: "./bench".into(),
            started_at: Utc::now(),
            elapsed: Duration::from_millis(1500),
            timed_out: false,
            exit_code: Some(0),
        }
    }

    #[test]
    fn test_one_row_per_sample_per_group() {
        let mut c = EpochCollector::new(&MetricGroup::ALL).unwrap();
        c.record(&[sample(0, Some(80.0)), sample(1, Some(40.0))]).unwrap();
        c.record(&[sample(0, Some(81.0)), sample(1, Some(41.0))]).unwrap();
        assert_eq!(c.sample_count(), 4);

        let epoch = c.finish(&run_info(), &[]).unwrap();
        assert_eq!(epoch.table("gpu").unwrap().len(), 4);
        assert_eq!(epoch.table("gpu_prof").unwrap().len(), 4);
        assert_eq!(epoch.label.as_deref(), Some("baseline"));
    }

    #[test]
    fn test_values_typed_by_schema() {
        let mut c = EpochCollector::new(&[MetricGroup::Device]).unwrap();
        c.record(&[sample(2, Some(79.6))]).unwrap();
        let epoch = c.finish(&run_info(), &[]).unwrap();
        let gpu = epoch.table("gpu").unwrap();

        let row = &gpu.rows()[0];
        assert_eq!(row[gpu.column_index(TARGET_COLUMN).unwrap()], Value::Integer(2));
        assert_eq!(row[gpu.column_index("DEV_GPU_UTIL").unwrap()], Value::Integer(80));
        assert_eq!(row[gpu.column_index("DEV_POWER_USAGE").unwrap()], Value::Real(251.5));
        assert!(epoch.table("gpu_prof").is_none());
    }

    #[test]
    fn test_missing_sample_stored_as_nulls() {
        let mut c = EpochCollector::new(&[MetricGroup::Device]).unwrap();
        c.record(&[sample(0, None)]).unwrap();
        let epoch = c.finish(&run_info(), &[]).unwrap();
        let row = &epoch.table("gpu").unwrap().rows()[0];
        assert_eq!(row[0], Value::Integer(0));
        assert!(row[2..].iter().all(Value::is_null));
    }

    #[test]
    fn test_run_info_and_targets_tables() {
        let c = EpochCollector::new(&MetricGroup::ALL).unwrap();
        let targets = vec![TargetInfo { id: 0, name: "Mock GPU 0".into(), memory_total_mb: 24576 }];
        let epoch = c.finish(&run_info(), &targets).unwrap();

        let info = epoch.table("run_info_0").unwrap();
        assert_eq!(info.len(), 1);
        let row = &info.rows()[0];
        assert_eq!(row[0], Value::Text("baseline".into()));
        assert_eq!(row[3], Value::Real(1.5));
        assert_eq!(row[4], Value::Integer(0));
        assert_eq!(row[5], Value::Integer(0));

        let t = epoch.table("targets_0").unwrap();
        assert_eq!(t.rows()[0][1], Value::Text("Mock GPU 0".into()));
    }

    #[test]
    fn test_run_info_from_timed_out_report() {
        let report = RunReport {
            command: "sleep 60".into(),
            started_at: Utc::now(),
            elapsed: Duration::from_secs(2),
            outcome: RunOutcome::TimedOut,
            ticks: vec![],
        };
        let info = RunInfo::from_report(&report, None);
        assert!(info.timed_out);
        assert_eq!(info.exit_code, None);

        let table = info.to_table().unwrap();
        assert!(table.rows()[0][0].is_null());
        assert_eq!(table.rows()[0][4], Value::Integer(1));
        assert!(table.rows()[0][5].is_null());
    }

    #[test]
    fn test_target_table_name() {
        assert_eq!(target_table_name("gpu", &[]), "gpu");
        assert_eq!(target_table_name("gpu", &[3]), "gpu_3");
        assert_eq!(target_table_name("gpu_prof", &[0, 1, 2]), "gpu_prof_0-1-2");
    }

    #[test]
    fn test_tables_named_after_sampled_targets() {
        let mut c = EpochCollector::new(&MetricGroup::ALL).unwrap();
        c.record(&[sample(2, Some(50.0)), sample(5, Some(60.0))]).unwrap();
        let targets = vec![
            TargetInfo { id: 2, ..TargetInfo::default() },
            TargetInfo { id: 5, ..TargetInfo::default() },
        ];
        let epoch = c.finish(&run_info(), &targets).unwrap();
        let names: Vec<&str> = epoch.tables.iter().map(Table::name).collect();
        assert_eq!(names, vec!["gpu_2-5", "gpu_prof_2-5", "run_info_2-5", "targets_2-5"]);
        assert_eq!(epoch.table("gpu_2-5").unwrap().len(), 2);
    }

    #[test]
    fn test_table_order_is_stable() {
        let c = EpochCollector::new(&MetricGroup::ALL).unwrap();
        let epoch = c.finish(&run_info(), &[]).unwrap();
        let names: Vec<&str> = epoch.tables.iter().map(Table::name).collect();
        assert_eq!(names, vec!["gpu", "gpu_prof", RUN_INFO_TABLE, TARGETS_TABLE]);
    }
}
