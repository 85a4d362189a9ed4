//! Metric field catalog and the metric groups stored as tables.
//!
//! Field names follow the DCGM field identifiers so databases written by this
//! tool line up with DCGM-based tooling.

use crate::storage::{Column, ColumnType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a field is reported by the native layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer percentage, 0-100
    IntegerPercent,
    /// Integer count or reading (MiB, MHz, Celsius, bytes/s)
    Integer,
    /// Activity ratio in [0, 1]
    Ratio,
    /// Real-valued reading (watts)
    Real,
}

/// One tracked hardware counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricField {
    DevGpuUtil,
    DevFbUsed,
    DevFbFree,
    DevPowerUsage,
    DevGpuTemp,
    DevSmClock,
    DevMemClock,
    ProfSmActive,
    ProfSmOccupancy,
    ProfPipeTensorActive,
    ProfDramActive,
    ProfPcieTxBytes,
    ProfPcieRxBytes,
}

impl MetricField {
    pub const ALL: [MetricField; 13] = [
        MetricField::DevGpuUtil,
        MetricField::DevFbUsed,
        MetricField::DevFbFree,
        MetricField::DevPowerUsage,
        MetricField::DevGpuTemp,
        MetricField::DevSmClock,
        MetricField::DevMemClock,
        MetricField::ProfSmActive,
        MetricField::ProfSmOccupancy,
        MetricField::ProfPipeTensorActive,
        MetricField::ProfDramActive,
        MetricField::ProfPcieTxBytes,
        MetricField::ProfPcieRxBytes,
    ];

    /// Column name (DCGM field identifier without the `DCGM_FI_` prefix)
    pub fn name(self) -> &'static str {
        match self {
            MetricField::DevGpuUtil => "DEV_GPU_UTIL",
            MetricField::DevFbUsed => "DEV_FB_USED",
            MetricField::DevFbFree => "DEV_FB_FREE",
            MetricField::DevPowerUsage => "DEV_POWER_USAGE",
            MetricField::DevGpuTemp => "DEV_GPU_TEMP",
            MetricField::DevSmClock => "DEV_SM_CLOCK",
            MetricField::DevMemClock => "DEV_MEM_CLOCK",
            MetricField::ProfSmActive => "PROF_SM_ACTIVE",
            MetricField::ProfSmOccupancy => "PROF_SM_OCCUPANCY",
            MetricField::ProfPipeTensorActive => "PROF_PIPE_TENSOR_ACTIVE",
            MetricField::ProfDramActive => "PROF_DRAM_ACTIVE",
            MetricField::ProfPcieTxBytes => "PROF_PCIE_TX_BYTES",
            MetricField::ProfPcieRxBytes => "PROF_PCIE_RX_BYTES",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            MetricField::DevGpuUtil => FieldKind::IntegerPercent,
            MetricField::DevPowerUsage => FieldKind::Real,
            MetricField::ProfSmActive
            | MetricField::ProfSmOccupancy
            | MetricField::ProfPipeTensorActive
            | MetricField::ProfDramActive => FieldKind::Ratio,
            _ => FieldKind::Integer,
        }
    }

    /// Storage type before normalization
    pub fn column_type(self) -> ColumnType {
        match self.kind() {
            FieldKind::IntegerPercent | FieldKind::Integer => ColumnType::Integer,
            FieldKind::Ratio | FieldKind::Real => ColumnType::Real,
        }
    }

    pub fn group(self) -> MetricGroup {
        if self.name().starts_with("PROF_") {
            MetricGroup::Profiling
        } else {
            MetricGroup::Device
        }
    }
}

impl std::fmt::Display for MetricField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical group of fields persisted as one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricGroup {
    /// Device-level counters (utilization, memory, power, clocks)
    Device,
    /// Profiling-level activity ratios and PCIe traffic
    Profiling,
}

/// Identifier column present in every metric table
pub const TARGET_COLUMN: &str = "target_id";
/// Sample time column (milliseconds since the UNIX epoch)
pub const TIMESTAMP_COLUMN: &str = "timestamp";

impl MetricGroup {
    pub const ALL: [MetricGroup; 2] = [MetricGroup::Device, MetricGroup::Profiling];

    /// Table name this group is stored under
    pub fn table_name(self) -> &'static str {
        match self {
            MetricGroup::Device => "gpu",
            MetricGroup::Profiling => "gpu_prof",
        }
    }

    pub fn fields(self) -> Vec<MetricField> {
        MetricField::ALL.into_iter().filter(|f| f.group() == self).collect()
    }

    /// Declared table schema: target id, timestamp, then the group's fields
    pub fn schema(self) -> Vec<Column> {
        let mut cols = vec![
            Column::new(TARGET_COLUMN, ColumnType::Integer),
            Column::new(TIMESTAMP_COLUMN, ColumnType::Integer),
        ];
        cols.extend(self.fields().into_iter().map(|f| Column::new(f.name(), f.column_type())));
        cols
    }
}

/// One reading of all tracked fields for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub target_id: u32,
    pub timestamp: DateTime<Utc>,
    /// `None` marks a reading that could not be taken this tick
    pub values: BTreeMap<MetricField, Option<f64>>,
}

impl MetricSample {
    /// Sample with every requested field missing
    pub fn missing(target_id: u32, timestamp: DateTime<Utc>, fields: &[MetricField]) -> Self {
        Self { target_id, timestamp, values: fields.iter().map(|f| (*f, None)).collect() }
    }

    pub fn get(&self, field: MetricField) -> Option<f64> {
        self.values.get(&field).copied().flatten()
    }

    /// Value by column name
    pub fn get_named(&self, name: &str) -> Option<f64> {
        MetricField::from_name(name).and_then(|f| self.get(f))
    }

    /// True when no field has a value
    pub fn is_missing(&self) -> bool {
        self.values.values().all(Option::is_none)
    }
}
