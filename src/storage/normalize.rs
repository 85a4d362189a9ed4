//! Unit normalization applied to every table before it is written.
//!
//! NVML/DCGM report `DEV_GPU_UTIL` as an integer 0-100 while every other
//! percentage-like field is a ratio in [0, 1]. Columns listed here are
//! rescaled so that all percentages share the ratio convention on disk.

use super::table::{ColumnType, Table, Value};

/// Columns reported as integer percentages (0-100)
pub const INTEGER_PERCENT_COLUMNS: &[&str] = &["DEV_GPU_UTIL"];

/// Rescale integer percentage columns to floats in [0, 1].
///
/// Returns the number of columns rewritten. Columns already stored as `Real`
/// are left alone, which keeps a second pass over the same table a no-op.
pub fn normalize_percentages(table: &mut Table) -> usize {
    let mut rewritten = 0;
    for name in INTEGER_PERCENT_COLUMNS {
        let Some(idx) = table.column_index(name) else {
            continue;
        };
        if table.columns()[idx].ty != ColumnType::Integer {
            continue;
        }
        table.map_column(idx, ColumnType::Real, |v| match v {
            Value::Integer(p) => Value::Real(p as f64 / 100.0),
            other => other,
        });
        rewritten += 1;
    }
    rewritten
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::storage::table::Column;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_normalized_percent_in_unit_range(util in 0i64..=100) {
            let mut t = Table::new("gpu", vec![Column::new("DEV_GPU_UTIL", ColumnType::Integer)]).unwrap();
            t.push_row(vec![Value::Integer(util)]).unwrap();
            normalize_percentages(&mut t);
            let v = t.rows()[0][0].as_f64().unwrap();
            prop_assert!((0.0..=1.0).contains(&v));
            prop_assert!((v * 100.0 - util as f64).abs() < 1e-9);
        }
    }
}
