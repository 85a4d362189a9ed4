//! In-memory table model shared by the profiler and the database layer.
//!
//! A [`Table`] carries a declared schema. Rows are checked against it when
//! they are pushed, so every row of a table has the same column set.
//! Tables read back from a database are taken as stored: SQLite lets a cell
//! hold any storage class, so their column types are inferred instead.

use super::error::{Result, StorageError};
use serde::{Deserialize, Serialize};

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    /// SQL type name used in `CREATE TABLE`
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }

    /// True if `value` can be stored in a column of this type as is
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnType::Integer, Value::Integer(_))
                | (ColumnType::Real, Value::Real(_))
                | (ColumnType::Text, Value::Text(_))
                | (ColumnType::Blob, Value::Blob(_))
        )
    }

    /// Narrowest type covering every stored value; `None` for an all-NULL column
    fn infer<'a>(values: impl Iterator<Item = &'a Value>) -> Option<Self> {
        let mut inferred: Option<Self> = None;
        for value in values {
            let ty = match value {
                Value::Null => continue,
                Value::Integer(_) => ColumnType::Integer,
                Value::Real(_) => ColumnType::Real,
                Value::Text(_) => ColumnType::Text,
                Value::Blob(_) => ColumnType::Blob,
            };
            inferred = Some(match inferred {
                None => ty,
                Some(prev) => prev.max(ty),
            });
        }
        inferred
    }

    /// Map a declared SQLite type back to a column type (type affinity rules).
    pub fn from_declared(decl: &str) -> Self {
        let decl = decl.to_ascii_uppercase();
        if decl.contains("INT") {
            ColumnType::Integer
        } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
            ColumnType::Text
        } else if decl.is_empty() || decl.contains("BLOB") {
            ColumnType::Blob
        } else {
            ColumnType::Real
        }
    }
}

/// Named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Named, homogeneous table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with a declared schema
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(StorageError::Schema(format!("table '{name}' declares no columns")));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(StorageError::Schema(format!(
                    "table '{name}' declares column '{}' twice",
                    col.name
                )));
            }
        }
        Ok(Self { name, columns, rows: Vec::new() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Iterate over one column's values
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Append a row, validating it against the declared schema.
    ///
    /// Integers pushed into a `Real` column are widened.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(StorageError::Schema(format!(
                "table '{}' expects {} values per row, got {}",
                self.name,
                self.columns.len(),
                row.len()
            )));
        }

        let mut checked = Vec::with_capacity(row.len());
        for (value, col) in row.into_iter().zip(&self.columns) {
            let value = match (col.ty, value) {
                (ColumnType::Real, Value::Integer(i)) => Value::Real(i as f64),
                (ty, v) if ty.accepts(&v) => v,
                (ty, v) => {
                    return Err(StorageError::Schema(format!(
                        "column '{}' of table '{}' is {:?}, got {v:?}",
                        col.name, self.name, ty
                    )))
                }
            };
            checked.push(value);
        }

        self.rows.push(checked);
        Ok(())
    }

    /// Table read back from a database.
    ///
    /// Values are kept exactly as stored. A column keeps its declared type
    /// when every value fits it; otherwise the type is inferred from the
    /// values (`Integer` < `Real` < `Text` < `Blob`, the widest wins).
    pub(crate) fn from_stored(
        name: impl Into<String>,
        mut columns: Vec<Column>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let name = name.into();
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(StorageError::Schema(format!(
                "table '{name}' expects {} values per row, got {}",
                columns.len(),
                row.len()
            )));
        }
        for (i, col) in columns.iter_mut().enumerate() {
            if rows.iter().all(|r| col.ty.accepts(&r[i])) {
                continue;
            }
            if let Some(ty) = ColumnType::infer(rows.iter().map(|r| &r[i])) {
                col.ty = ty;
            }
        }
        let mut table = Self::new(name, columns)?;
        table.rows = rows;
        Ok(table)
    }

    /// Copy of this table under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), columns: self.columns.clone(), rows: self.rows.clone() }
    }

    /// Rewrite one column's type and values in place.
    pub(crate) fn map_column<F>(&mut self, idx: usize, ty: ColumnType, mut f: F)
    where
        F: FnMut(Value) -> Value,
    {
        self.columns[idx].ty = ty;
        for row in &mut self.rows {
            let old = std::mem::replace(&mut row[idx], Value::Null);
            row[idx] = f(old);
        }
    }
}

/// Tables recorded for one supervised command invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    /// Optional workload label
    pub label: Option<String>,
    /// Tables in insertion order
    pub tables: Vec<Table>,
}

impl Epoch {
    pub fn new(label: Option<String>) -> Self {
        Self { label, tables: Vec::new() }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Total number of rows across all tables
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(Table::len).sum()
    }
}
