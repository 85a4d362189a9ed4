//! SQLite access for the metrics database.
//!
//! One connection per write attempt; never held open across ticks. Each call
//! to [`write_tables`] replaces its tables inside a single transaction, so a
//! table is either fully replaced or untouched.

use super::error::{Result, StorageError};
use super::table::{Column, ColumnType, Table, Value};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Quote an identifier for use in SQL (`gpu_epoch:0` needs quoting)
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn open_rw(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| StorageError::Backend(format!("Failed to open {}: {e}", path.display())))?;
    conn.busy_timeout(busy_timeout)
        .map_err(|e| StorageError::Backend(format!("Failed to set busy timeout: {e}")))?;
    Ok(conn)
}

/// Replace `tables` in the database at `path`, all in one transaction.
pub fn write_tables<'a, I>(path: &Path, tables: I, busy_timeout: Duration) -> Result<usize>
where
    I: IntoIterator<Item = &'a Table>,
{
    let mut conn = open_rw(path, busy_timeout)?;
    // Take the write lock up front; a deferred upgrade can fail with BUSY
    // without consulting the busy timeout.
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| StorageError::Backend(format!("Failed to begin transaction: {e}")))?;

    let mut written = 0;
    for table in tables {
        replace_table(&tx, table)?;
        written += 1;
    }

    tx.commit().map_err(|e| StorageError::Backend(format!("Failed to commit: {e}")))?;
    Ok(written)
}

fn replace_table(conn: &Connection, table: &Table) -> Result<()> {
    let name = quote_ident(table.name());
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.sql_name()))
        .collect();

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {name};
         CREATE TABLE {name} ({});",
        columns.join(", ")
    ))
    .map_err(|e| StorageError::Backend(format!("Failed to create table {}: {e}", table.name())))?;

    let placeholders = vec!["?"; table.columns().len()].join(", ");
    let mut stmt = conn
        .prepare(&format!("INSERT INTO {name} VALUES ({placeholders})"))
        .map_err(|e| StorageError::Backend(format!("Failed to prepare insert: {e}")))?;

    for row in table.rows() {
        let params = row.iter().map(to_sql_value);
        stmt.execute(rusqlite::params_from_iter(params)).map_err(|e| {
            StorageError::Backend(format!("Failed to insert into {}: {e}", table.name()))
        })?;
    }
    Ok(())
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Integer(v) => Sql::Integer(*v),
        Value::Real(v) => Sql::Real(*v),
        Value::Text(s) => Sql::Text(s.clone()),
        Value::Blob(b) => Sql::Blob(b.clone()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Load every table in the database at `path`, keyed by table name.
pub fn read_tables(path: &Path) -> Result<BTreeMap<String, Table>> {
    if !path.exists() {
        return Err(StorageError::DatabaseNotFound(path.to_path_buf()));
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| StorageError::Backend(format!("Failed to open {}: {e}", path.display())))?;

    let names: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .map_err(|e| StorageError::Backend(format!("Failed to list tables: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| StorageError::Backend(format!("Failed to list tables: {e}")))?;
        rows.collect::<std::result::Result<_, _>>()
            .map_err(|e| StorageError::Backend(format!("Failed to read table name: {e}")))?
    };

    let mut tables = BTreeMap::new();
    for name in names {
        let table = read_table(&conn, &name)?;
        tables.insert(name, table);
    }
    Ok(tables)
}

fn read_table(conn: &Connection, name: &str) -> Result<Table> {
    let columns: Vec<Column> = {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))
            .map_err(|e| StorageError::Backend(format!("Failed to describe {name}: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                let col: String = row.get(1)?;
                let decl: String = row.get(2)?;
                Ok(Column::new(col, ColumnType::from_declared(&decl)))
            })
            .map_err(|e| StorageError::Backend(format!("Failed to describe {name}: {e}")))?;
        rows.collect::<std::result::Result<_, _>>()
            .map_err(|e| StorageError::Backend(format!("Failed to read column of {name}: {e}")))?
    };

    let width = columns.len();
    let mut stored = Vec::new();

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {}", quote_ident(name)))
        .map_err(|e| StorageError::Backend(format!("Failed to query {name}: {e}")))?;
    let mut rows =
        stmt.query([]).map_err(|e| StorageError::Backend(format!("Failed to query {name}: {e}")))?;

    while let Some(row) =
        rows.next().map_err(|e| StorageError::Backend(format!("Failed to read {name}: {e}")))?
    {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let v = row
                .get_ref(i)
                .map_err(|e| StorageError::Backend(format!("Failed to read {name}: {e}")))?;
            values.push(from_sql_value(v));
        }
        stored.push(values);
    }
    Table::from_stored(name, columns, stored)
}
