//! Shared output database for profiling runs.
//!
//! Many ranks of a distributed job may write into one SQLite file at once.
//! Writers rendezvous through two sidecars next to the database:
//!
//! - `<db>.lock`: an advisory file lock serializing every metadata update
//! - `<db>.metadata`: the committed decision (`dbExists`) or fatal error
//!   (`dbError`) shared by all writers
//!
//! # Example
//!
//! ```ignore
//! use gpusnap::storage::{open_for_write, IfExists, ReadHandle, WriteOptions};
//!
//! let options = WriteOptions { if_exists: IfExists::Fail, ..Default::default() };
//! let writer = open_for_write("run.sqlite", options)?;
//! writer.dump(&epochs)?;
//!
//! let tables = ReadHandle::open("run.sqlite").load()?;
//! ```

mod coordinator;
mod error;
mod lock;
mod metadata;
mod normalize;
mod sqlite;
mod table;

pub use coordinator::{
    epoch_table_name, open_for_write, Claim, CoordinatorState, IfExists, ReadHandle,
    StorageCoordinator, WriteHandle, WriteOptions, DEFAULT_LOCK_TIMEOUT,
};
pub use error::{Result, StorageError};
pub use lock::{LockGuard, StorageLock};
pub use metadata::{MetadataRecord, MetadataStore};
pub use normalize::{normalize_percentages, INTEGER_PERCENT_COLUMNS};
pub use sqlite::{read_tables, write_tables};
pub use table::{Column, ColumnType, Epoch, Table, Value};
