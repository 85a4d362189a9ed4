//! Multi-writer coordination for one shared output database.
//!
//! Every rank of a job may open the same output path for writing. The first
//! writer to take the path's lock decides whether the path may be used
//! (create, overwrite or append) and commits that decision to the metadata
//! sidecar; every later writer only reads the committed decision. A failure
//! detected under the lock is committed too, so all ranks fail with the same
//! message.
//!
//! Read access needs no coordination and is a separate handle type: a
//! [`ReadHandle`] has no write operations at all.

use super::error::{Result, StorageError};
use super::lock::StorageLock;
use super::metadata::MetadataStore;
use super::normalize::normalize_percentages;
use super::sqlite::{read_tables, write_tables};
use super::table::{Epoch, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default lock wait; shared filesystems on busy clusters can be slow
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(900);

/// Policy when the output file already exists and nobody has claimed it yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Refuse to touch an existing file
    #[default]
    Fail,
    /// Delete the existing file
    Overwrite,
    /// Add tables to the existing file
    Append,
}

impl IfExists {
    /// Resolve CLI flags; append wins over overwrite.
    pub fn from_flags(append: bool, force_overwrite: bool) -> Self {
        if append {
            IfExists::Append
        } else if force_overwrite {
            IfExists::Overwrite
        } else {
            IfExists::Fail
        }
    }
}

/// Options for opening a database for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub if_exists: IfExists,
    pub timeout: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { if_exists: IfExists::Fail, timeout: DEFAULT_LOCK_TIMEOUT }
    }
}

/// Lifecycle of a coordinator, seen from one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorState {
    Unopened,
    Validating,
    Ready,
    Rejected(String),
}

/// What the validation step concluded for this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This process claimed the path (file absent, or append requested)
    Created,
    /// This process claimed the path and deleted an existing file
    Overwrote,
    /// A sibling already claimed the path
    Joined,
}

/// Writer-side coordinator for one output path
#[derive(Debug)]
pub struct StorageCoordinator {
    path: PathBuf,
    options: WriteOptions,
    lock: StorageLock,
    metadata: MetadataStore,
    state: CoordinatorState,
}

impl StorageCoordinator {
    pub fn new<P: AsRef<Path>>(path: P, options: WriteOptions) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            lock: StorageLock::for_database(&path),
            metadata: MetadataStore::for_database(&path),
            path,
            options,
            state: CoordinatorState::Unopened,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    /// Validate the path and move to `Ready`, returning the write handle.
    pub fn open(&mut self) -> Result<WriteHandle> {
        self.state = CoordinatorState::Validating;
        match self.validate() {
            Ok(claim) => {
                self.state = CoordinatorState::Ready;
                log::debug!("{} ready ({claim:?})", self.path.display());
                Ok(WriteHandle { path: self.path.clone(), timeout: self.options.timeout, claim })
            }
            Err(e) => {
                self.state = CoordinatorState::Rejected(e.to_string());
                Err(e)
            }
        }
    }

    /// Check-and-commit, entirely inside one lock-held critical section.
    fn validate(&mut self) -> Result<Claim> {
        let _guard = self.lock.acquire(self.options.timeout)?;
        let record = self.metadata.load()?.clone();

        if let Some(msg) = record.db_error {
            return Err(StorageError::CommittedFatalError(msg));
        }
        if record.db_exists {
            return Ok(Claim::Joined);
        }

        let claim = if self.path.exists() {
            match self.options.if_exists {
                IfExists::Fail => {
                    let msg = format!(
                        "Output file {} already exists! Please specify a different output file or set -f flag.",
                        self.path.display()
                    );
                    self.metadata.record_mut().db_error = Some(msg.clone());
                    self.metadata.save()?;
                    return Err(StorageError::PathConflict(msg));
                }
                IfExists::Overwrite => {
                    fs::remove_file(&self.path)?;
                    log::info!("removed existing output {}", self.path.display());
                    Claim::Overwrote
                }
                IfExists::Append => Claim::Created,
            }
        } else {
            Claim::Created
        };

        self.metadata.record_mut().db_exists = true;
        self.metadata.save()?;
        Ok(claim)
    }
}

/// Write capability for a validated output path
#[derive(Debug)]
pub struct WriteHandle {
    path: PathBuf,
    timeout: Duration,
    claim: Claim,
}

impl WriteHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How this process came to hold the path
    pub fn claim(&self) -> Claim {
        self.claim
    }

    /// Write every epoch's tables, replacing same-named tables.
    ///
    /// One epoch is written under the epoch's own table names; several epochs
    /// get an `_epoch:<i>` suffix. Each epoch is written in one transaction.
    pub fn dump(&self, epochs: &[Epoch]) -> Result<usize> {
        let total = epochs.len();
        let mut written = 0;
        for (i, epoch) in epochs.iter().enumerate() {
            let tables: Vec<Table> = epoch
                .tables
                .iter()
                .map(|t| {
                    let mut t = t.renamed(epoch_table_name(t.name(), i, total));
                    normalize_percentages(&mut t);
                    t
                })
                .collect();
            written += write_tables(&self.path, &tables, self.timeout)?;
        }
        if written > 0 {
            log::info!("wrote {written} tables to {}", self.path.display());
        }
        Ok(written)
    }

    /// Load every table in the database
    pub fn load(&self) -> Result<BTreeMap<String, Table>> {
        read_tables(&self.path)
    }
}

/// Validate `path` for writing in one step
pub fn open_for_write<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<WriteHandle> {
    StorageCoordinator::new(path, options).open()
}

/// Read capability; needs no coordination
#[derive(Debug, Clone)]
pub struct ReadHandle {
    path: PathBuf,
}

impl ReadHandle {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every table in the database. Epoch suffixes are not interpreted.
    pub fn load(&self) -> Result<BTreeMap<String, Table>> {
        read_tables(&self.path)
    }
}

/// Persisted name of `base` for epoch `index` out of `total`
pub fn epoch_table_name(base: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        base.to_string()
    } else {
        format!("{base}_epoch:{index}")
    }
}
