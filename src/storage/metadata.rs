//! Persisted coordination record shared by every writer of a database path.
//!
//! The store does no locking of its own: callers hold the path's
//! [`StorageLock`](super::lock::StorageLock) around every load/save sequence.

use super::error::{Result, StorageError};
use super::lock::sidecar_path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Coordination record (`<db>.metadata`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Some process has claimed the output path
    #[serde(rename = "dbExists", default)]
    pub db_exists: bool,
    /// Fatal error committed for every cooperating process
    #[serde(rename = "dbError", default, skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

/// Load/save access to the metadata sidecar
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    record: MetadataRecord,
}

impl MetadataStore {
    /// Store for `db_path` (the sidecar is `<db_path>.metadata`)
    pub fn for_database<P: AsRef<Path>>(db_path: P) -> Self {
        Self { path: sidecar_path(db_path.as_ref(), "metadata"), record: MetadataRecord::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &MetadataRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut MetadataRecord {
        &mut self.record
    }

    /// Read the persisted record, creating an empty one on first touch.
    pub fn load(&mut self) -> Result<&MetadataRecord> {
        if !self.path.exists() {
            self.record = MetadataRecord::default();
            self.save()?;
            return Ok(&self.record);
        }

        let content = fs::read_to_string(&self.path)?;
        self.record = serde_json::from_str(&content).map_err(|e| {
            StorageError::Metadata(format!("corrupt metadata file {}: {e}", self.path.display()))
        })?;
        Ok(&self.record)
    }

    /// Persist the in-memory record.
    ///
    /// Written to a temporary sibling and renamed into place, so readers never
    /// see a partially written record.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string(&self.record)
            .map_err(|e| StorageError::Metadata(e.to_string()))?;

        let tmp = sidecar_path(&self.path, &format!("tmp{}", std::process::id()));
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
