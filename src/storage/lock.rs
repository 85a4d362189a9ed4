//! Cross-process lock scoped to one database path.
//!
//! The lock is an advisory `flock` on a `<db>.lock` sidecar. The kernel drops
//! it when the holding process exits, so a crashed rank never strands its
//! siblings.

use super::error::{Result, StorageError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Interval between acquisition attempts while the lock is contended
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Path-scoped exclusive lock
#[derive(Debug, Clone)]
pub struct StorageLock {
    path: PathBuf,
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl StorageLock {
    /// Lock on an explicit lock-file path
    pub fn new<P: AsRef<Path>>(lock_path: P) -> Self {
        Self { path: lock_path.as_ref().to_path_buf() }
    }

    /// Lock guarding `db_path` (the sidecar is `<db_path>.lock`)
    pub fn for_database<P: AsRef<Path>>(db_path: P) -> Self {
        Self { path: sidecar_path(db_path.as_ref(), "lock") }
    }

    /// Path of the lock file itself
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held or `timeout` elapses.
    ///
    /// A zero timeout makes exactly one attempt.
    pub fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let start = Instant::now();
        let mut announced = false;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    log::debug!("acquired {} after {:?}", self.path.display(), start.elapsed());
                    return Ok(LockGuard { file, path: self.path.clone() });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {}
                Err(e) => return Err(StorageError::Io(e)),
            }

            let waited = start.elapsed();
            if waited >= timeout {
                return Err(StorageError::LockTimeout { path: self.path.clone(), waited });
            }
            if !announced {
                log::info!("waiting for lock {}", self.path.display());
                announced = true;
            }
            std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
        }
    }

    /// Run `f` while holding the lock. The lock is released on every exit path.
    pub fn with_lock<T, F>(&self, timeout: Duration, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let _guard = self.acquire(timeout)?;
        f()
    }
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("failed to release {}: {e}", self.path.display());
        }
    }
}

/// `<db_path>.<ext>` next to the database file
pub(crate) fn sidecar_path(db_path: &Path, ext: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
