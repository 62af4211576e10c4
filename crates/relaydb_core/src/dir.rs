//! Store directory layout and locking.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK            # advisory lock, one writer process
//! ├─ queue.log       # record log
//! └─ queue.log.tmp   # compaction output, renamed over queue.log
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "queue.log";
const COMPACT_TEMP: &str = "queue.log.tmp";

/// An opened store directory holding the exclusive lock.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens (and optionally creates) a store directory and locks it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidLocation`] if the path is missing and
    ///   `create_if_missing` is false, or is not a directory
    /// - [`CoreError::StoreLocked`] if another handle holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_location(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_location(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Root of the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the record log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Path compaction writes to before renaming.
    #[must_use]
    pub fn compact_temp_path(&self) -> PathBuf {
        self.path.join(COMPACT_TEMP)
    }

    /// Removes a compaction file left behind by an interrupted run.
    pub fn remove_stale_temp(&self) -> CoreResult<bool> {
        let temp = self.compact_temp_path();
        if temp.exists() {
            fs::remove_file(&temp)?;
            self.sync_directory()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Atomically replaces the log with the compaction output.
    ///
    /// The rename is not durable until [`sync_directory`](Self::sync_directory)
    /// succeeds, but from here on `queue.log` is the compacted file.
    pub fn install_compacted(&self) -> CoreResult<()> {
        fs::rename(self.compact_temp_path(), self.log_path())?;
        Ok(())
    }

    /// Makes directory entry changes (create, rename, remove) durable.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// NTFS journals metadata; there is no directory handle to sync.
    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
