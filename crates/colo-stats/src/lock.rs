//! Exclusive advisory lock over a result directory

use crate::{Result, StatsError};
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Holds `flock(LOCK_EX)` on a lock file until dropped.
///
/// The lock belongs to the open file description, so two guards in the same
/// process exclude each other just like guards in different processes. The
/// kernel drops it when the process exits, however it exits.
pub struct DirLock {
    path: PathBuf,
    _flock: Flock<File>,
}

impl DirLock {
    /// Block until the lock on `path` is acquired, creating the file if needed
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        debug!("Waiting for result lock {}", path.display());
        let started = Instant::now();
        let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            StatsError::Lock {
                path: path.clone(),
                source: errno,
            }
        })?;
        debug!(
            waited_ms = started.elapsed().as_millis() as u64,
            "Acquired result lock {}",
            path.display()
        );

        Ok(Self {
            path,
            _flock: flock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        debug!("Released result lock {}", self.path.display());
    }
}
