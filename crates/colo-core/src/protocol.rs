//! Filesystem and signal protocol between workers and the synchronizer
//!
//! A worker announces readiness by creating an empty file named after its pid
//! and announces completion by writing its record next to it. The synchronizer
//! releases workers with [`START_SIGNAL`] and ends open-ended runs with
//! [`STOP_SIGNAL`].

use nix::sys::signal::Signal;
use std::path::{Path, PathBuf};

/// Releases a ready worker into its measurement phase
pub const START_SIGNAL: Signal = Signal::SIGUSR1;

/// Ends a worker's measurement phase after the in-flight request
pub const STOP_SIGNAL: Signal = Signal::SIGUSR2;

/// File extension of run statistics records
pub const RECORD_EXTENSION: &str = "rec";

/// Resolves marker and record paths inside a scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchPaths {
    dir: PathBuf,
}

impl ScratchPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Readiness marker of the process `pid`
    pub fn marker_for(&self, pid: u32) -> PathBuf {
        self.dir.join(pid.to_string())
    }

    /// Run statistics record of the process `pid`
    pub fn record_for(&self, pid: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", pid, RECORD_EXTENSION))
    }

    /// Readiness marker of the current process
    pub fn own_marker(&self) -> PathBuf {
        self.marker_for(std::process::id())
    }

    /// Run statistics record of the current process
    pub fn own_record(&self) -> PathBuf {
        self.record_for(std::process::id())
    }
}

impl Default for ScratchPaths {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_pid() {
        let paths = ScratchPaths::new("/tmp/colo");
        assert_eq!(paths.marker_for(111003), PathBuf::from("/tmp/colo/111003"));
        assert_eq!(paths.record_for(111003), PathBuf::from("/tmp/colo/111003.rec"));
    }

    #[test]
    fn test_own_paths_use_current_pid() {
        let paths = ScratchPaths::new("/scratch");
        let pid = std::process::id();
        assert_eq!(paths.own_marker(), paths.marker_for(pid));
        assert_eq!(paths.own_record(), paths.record_for(pid));
        assert_ne!(paths.own_marker(), paths.own_record());
    }

    #[test]
    fn test_signals_are_distinct() {
        assert_ne!(START_SIGNAL, STOP_SIGNAL);
    }
}
