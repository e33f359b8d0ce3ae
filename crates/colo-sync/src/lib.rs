//! # colo-sync
//!
//! Reference run synchronizer for the co-location benchmark harness.
//!
//! Given a mix file it launches one `colo-worker` per entry, waits until
//! every worker has created its readiness marker, releases them all with a
//! back-to-back start broadcast, optionally ends open-ended runs with a stop
//! broadcast, reaps the workers and aggregates their records.
//!
//! ## Example
//!
//! ```rust,no_run
//! use colo_core::HarnessConfig;
//! use colo_sync::{MixConfig, RunSynchronizer};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mix = MixConfig::from_yaml_file("mixes/bert-gpt.yaml")?;
//!     let summary = RunSynchronizer::new(mix, HarnessConfig::load()?).run().await?;
//!     println!("measured for {:?}", summary.measured);
//!     Ok(())
//! }
//! ```

use colo_core::WorkerId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod launcher;
pub mod mix;
pub mod synchronizer;

// Re-export main types
pub use launcher::{default_worker_program, LaunchedWorker, WorkerCommand, WorkerGroup};
pub use mix::{MixConfig, WorkerSpec};
pub use synchronizer::{RunSummary, RunSynchronizer, WorkerRun};

/// Result type for synchronizer operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that abort a synchronized run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid mix: {0}")]
    InvalidMix(String),

    #[error("Failed to launch worker {tid} ({}): {source}", .program.display())]
    Spawn {
        tid: WorkerId,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {tid} (pid {pid}) exited before it was ready: {status}")]
    WorkerExited {
        tid: WorkerId,
        pid: u32,
        status: String,
    },

    #[error("Workers {pending:?} not ready after {waited:?}")]
    ReadyTimeout {
        waited: Duration,
        pending: Vec<WorkerId>,
    },

    #[error("Failed to send {signal} to pid {pid}: {source}")]
    Signal {
        pid: u32,
        signal: nix::sys::signal::Signal,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("Workers failed: {}; records written: {records:?}", .failures.join(", "))]
    WorkerFailed {
        failures: Vec<String>,
        records: Vec<PathBuf>,
    },

    #[error("Aggregation error: {0}")]
    Stats(#[from] colo_stats::StatsError),

    #[error("Core error: {0}")]
    Core(#[from] colo_core::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn invalid_mix(msg: impl Into<String>) -> Self {
        Self::InvalidMix(msg.into())
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::InvalidMix(_) | SyncError::Yaml(_) => "mix",
            SyncError::Spawn { .. } => "spawn",
            SyncError::WorkerExited { .. } | SyncError::ReadyTimeout { .. } => "readiness",
            SyncError::Signal { .. } => "signal",
            SyncError::WorkerFailed { .. } => "worker",
            SyncError::Stats(_) => "aggregation",
            SyncError::Core(_) => "core",
            SyncError::Io(_) => "io",
        }
    }
}
