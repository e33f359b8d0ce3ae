//! # colo-stats
//!
//! Aggregates the run records of one experiment configuration into
//! accumulating per-metric CSV tables.
//!
//! Every invocation appends exactly one row to each of `tput.csv`,
//! `total_p0.csv`, `total_p50.csv`, `total_p90.csv`, `total_p99.csv` and
//! `total_p100.csv` in the result directory. Concurrent invocations against the
//! same directory are serialized by an exclusive advisory lock.
//!
//! ## Example
//!
//! ```rust,no_run
//! use colo_stats::Aggregator;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = Aggregator::new("colocated", "results/bert-gpt")
//!         .aggregate(&["/tmp/4242.rec", "/tmp/4243.rec"])?;
//!     println!("{} workers aggregated", report.workers.len());
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod aggregator;
pub mod lock;
pub mod metrics;
pub mod percentile;
pub mod table;

// Re-export main types
pub use aggregator::{collect_workers, AggregateReport, Aggregator};
pub use lock::DirLock;
pub use metrics::{Metric, WorkerMetrics};
pub use percentile::{percentile_sorted, percentiles, REPORTED_PERCENTILES};
pub use table::{AppendOutcome, MetricTable};

/// Result type for aggregation
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors that abort an aggregation
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("No record files given")]
    NoRecords,

    #[error("Record file not found: {}", .0.display())]
    MissingRecord(PathBuf),

    #[error("Worker {tid} reported unit '{found}' but an earlier record reported '{expected}'")]
    InconsistentUnit {
        tid: colo_core::WorkerId,
        expected: String,
        found: String,
    },

    #[error("Failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Core error: {0}")]
    Core(#[from] colo_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StatsError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            StatsError::NoRecords | StatsError::MissingRecord(_) => "input",
            StatsError::InconsistentUnit { .. } => "consistency",
            StatsError::Lock { .. } => "lock",
            StatsError::Csv(_) => "csv",
            StatsError::Core(_) => "record",
            StatsError::Io(_) => "io",
        }
    }
}
