//! # colo-worker
//!
//! The worker process of the co-location benchmark harness.
//!
//! A worker wraps one [`InferenceUnit`](colo_core::InferenceUnit) and walks it
//! through five strict phases:
//!
//! 1. load the model and its input data
//! 2. warm up with a few discarded requests
//! 3. create a readiness marker and wait for the start signal
//! 4. measure until the request budget runs out or a stop signal arrives
//! 5. persist a run statistics record for the aggregator
//!
//! Workers never talk to each other. The only channels are two OS signals,
//! latched by [`RunLatch`], and files in the scratch directory.
//!
//! ## Example
//!
//! ```rust,no_run
//! use colo_core::{HarnessConfig, ModelKind, UnitSpec};
//! use colo_worker::{Executor, ExecutorConfig, RunLatch, UnitRegistry};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = UnitRegistry::default();
//!     let unit = registry.create(&UnitSpec::new(ModelKind::Bert, 0, 1))?;
//!
//!     let config = ExecutorConfig::from_harness(&HarnessConfig::default(), 0, 100);
//!     let mut executor = Executor::new(unit, config, RunLatch::process());
//!     let outcome = executor.run()?;
//!     println!("throughput: {:.2}/s", outcome.record.stats.throughput);
//!     Ok(())
//! }
//! ```

use thiserror::Error;

pub mod executor;
pub mod profiler;
pub mod registry;
pub mod signals;
pub mod simulated;

// Re-export main types
pub use executor::{
    Executor, ExecutorConfig, LoopStats, RunOutcome, WorkerPhase, UNBOUNDED_REQUESTS,
};
pub use profiler::{NoopProfiler, ProfilerMarkers, TracingProfiler};
pub use registry::{UnitFactory, UnitRegistry};
pub use signals::RunLatch;
pub use simulated::SimulatedUnit;

/// Result type for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Errors that can occur while running a worker
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Setup failed during {stage}: {source}")]
    Setup {
        stage: &'static str,
        #[source]
        source: colo_core::Error,
    },

    #[error("Inference failed after {completed} completed items: {source}")]
    Inference {
        completed: u64,
        #[source]
        source: colo_core::Error,
    },

    #[error("No inference unit registered for model kind: {0}")]
    UnsupportedModel(colo_core::ModelKind),

    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: WorkerPhase, to: WorkerPhase },

    #[error("Signal error: {0}")]
    Signal(#[from] nix::errno::Errno),

    #[error("Core error: {0}")]
    Core(#[from] colo_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Whether the worker died before it could have written a record
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, WorkerError::Setup { .. } | WorkerError::UnsupportedModel(_))
    }
}
