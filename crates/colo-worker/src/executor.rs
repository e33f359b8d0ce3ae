//! The worker's phase state machine and timed request loop

use crate::profiler::{NoopProfiler, ProfilerMarkers};
use crate::signals::RunLatch;
use crate::{Result, WorkerError};
use colo_core::config::ReleaseMode;
use colo_core::{HarnessConfig, InferenceUnit, RunRecord, RunStats, ScratchPaths, WorkerId};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Request budget meaning "run until stopped"
pub const UNBOUNDED_REQUESTS: u64 = u64::MAX;

/// Name of the profiler range wrapping the measurement phase
const MEASUREMENT_RANGE: &str = "start";

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Created,
    Loading,
    WarmingUp,
    ReadyWaiting,
    Measuring,
    /// Request budget exhausted
    Completed,
    /// Stop signal observed before the budget ran out
    StoppedEarly,
}

impl WorkerPhase {
    /// Whether `next` directly follows this phase
    pub fn can_transition_to(self, next: WorkerPhase) -> bool {
        use WorkerPhase::*;
        matches!(
            (self, next),
            (Created, Loading)
                | (Loading, WarmingUp)
                | (WarmingUp, ReadyWaiting)
                | (ReadyWaiting, Measuring)
                | (Measuring, Completed)
                | (Measuring, StoppedEarly)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerPhase::Completed | WorkerPhase::StoppedEarly)
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Created => "created",
            WorkerPhase::Loading => "loading",
            WorkerPhase::WarmingUp => "warming_up",
            WorkerPhase::ReadyWaiting => "ready_waiting",
            WorkerPhase::Measuring => "measuring",
            WorkerPhase::Completed => "completed",
            WorkerPhase::StoppedEarly => "stopped_early",
        };
        f.write_str(name)
    }
}

/// Per-run settings of an [`Executor`]
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Measured request budget
    pub num_requests: u64,

    /// Slot of this worker within its mix
    pub tid: WorkerId,

    /// Requests run and discarded before reporting ready
    pub warmup_requests: u32,

    /// How to wait for the start latch
    pub release: ReleaseMode,

    /// Sleep between latch polls in block mode
    pub block_poll: Duration,

    /// Where the marker and record go
    pub paths: ScratchPaths,
}

impl ExecutorConfig {
    pub fn from_harness(harness: &HarnessConfig, tid: WorkerId, num_requests: u64) -> Self {
        Self {
            num_requests,
            tid,
            warmup_requests: harness.warmup_requests,
            release: harness.release,
            block_poll: harness.block_poll(),
            paths: ScratchPaths::new(harness.scratch_dir.clone()),
        }
    }
}

/// Result of one pass of the timed request loop
#[derive(Debug, Clone, Default)]
pub struct LoopStats {
    /// `infer()` calls made
    pub requests: u64,

    /// Items reported by those calls
    pub completed: u64,

    /// Wall-clock time of the whole loop
    pub elapsed: Duration,

    /// Duration of each call, in seconds
    pub latencies_s: Vec<f64>,

    /// Whether the loop ended on the stop latch
    pub stopped: bool,
}

impl LoopStats {
    /// Completed items per second of loop wall-clock time
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }
}

/// What a finished worker leaves behind
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: RunRecord,
    pub record_path: PathBuf,
    pub marker_path: PathBuf,
    pub phase: WorkerPhase,
}

/// Drives one inference unit through load, warmup, release, measurement
/// and report.
pub struct Executor<U: InferenceUnit> {
    unit: U,
    config: ExecutorConfig,
    latch: RunLatch,
    profiler: Box<dyn ProfilerMarkers>,
    phase: WorkerPhase,
}

impl<U: InferenceUnit> Executor<U> {
    pub fn new(unit: U, config: ExecutorConfig, latch: RunLatch) -> Self {
        Self {
            unit,
            config,
            latch,
            profiler: Box::new(NoopProfiler),
            phase: WorkerPhase::Created,
        }
    }

    /// Replace the default no-op profiler
    pub fn with_profiler(mut self, profiler: Box<dyn ProfilerMarkers>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn transition(&mut self, next: WorkerPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(WorkerError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        info!(tid = self.config.tid, "Worker phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Run all phases and persist the record.
    ///
    /// Load failures return [`WorkerError::Setup`] before any marker or record
    /// exists.
    pub fn run(&mut self) -> Result<RunOutcome> {
        self.transition(WorkerPhase::Loading)?;

        // Handlers go in before anything a synchronizer could observe
        self.latch.arm()?;

        self.unit
            .load_model()
            .map_err(|source| WorkerError::Setup { stage: "load_model", source })?;
        self.unit
            .load_data()
            .map_err(|source| WorkerError::Setup { stage: "load_data", source })?;

        self.transition(WorkerPhase::WarmingUp)?;
        let warmup = self.run_loop(u64::from(self.config.warmup_requests), false)?;
        debug!(
            requests = warmup.requests,
            elapsed_ms = warmup.elapsed.as_millis() as u64,
            "Warmup finished"
        );

        self.transition(WorkerPhase::ReadyWaiting)?;
        let marker_path = self.config.paths.own_marker();
        std::fs::File::create(&marker_path)?;
        debug!("Created readiness marker {}", marker_path.display());
        self.latch
            .wait_for_release(self.config.release, self.config.block_poll);

        self.transition(WorkerPhase::Measuring)?;
        self.profiler.start();
        self.profiler.range_push(MEASUREMENT_RANGE);
        let measured = self.run_loop(self.config.num_requests, true);
        self.profiler.range_pop();
        self.profiler.stop();
        let measured = measured?;

        let terminal = if measured.stopped {
            WorkerPhase::StoppedEarly
        } else {
            WorkerPhase::Completed
        };
        self.transition(terminal)?;

        let throughput = measured.throughput();
        let record = RunRecord::new(
            self.config.tid,
            RunStats {
                model_id: self.unit.id(),
                throughput,
                latencies_s: measured.latencies_s,
            },
        );
        let record_path = self.config.paths.own_record();
        record.write_to(&record_path)?;

        info!(
            tid = self.config.tid,
            requests = measured.requests,
            completed = measured.completed,
            throughput,
            "Wrote run record {}",
            record_path.display()
        );

        Ok(RunOutcome {
            record,
            record_path,
            marker_path,
            phase: self.phase,
        })
    }

    /// Time up to `budget` calls to `infer()`.
    ///
    /// With `honor_stop` the stop latch is checked before each call; a call
    /// already in flight always completes.
    pub fn run_loop(&mut self, budget: u64, honor_stop: bool) -> Result<LoopStats> {
        let mut stats = LoopStats::default();
        let started = Instant::now();

        while stats.requests < budget {
            if honor_stop && self.latch.is_stop_requested() {
                stats.stopped = true;
                break;
            }

            let call_started = Instant::now();
            let items = self.unit.infer().map_err(|source| WorkerError::Inference {
                completed: stats.completed,
                source,
            })?;
            let latency = call_started.elapsed().as_secs_f64();

            trace!(request = stats.requests, items, latency_s = latency, "Inference done");
            stats.latencies_s.push(latency);
            stats.completed += items;
            stats.requests += 1;
        }

        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}
