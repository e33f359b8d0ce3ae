//! Inference worker for co-located GPU benchmarks (colo-worker)

use anyhow::Context;
use clap::Parser;
use colo_core::telemetry::init_tracing;
use colo_core::{HarnessConfig, ModelKind, ReleaseMode, UnitSpec, WorkerId};
use colo_worker::{
    Executor, ExecutorConfig, RunLatch, TracingProfiler, UnitRegistry, UNBOUNDED_REQUESTS,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "colo-worker")]
#[command(about = "Run one inference workload in lockstep with its co-located peers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// GPU index to run on
    #[arg(long, default_value_t = 0)]
    device_id: u32,

    /// Model kind (diffusion, bert, gpt, whisper)
    #[arg(long, default_value = "diffusion")]
    model: ModelKind,

    /// Items per inference call
    #[arg(long, default_value_t = 1)]
    batch_size: u32,

    /// Measured request budget; unbounded unless set
    #[arg(long, default_value_t = UNBOUNDED_REQUESTS)]
    num_infer: u64,

    /// Slot of this worker within its mix
    #[arg(long, default_value_t = 0)]
    tid: WorkerId,

    /// Directory for readiness markers and run records
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Discarded warmup requests
    #[arg(long)]
    warmup: Option<u32>,

    /// How to wait for the start signal (spin or block)
    #[arg(long)]
    release: Option<ReleaseMode>,

    /// Harness configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Wrap the measurement phase in a profiler range
    #[arg(long)]
    profile: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&["colo_worker", "colo_core"], &cli.log_level, cli.verbose) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(cli) {
        error!("Worker failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut harness = match &cli.config {
        Some(path) => HarnessConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::load().context("loading harness configuration")?,
    };

    // Apply CLI overrides
    if let Some(scratch_dir) = cli.scratch_dir {
        harness.scratch_dir = scratch_dir;
    }
    if let Some(warmup) = cli.warmup {
        harness.warmup_requests = warmup;
    }
    if let Some(release) = cli.release {
        harness.release = release;
    }
    harness.validate()?;

    let spec = UnitSpec::new(cli.model, cli.device_id, cli.batch_size);
    let unit = UnitRegistry::default().create(&spec)?;

    info!(
        pid = std::process::id(),
        tid = cli.tid,
        release = %harness.release,
        "Starting worker for {} on device {}",
        spec.unit_id(),
        spec.device_id
    );

    let config = ExecutorConfig::from_harness(&harness, cli.tid, cli.num_infer);
    let mut executor = Executor::new(unit, config, RunLatch::process());
    if cli.profile {
        executor = executor.with_profiler(Box::new(TracingProfiler::new()));
    }

    let outcome = executor.run()?;
    info!(
        "Worker finished ({}) with {} measured requests",
        outcome.phase,
        outcome.record.stats.latencies_s.len()
    );

    Ok(())
}
