//! Run synchronizer for co-located benchmark mixes (colo-run)

use anyhow::Context;
use clap::{Parser, Subcommand};
use colo_core::telemetry::init_tracing;
use colo_core::HarnessConfig;
use colo_sync::{MixConfig, RunSynchronizer};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "colo-run")]
#[command(about = "Launch a worker mix, release it in lockstep and aggregate the results")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Harness configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mix end to end
    Run {
        /// Mix file
        mix: PathBuf,

        /// Worker binary (default: colo-worker next to this executable)
        #[arg(long, value_name = "FILE")]
        worker_bin: Option<PathBuf>,

        /// Keep readiness markers and records after aggregation
        #[arg(long)]
        keep_scratch: bool,
    },
    /// Validate a mix file
    Validate {
        /// Mix file
        mix: PathBuf,
    },
    /// Print an example mix file
    Generate {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(
        &["colo_sync", "colo_stats", "colo_core"],
        &cli.log_level,
        cli.verbose,
    ) {
        eprintln!("{}", e);
    }

    if let Err(e) = dispatch(cli).await {
        error!("colo-run failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            ref mix,
            ref worker_bin,
            keep_scratch,
        } => run_mix(&cli, mix.clone(), worker_bin.clone(), keep_scratch).await,
        Commands::Validate { mix } => validate_mix(mix),
        Commands::Generate { output } => generate_mix(output),
    }
}

async fn run_mix(
    cli: &Cli,
    mix_path: PathBuf,
    worker_bin: Option<PathBuf>,
    keep_scratch: bool,
) -> anyhow::Result<()> {
    let harness = match &cli.config {
        Some(path) => HarnessConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::load().context("loading harness configuration")?,
    };
    let mix = MixConfig::from_yaml_file(&mix_path)
        .with_context(|| format!("loading mix {}", mix_path.display()))?;

    let mut synchronizer = RunSynchronizer::new(mix, harness)
        .keep_scratch(keep_scratch)
        .with_worker_log_level(cli.log_level.clone());
    if let Some(worker_bin) = worker_bin {
        synchronizer = synchronizer.with_worker_program(worker_bin);
    }

    let summary = synchronizer.run().await?;
    info!(
        "Mix {} finished after {:.3}s",
        synchronizer.mix().name(),
        summary.measured.as_secs_f64()
    );

    for (table, _) in &summary.report.tables {
        println!("{}: {}", table.metric, table.row[2..].join(","));
    }

    Ok(())
}

fn validate_mix(mix_path: PathBuf) -> anyhow::Result<()> {
    let mix = MixConfig::from_yaml_file(&mix_path)
        .with_context(|| format!("validating {}", mix_path.display()))?;
    println!(
        "✓ {} is valid ({} workers, mix {})",
        mix_path.display(),
        mix.workers.len(),
        mix.name()
    );
    Ok(())
}

fn generate_mix(output: Option<PathBuf>) -> anyhow::Result<()> {
    let yaml = MixConfig::example().to_yaml()?;
    match output {
        Some(path) => {
            std::fs::write(&path, yaml)?;
            println!("Example mix written to {}", path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
