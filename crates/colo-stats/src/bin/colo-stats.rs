//! Stats aggregator for co-located benchmark runs (colo-stats)

use anyhow::Context;
use clap::Parser;
use colo_core::telemetry::init_tracing;
use colo_core::HarnessConfig;
use colo_stats::Aggregator;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "colo-stats")]
#[command(about = "Append worker run records to per-metric result tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Label written to the mode column (e.g. solo, colocated)
    #[arg(long)]
    mode: String,

    /// Directory holding the metric tables; created if absent
    #[arg(long, alias = "result_dir", value_name = "DIR")]
    result_dir: PathBuf,

    /// Run record files written by the workers
    #[arg(required = true, num_args = 1.., value_name = "RECORD")]
    records: Vec<PathBuf>,

    /// Harness configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&["colo_stats", "colo_core"], &cli.log_level, cli.verbose) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(cli) {
        error!("Aggregation failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let harness = match &cli.config {
        Some(path) => HarnessConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::load().context("loading harness configuration")?,
    };

    let report =
        Aggregator::from_harness(&harness, &cli.mode, &cli.result_dir).aggregate(&cli.records)?;

    for (table, _) in &report.tables {
        let cells: Vec<String> = table.header[2..]
            .iter()
            .zip(&table.row[2..])
            .map(|(column, value)| {
                let shown = if value.is_empty() { "-" } else { value.as_str() };
                format!("{}={}", column, shown)
            })
            .collect();
        println!("{}: {}", table.metric, cells.join(" "));
    }

    Ok(())
}
