//! Results analyzer for co-located benchmark runs (colo-analyze)

use anyhow::Context;
use clap::{Parser, Subcommand};
use colo_analyzer::report::{render, write_comparison_csv, EnergyRow, OutputFormat, COMPARISON_FILE};
use colo_analyzer::{build_comparison, discover, AnalyzerConfig};
use colo_core::telemetry::init_tracing;
use colored::*;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "colo-analyze")]
#[command(about = "Compare energy, cost and carbon of shared and dedicated GPU placements")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Analyzer configuration file (device profiles, window)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

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
    /// Operational energy of every configuration
    Energy {
        /// Result tree laid out as <device>/<mix>/<run>
        root: PathBuf,
    },
    /// Single GPU versus GPU-per-model comparison
    Compare {
        /// Result tree laid out as <device>/<mix>/<run>
        root: PathBuf,

        /// Devices to compare (default: every configured device)
        #[arg(short, long = "device", value_name = "DEVICE")]
        devices: Vec<String>,

        /// Comparison CSV output
        #[arg(short, long, default_value = COMPARISON_FILE)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(
        &["colo_analyzer", "colo_stats", "colo_core"],
        &cli.log_level,
        cli.verbose,
    ) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(cli) {
        error!("Analysis failed: {:#}", e);
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AnalyzerConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    match cli.command {
        Commands::Energy { root } => {
            let results = discover(&root, &config)
                .with_context(|| format!("reading results under {}", root.display()))?;
            let rows: Vec<EnergyRow> = results.iter().map(EnergyRow::from).collect();
            println!("{}", render(&rows, cli.format)?);
        }
        Commands::Compare {
            root,
            devices,
            output,
        } => {
            let results = discover(&root, &config)
                .with_context(|| format!("reading results under {}", root.display()))?;
            let devices = if devices.is_empty() {
                config.device_names()
            } else {
                devices
            };

            let rows = build_comparison(&results, &devices, &config)?;
            write_comparison_csv(&rows, &output)
                .with_context(|| format!("writing {}", output.display()))?;

            println!("{}", render(&rows, cli.format)?);
            if cli.format == OutputFormat::Table {
                let message = format!("{} rows written to {}", rows.len(), output.display());
                println!("{} {}", "✓".green().bold(), message.green());
            }
        }
    }

    Ok(())
}
