//! Discovery and loading of per-configuration results

use crate::device::AnalyzerConfig;
use crate::power::{window_energy, EnergyEstimate};
use crate::{AnalyzerError, Result};
use colo_stats::table::read_table;
use colo_stats::Metric;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Table slots read per metric; mixes have at most this many jobs
pub const MAX_JOBS: usize = 3;

/// Separator between model names in a mix directory name
pub const MIX_SEPARATOR: char = '-';

/// Measurements of one (device, mix, run) directory
#[derive(Debug, Clone)]
pub struct ConfigurationResult {
    pub device: String,
    pub mix: String,
    pub run: String,
    pub path: PathBuf,
    pub energy: EnergyEstimate,

    /// Requests per second per job, NaN past the last job
    pub throughput: Vec<f64>,

    /// Latency percentiles in milliseconds per job
    pub p0: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
    pub p100: Vec<f64>,
}

impl ConfigurationResult {
    /// Load the power log and metric tables of a run directory
    pub fn load(
        path: &Path,
        device: &str,
        mix: &str,
        run: &str,
        config: &AnalyzerConfig,
    ) -> Result<Self> {
        let profile = config.profile(device)?;
        let energy = window_energy(
            &path.join(&config.power_file),
            profile.sample_stride,
            config.power_window_samples,
        )?;

        let result = Self {
            device: device.to_string(),
            mix: mix.to_string(),
            run: run.to_string(),
            path: path.to_path_buf(),
            energy,
            throughput: read_first_row(path, Metric::Tput)?,
            p0: read_first_row(path, Metric::TotalP0)?,
            p50: read_first_row(path, Metric::TotalP50)?,
            p90: read_first_row(path, Metric::TotalP90)?,
            p100: read_first_row(path, Metric::TotalP100)?,
        };

        debug!(
            "Loaded {}/{}/{}: {:.1} J over {:.1}s",
            device, mix, run, result.energy.joules, result.energy.duration_s
        );
        Ok(result)
    }

    /// Model names of the mix, in table order
    pub fn jobs(&self) -> Vec<&str> {
        self.mix.split(MIX_SEPARATOR).collect()
    }

    /// Whether the mix runs a single model
    pub fn is_solo(&self) -> bool {
        !self.mix.contains(MIX_SEPARATOR)
    }
}

/// First data row of a metric table, worker columns only, padded with NaN
fn read_first_row(dir: &Path, metric: Metric) -> Result<Vec<f64>> {
    let path = dir.join(format!("{}.csv", metric.name()));
    let (_, rows) = read_table(&path)?;
    let row = rows.first().ok_or_else(|| AnalyzerError::MalformedTable {
        path: path.clone(),
        reason: "no data rows".to_string(),
    })?;

    let mut values = Vec::with_capacity(MAX_JOBS);
    for cell in row.iter().skip(colo_stats::table::KEY_COLUMNS.len()) {
        let cell = cell.trim();
        let value = if cell.is_empty() {
            f64::NAN
        } else {
            cell.parse().map_err(|_| AnalyzerError::MalformedTable {
                path: path.clone(),
                reason: format!("'{}' is not a number", cell),
            })?
        };
        values.push(value);
    }
    if values.len() < MAX_JOBS {
        values.resize(MAX_JOBS, f64::NAN);
    }
    Ok(values)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| AnalyzerError::InvalidLayout(entry.path()))?;
        dirs.push((name, entry.path()));
    }
    dirs.sort();
    Ok(dirs)
}

/// Load every `<device>/<mix>/<run>` configuration under `root`
pub fn discover(root: impl AsRef<Path>, config: &AnalyzerConfig) -> Result<Vec<ConfigurationResult>> {
    let root = root.as_ref();
    let mut results = Vec::new();

    for (device, device_dir) in sorted_subdirs(root)? {
        for (mix, mix_dir) in sorted_subdirs(&device_dir)? {
            for (run, run_dir) in sorted_subdirs(&mix_dir)? {
                results.push(ConfigurationResult::load(&run_dir, &device, &mix, &run, config)?);
            }
        }
    }

    info!("Discovered {} configurations under {}", results.len(), root.display());
    Ok(results)
}
