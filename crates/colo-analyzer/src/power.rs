//! GPU power logs and operational energy
//!
//! Logs are the CSV an `nvidia-smi --query-gpu=timestamp,power.draw` sidecar
//! writes: a timestamp column and a wattage column with a ` W` suffix.

use crate::{AnalyzerError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Timestamp column header
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Wattage column header
pub const POWER_COLUMN: &str = "power.draw [W]";

/// Format of the timestamp column
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";

/// A single power measurement
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSample {
    pub timestamp: NaiveDateTime,
    pub watts: f64,
}

/// Result of integrating power samples over time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEstimate {
    pub joules: f64,
    pub mean_watts: f64,
    pub peak_watts: f64,
    pub duration_s: f64,
    pub samples: usize,
}

/// Parse a reading such as `212.45 W`
pub fn parse_watts(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('W').unwrap_or(trimmed).trim();
    number.parse().ok()
}

/// Read every sample of a power log
pub fn read_power_log(path: &Path) -> Result<Vec<PowerSample>> {
    let malformed = |reason: String| AnalyzerError::MalformedPowerLog {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| malformed(format!("missing column '{}'", name)))
    };
    let timestamp_idx = column(TIMESTAMP_COLUMN)?;
    let power_idx = column(POWER_COLUMN)?;

    let mut samples = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let raw_timestamp = record.get(timestamp_idx).unwrap_or_default();
        let raw_power = record.get(power_idx).unwrap_or_default();

        let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| malformed(format!("row {}: bad timestamp '{}': {}", line + 1, raw_timestamp, e)))?;
        let watts = parse_watts(raw_power)
            .ok_or_else(|| malformed(format!("row {}: bad power reading '{}'", line + 1, raw_power)))?;

        samples.push(PowerSample { timestamp, watts });
    }

    debug!("Read {} power samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Every `stride`-th sample starting with the first, then the last `window`
/// of those
pub fn steady_state_window(samples: &[PowerSample], stride: usize, window: usize) -> Vec<PowerSample> {
    let strided: Vec<PowerSample> = samples.iter().step_by(stride.max(1)).cloned().collect();
    let skip = strided.len().saturating_sub(window);
    strided.into_iter().skip(skip).collect()
}

/// Trapezoidal integral of power over the sample timestamps.
///
/// Samples must be in time order. Fewer than two samples integrate to zero.
pub fn integrate(samples: &[PowerSample]) -> EnergyEstimate {
    let n = samples.len();
    let peak_watts = samples
        .iter()
        .map(|sample| sample.watts)
        .fold(f64::NEG_INFINITY, f64::max);
    let mean_watts = if n == 0 {
        0.0
    } else {
        samples.iter().map(|sample| sample.watts).sum::<f64>() / n as f64
    };

    let mut joules = 0.0;
    let mut duration_s = 0.0;
    for pair in samples.windows(2) {
        let delta = pair[1].timestamp - pair[0].timestamp;
        let dt_s = delta.num_microseconds().unwrap_or(0) as f64 / 1_000_000.0;
        if dt_s < 0.0 {
            warn!("Power samples out of order at {}", pair[1].timestamp);
            continue;
        }
        joules += (pair[0].watts + pair[1].watts) / 2.0 * dt_s;
        duration_s += dt_s;
    }

    EnergyEstimate {
        joules,
        mean_watts,
        peak_watts: if n == 0 { 0.0 } else { peak_watts },
        duration_s,
        samples: n,
    }
}

/// Energy over the trailing window of a power log
pub fn window_energy(path: &Path, stride: usize, window: usize) -> Result<EnergyEstimate> {
    let samples = read_power_log(path)?;
    let windowed = steady_state_window(&samples, stride, window);
    if windowed.len() < 2 {
        return Err(AnalyzerError::MalformedPowerLog {
            path: path.to_path_buf(),
            reason: format!("{} samples left after striding, need at least 2", windowed.len()),
        });
    }
    Ok(integrate(&windowed))
}
