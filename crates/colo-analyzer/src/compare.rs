//! Single GPU versus GPU-per-model comparison

use crate::device::{AnalyzerConfig, DeviceProfile};
use crate::results::ConfigurationResult;
use crate::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// How the jobs of a mix are placed on GPUs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharingStyle {
    /// All jobs co-located on one GPU for the whole window
    #[serde(rename = "Single GPU")]
    SingleGpu,

    /// Every job on a GPU of its own, each busy only for its jobs' requests
    #[serde(rename = "GPU/model")]
    GpuPerModel,
}

impl SharingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharingStyle::SingleGpu => "Single GPU",
            SharingStyle::GpuPerModel => "GPU/model",
        }
    }
}

impl fmt::Display for SharingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub mix: String,
    pub device: String,
    pub sharing_style: SharingStyle,

    /// Requests served across all jobs during the window
    pub num_inferences: f64,

    /// Seconds until the last job finishes
    pub latency: f64,

    /// Operational energy in joules
    pub energy: f64,

    /// Amortized embodied carbon in g CO2e
    pub embodied_carbon: f64,

    /// Rental cost in dollars
    pub cost: f64,
    pub gpu_hours: f64,
}

/// Compare every multi-model mix on each of `devices`
pub fn build_comparison(
    results: &[ConfigurationResult],
    devices: &[String],
    config: &AnalyzerConfig,
) -> Result<Vec<ComparisonRow>> {
    let mut rows = Vec::new();

    for device in devices {
        let profile = config.profile(device)?;
        for mix in results
            .iter()
            .filter(|result| &result.device == device && !result.is_solo())
        {
            let requests: Vec<f64> = mix
                .throughput
                .iter()
                .take(mix.jobs().len())
                .map(|tput| tput * config.window_s)
                .collect();

            rows.push(single_gpu_row(mix, profile, &requests, config));
            rows.push(gpu_per_model_row(mix, profile, &requests, results, config)?);
        }
    }

    info!("Built {} comparison rows", rows.len());
    Ok(rows)
}

fn single_gpu_row(
    mix: &ConfigurationResult,
    profile: &DeviceProfile,
    requests: &[f64],
    config: &AnalyzerConfig,
) -> ComparisonRow {
    ComparisonRow {
        mix: mix.mix.clone(),
        device: mix.device.clone(),
        sharing_style: SharingStyle::SingleGpu,
        num_inferences: requests.iter().sum(),
        latency: config.window_s,
        energy: mix.energy.joules,
        embodied_carbon: profile.carbon_for(config.window_s, config.lifetime_s),
        cost: profile.cost_for(config.window_s),
        gpu_hours: config.window_s / 3600.0,
    }
}

fn gpu_per_model_row(
    mix: &ConfigurationResult,
    profile: &DeviceProfile,
    requests: &[f64],
    results: &[ConfigurationResult],
    config: &AnalyzerConfig,
) -> Result<ComparisonRow> {
    let mut row = ComparisonRow {
        mix: mix.mix.clone(),
        device: mix.device.clone(),
        sharing_style: SharingStyle::GpuPerModel,
        num_inferences: requests.iter().sum(),
        latency: 0.0,
        energy: 0.0,
        embodied_carbon: 0.0,
        cost: 0.0,
        gpu_hours: 0.0,
    };

    for (job, &job_requests) in mix.jobs().into_iter().zip(requests) {
        let solo = results
            .iter()
            .find(|result| result.device == mix.device && result.mix == job)
            .ok_or_else(|| AnalyzerError::MissingSoloConfiguration {
                device: mix.device.clone(),
                mix: mix.mix.clone(),
                job: job.to_string(),
            })?;

        // Worst-case latency per request, in seconds
        let request_latency = solo.p100[0] / 1000.0;
        let busy_s = request_latency * job_requests;
        let energy_per_request = solo.energy.joules / (solo.throughput[0] * config.window_s);

        debug!(
            "{} on {}: {:.1} requests, {:.3}s busy",
            job, mix.device, job_requests, busy_s
        );

        row.energy += energy_per_request * job_requests;
        row.embodied_carbon += profile.carbon_for(busy_s, config.lifetime_s);
        row.cost += profile.cost_for(busy_s);
        row.latency = row.latency.max(busy_s);
        row.gpu_hours += busy_s / 3600.0;
    }

    Ok(row)
}
