//! Per-device cost and carbon constants

use crate::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Service life a GPU's embodied carbon is amortized over: four years of 352
/// days
pub const GPU_LIFETIME_S: f64 = 4.0 * 352.0 * 24.0 * 60.0 * 60.0;

/// Length of one experiment in the comparison
pub const EXPERIMENT_WINDOW_S: f64 = 300.0;

/// Power samples kept at the end of each log (after striding)
pub const POWER_WINDOW_SAMPLES: usize = 301;

/// Power log file inside each configuration directory
pub const POWER_LOG_FILE: &str = "pwr.csv";

// Manufacturing footprints in g CO2e
pub const RTX_4090_EMBODIED_CARBON_G: f64 =
    1.0 / 0.9 * (583.0 * 2.75 + 430.0 + 500.0) * 6.09 + 66.60 * 24.0 + 2.0 * 150.0;
pub const A100_EMBODIED_CARBON_G: f64 =
    1.0 / 0.9 * (583.0 * 1.52 + 350.0 + 500.0) * 8.26 + 66.60 * 80.0 + 2.0 * 150.0;
pub const A6000_EMBODIED_CARBON_G: f64 =
    1.0 / 0.9 * (583.0 * 2.15 + 350.0 + 500.0) * 6.28 + 66.60 * 48.0 + 2.0 * 150.0;

/// Rental price and footprint of one GPU model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Directory name used for the device in result trees
    pub name: String,

    /// On-demand price in $/hour
    pub cost_per_hour: f64,

    /// Embodied carbon in g CO2e
    pub embodied_carbon_g: f64,

    /// Keep every n-th power sample; matches the sampler's rate on this device
    pub sample_stride: usize,
}

impl DeviceProfile {
    pub fn rtx_4090() -> Self {
        Self {
            name: "4090".to_string(),
            cost_per_hour: 0.50,
            embodied_carbon_g: RTX_4090_EMBODIED_CARBON_G,
            sample_stride: 1,
        }
    }

    pub fn a100() -> Self {
        Self {
            name: "a100".to_string(),
            cost_per_hour: 1.79,
            embodied_carbon_g: A100_EMBODIED_CARBON_G,
            sample_stride: 4,
        }
    }

    pub fn a6000() -> Self {
        Self {
            name: "a6000".to_string(),
            cost_per_hour: 0.80,
            embodied_carbon_g: A6000_EMBODIED_CARBON_G,
            sample_stride: 8,
        }
    }

    /// Share of the embodied carbon attributable to `busy_s` seconds of use
    pub fn carbon_for(&self, busy_s: f64, lifetime_s: f64) -> f64 {
        self.embodied_carbon_g * busy_s / lifetime_s
    }

    /// Rental cost of `busy_s` seconds
    pub fn cost_for(&self, busy_s: f64) -> f64 {
        self.cost_per_hour * busy_s / 3600.0
    }
}

/// Analyzer settings, overridable from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub devices: Vec<DeviceProfile>,

    /// Amortization period of embodied carbon, in seconds
    pub lifetime_s: f64,

    /// Experiment length the comparison normalizes to, in seconds
    pub window_s: f64,

    /// Trailing power samples integrated per configuration
    pub power_window_samples: usize,

    /// Power log file name inside a configuration directory
    pub power_file: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            devices: vec![
                DeviceProfile::rtx_4090(),
                DeviceProfile::a100(),
                DeviceProfile::a6000(),
            ],
            lifetime_s: GPU_LIFETIME_S,
            window_s: EXPERIMENT_WINDOW_S,
            power_window_samples: POWER_WINDOW_SAMPLES,
            power_file: POWER_LOG_FILE.to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Load and validate a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(AnalyzerError::config("at least one device profile is required"));
        }

        for device in &self.devices {
            if device.sample_stride == 0 {
                return Err(AnalyzerError::config(format!(
                    "device {} has a zero sample stride",
                    device.name
                )));
            }
            if device.cost_per_hour < 0.0 || device.embodied_carbon_g < 0.0 {
                return Err(AnalyzerError::config(format!(
                    "device {} has a negative cost or carbon figure",
                    device.name
                )));
            }
        }

        if self.lifetime_s <= 0.0 || self.window_s <= 0.0 {
            return Err(AnalyzerError::config("lifetime_s and window_s must be positive"));
        }

        if self.power_window_samples < 2 {
            return Err(AnalyzerError::config("power_window_samples must be at least 2"));
        }

        Ok(())
    }

    /// Profile of the named device
    pub fn profile(&self, device: &str) -> Result<&DeviceProfile> {
        self.devices
            .iter()
            .find(|profile| profile.name == device)
            .ok_or_else(|| AnalyzerError::UnknownDevice(device.to_string()))
    }

    pub fn device_names(&self) -> Vec<String> {
        self.devices.iter().map(|device| device.name.clone()).collect()
    }
}
