//! # colo-analyzer
//!
//! Turns a tree of co-located benchmark results into an energy, cost and
//! embodied-carbon comparison between sharing one GPU and giving every model
//! its own GPU.
//!
//! Results are laid out as `<root>/<device>/<mix>/<run>/`, each run directory
//! holding a GPU power log and the per-metric tables written by `colo-stats`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use colo_analyzer::{build_comparison, discover, AnalyzerConfig};
//!
//! let config = AnalyzerConfig::default();
//! let results = discover("results", &config)?;
//! let rows = build_comparison(&results, &["a100".to_string()], &config)?;
//! for row in rows {
//!     println!("{} {} {:.1} J", row.mix, row.sharing_style, row.energy);
//! }
//! # Ok::<(), colo_analyzer::AnalyzerError>(())
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod compare;
pub mod device;
pub mod power;
pub mod report;
pub mod results;

// Re-export main types
pub use compare::{build_comparison, ComparisonRow, SharingStyle};
pub use device::{AnalyzerConfig, DeviceProfile};
pub use power::{EnergyEstimate, PowerSample};
pub use results::{discover, ConfigurationResult};

/// Result type for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors raised while analyzing a result tree
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Invalid analyzer configuration: {0}")]
    InvalidConfig(String),

    #[error("No solo configuration for job {job} of mix {mix} on {device}")]
    MissingSoloConfiguration {
        device: String,
        mix: String,
        job: String,
    },

    #[error("Malformed power log {}: {reason}", .path.display())]
    MalformedPowerLog { path: PathBuf, reason: String },

    #[error("Malformed table {}: {reason}", .path.display())]
    MalformedTable { path: PathBuf, reason: String },

    #[error("Result directory {} is not <device>/<mix>/<run>", .0.display())]
    InvalidLayout(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table error: {0}")]
    Stats(#[from] colo_stats::StatsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AnalyzerError::UnknownDevice(_) | AnalyzerError::InvalidConfig(_) => "config",
            AnalyzerError::MissingSoloConfiguration { .. } | AnalyzerError::InvalidLayout(_) => {
                "layout"
            }
            AnalyzerError::MalformedPowerLog { .. } => "power",
            AnalyzerError::MalformedTable { .. } | AnalyzerError::Stats(_) => "table",
            AnalyzerError::Csv(_) | AnalyzerError::Yaml(_) | AnalyzerError::Json(_) => {
                "serialization"
            }
            AnalyzerError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = AnalyzerError::MissingSoloConfiguration {
            device: "a100".into(),
            mix: "bert-gpt".into(),
            job: "gpt".into(),
        };
        assert_eq!(
            err.to_string(),
            "No solo configuration for job gpt of mix bert-gpt on a100"
        );
        assert_eq!(err.category(), "layout");
        assert_eq!(AnalyzerError::config("bad").category(), "config");
    }
}
