//! Mix files: which workers run together and where their results go

use crate::{Result, SyncError};
use colo_core::{ModelKind, ReleaseMode, UnitSpec, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_ready_timeout_s() -> u64 {
    600
}

/// One worker of a mix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub model: ModelKind,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Measured request budget; open-ended when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_infer: Option<u64>,

    pub tid: WorkerId,
}

fn default_batch_size() -> u32 {
    1
}

impl WorkerSpec {
    pub fn unit_spec(&self, device_id: u32) -> UnitSpec {
        UnitSpec::new(self.model, device_id, self.batch_size)
    }
}

/// A set of workers launched, released and aggregated together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixConfig {
    /// Label for the aggregator's mode column
    pub mode: String,

    /// Directory receiving the metric tables
    pub result_dir: PathBuf,

    /// GPU index shared by every worker
    #[serde(default)]
    pub device_id: u32,

    /// Send the stop signal this long after the start signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f64>,

    /// How long workers may take to load and warm up
    #[serde(default = "default_ready_timeout_s")]
    pub ready_timeout_s: u64,

    /// Marker and record directory; the harness default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,

    /// Warmup override passed to every worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<u32>,

    /// Release mode override passed to every worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseMode>,

    pub workers: Vec<WorkerSpec>,
}

impl MixConfig {
    /// Load and validate a mix file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mix: Self = serde_yaml::from_str(content)?;
        mix.validate()?;
        Ok(mix)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the mix
    pub fn validate(&self) -> Result<()> {
        if self.mode.trim().is_empty() {
            return Err(SyncError::invalid_mix("mode must not be empty"));
        }

        if self.workers.is_empty() {
            return Err(SyncError::invalid_mix("a mix needs at least one worker"));
        }

        let mut tids = HashSet::new();
        for worker in &self.workers {
            if !tids.insert(worker.tid) {
                return Err(SyncError::invalid_mix(format!("duplicate tid {}", worker.tid)));
            }
            if worker.batch_size == 0 {
                return Err(SyncError::invalid_mix(format!(
                    "worker {} has a zero batch size",
                    worker.tid
                )));
            }
            if worker.num_infer.is_none() && self.duration_s.is_none() {
                return Err(SyncError::invalid_mix(format!(
                    "worker {} is open-ended but the mix sets no duration_s",
                    worker.tid
                )));
            }
        }

        if let Some(duration) = self.duration_s {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(SyncError::invalid_mix("duration_s must be positive"));
            }
            Duration::try_from_secs_f64(duration)
                .map_err(|e| SyncError::invalid_mix(format!("duration_s {}: {}", duration, e)))?;
        }

        if self.ready_timeout_s == 0 {
            return Err(SyncError::invalid_mix("ready_timeout_s must be positive"));
        }

        Ok(())
    }

    /// Model names joined with `-`, e.g. `bert-gpt`
    pub fn name(&self) -> String {
        self.workers
            .iter()
            .map(|worker| worker.model.as_str())
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_s
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_s)
    }

    /// An example two-model mix
    pub fn example() -> Self {
        Self {
            mode: "colocated".to_string(),
            result_dir: PathBuf::from("results/4090/bert-gpt/0"),
            device_id: 0,
            duration_s: Some(300.0),
            ready_timeout_s: default_ready_timeout_s(),
            scratch_dir: None,
            warmup: None,
            release: None,
            workers: vec![
                WorkerSpec {
                    model: ModelKind::Bert,
                    batch_size: 1,
                    num_infer: None,
                    tid: 0,
                },
                WorkerSpec {
                    model: ModelKind::Gpt,
                    batch_size: 1,
                    num_infer: None,
                    tid: 1,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIX: &str = r#"
mode: test
result_dir: /tmp/results
device_id: 1
workers:
  - model: bert
    num_infer: 10
    tid: 0
  - model: gpt
    batch_size: 2
    num_infer: 20
    tid: 1
"#;

    #[test]
    fn test_parse_mix() {
        let mix = MixConfig::from_yaml_str(MIX).unwrap();
        assert_eq!(mix.name(), "bert-gpt");
        assert_eq!(mix.ready_timeout(), Duration::from_secs(600));
        assert_eq!(mix.duration(), None);
        assert_eq!(mix.workers[0].batch_size, 1);
        assert_eq!(mix.workers[1].unit_spec(mix.device_id).unit_id(), "gpt-2");
    }

    #[test]
    fn test_example_round_trips() {
        let example = MixConfig::example();
        example.validate().unwrap();
        let yaml = example.to_yaml().unwrap();
        assert_eq!(MixConfig::from_yaml_str(&yaml).unwrap(), example);
    }

    #[test]
    fn test_rejects_duplicate_tids() {
        let mut mix = MixConfig::from_yaml_str(MIX).unwrap();
        mix.workers[1].tid = 0;
        let err = mix.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate tid 0"));
    }

    #[test]
    fn test_open_ended_needs_duration() {
        let mut mix = MixConfig::from_yaml_str(MIX).unwrap();
        mix.workers[0].num_infer = None;
        assert!(mix.validate().is_err());

        mix.duration_s = Some(5.0);
        assert!(mix.validate().is_ok());

        mix.duration_s = Some(0.0);
        assert!(mix.validate().is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_duration() {
        let mut mix = MixConfig::from_yaml_str(MIX).unwrap();
        mix.duration_s = Some(1e30);

        let err = mix.validate().unwrap_err();
        assert!(matches!(err, SyncError::InvalidMix(ref msg) if msg.contains("duration_s")));
        assert_eq!(mix.duration(), None);
    }

    #[test]
    fn test_rejects_unknown_model() {
        let yaml = MIX.replace("model: gpt", "model: resnet");
        assert!(matches!(
            MixConfig::from_yaml_str(&yaml).unwrap_err(),
            SyncError::Yaml(_)
        ));
    }
}
