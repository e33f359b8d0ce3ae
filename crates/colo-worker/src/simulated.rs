//! Sleep-based stand-ins for the real model backends
//!
//! A [`SimulatedUnit`] behaves like a model of its kind as far as the harness
//! can tell: it must be loaded before use, cycles through a fixed input set
//! and takes a kind-specific service time per call that grows sub-linearly
//! with the batch size.

use colo_core::{Error, InferenceUnit, ModelKind, Result, UnitSpec};
use std::time::Duration;
use tracing::debug;

/// Fraction of the per-item cost paid for every item after the first
const BATCH_EFFICIENCY: f64 = 0.8;

const DIFFUSION_PROMPTS: &[&str] = &[
    "a photograph of an astronaut riding a horse",
    "a watercolor painting of a lighthouse at dusk",
    "an isometric render of a tiny city on a floating island",
];

const TEXT_PROMPTS: &[&str] = &[
    "The capital of France is [MASK].",
    "Benchmarks are only useful when they are",
    "GPUs shared between several models tend to",
];

const AUDIO_CLIPS: &[&str] = &["clip-0000.flac", "clip-0001.flac", "clip-0002.flac"];

/// Nominal time of one single-item call for a model kind
pub fn nominal_service_time(kind: ModelKind) -> Duration {
    match kind {
        ModelKind::Diffusion => Duration::from_millis(40),
        ModelKind::Gpt => Duration::from_millis(20),
        ModelKind::Whisper => Duration::from_millis(10),
        ModelKind::Bert => Duration::from_millis(2),
    }
}

fn inputs_for(kind: ModelKind) -> &'static [&'static str] {
    match kind {
        ModelKind::Diffusion => DIFFUSION_PROMPTS,
        ModelKind::Bert | ModelKind::Gpt => TEXT_PROMPTS,
        ModelKind::Whisper => AUDIO_CLIPS,
    }
}

/// Deterministic inference unit that sleeps instead of computing
#[derive(Debug, Clone)]
pub struct SimulatedUnit {
    spec: UnitSpec,
    service_time: Duration,
    model_loaded: bool,
    inputs: Vec<String>,
    cursor: usize,
}

impl SimulatedUnit {
    pub fn new(spec: UnitSpec) -> Self {
        let per_item = nominal_service_time(spec.kind).as_secs_f64();
        let extra_items = f64::from(spec.batch_size.saturating_sub(1));
        let service_time =
            Duration::from_secs_f64(per_item * (1.0 + BATCH_EFFICIENCY * extra_items));

        Self {
            spec,
            service_time,
            model_loaded: false,
            inputs: Vec::new(),
            cursor: 0,
        }
    }

    /// Override the per-call service time
    pub fn with_service_time(mut self, service_time: Duration) -> Self {
        self.service_time = service_time;
        self
    }

    pub fn service_time(&self) -> Duration {
        self.service_time
    }

    pub fn spec(&self) -> &UnitSpec {
        &self.spec
    }
}

impl InferenceUnit for SimulatedUnit {
    fn id(&self) -> String {
        self.spec.unit_id()
    }

    fn load_model(&mut self) -> Result<()> {
        if self.spec.batch_size == 0 {
            return Err(Error::model_load("batch size must be positive"));
        }

        debug!(
            model = %self.spec.kind,
            device_id = self.spec.device_id,
            "Loaded simulated model"
        );
        self.model_loaded = true;
        Ok(())
    }

    fn load_data(&mut self) -> Result<()> {
        if !self.model_loaded {
            return Err(Error::data_load("model must be loaded before its data"));
        }

        self.inputs = inputs_for(self.spec.kind)
            .iter()
            .map(|input| input.to_string())
            .collect();
        Ok(())
    }

    fn infer(&mut self) -> Result<u64> {
        if self.inputs.is_empty() {
            return Err(Error::inference(format!(
                "{} called before its data was loaded",
                self.id()
            )));
        }

        // Cycle through the prepared inputs like a real data loader would
        let _input = &self.inputs[self.cursor % self.inputs.len()];
        self.cursor = self.cursor.wrapping_add(1);

        std::thread::sleep(self.service_time);
        Ok(u64::from(self.spec.batch_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_time_scales_with_batch() {
        let single = SimulatedUnit::new(UnitSpec::new(ModelKind::Gpt, 0, 1));
        let batched = SimulatedUnit::new(UnitSpec::new(ModelKind::Gpt, 0, 4));

        assert_eq!(single.service_time(), Duration::from_millis(20));
        assert!(batched.service_time() > single.service_time());
        assert!(batched.service_time() < single.service_time() * 4);
    }

    #[test]
    fn test_lifecycle() {
        let mut unit = SimulatedUnit::new(UnitSpec::new(ModelKind::Bert, 0, 3))
            .with_service_time(Duration::ZERO);
        assert_eq!(unit.id(), "bert-3");
        assert!(unit.infer().is_err());

        unit.load_model().unwrap();
        unit.load_data().unwrap();
        for _ in 0..5 {
            assert_eq!(unit.infer().unwrap(), 3);
        }
    }

    #[test]
    fn test_data_before_model_fails() {
        let mut unit = SimulatedUnit::new(UnitSpec::new(ModelKind::Whisper, 0, 1));
        let err = unit.load_data().unwrap_err();
        assert!(err.is_setup_failure());
    }

    #[test]
    fn test_zero_batch_fails_to_load() {
        let mut unit = SimulatedUnit::new(UnitSpec::new(ModelKind::Diffusion, 0, 0));
        assert!(unit.load_model().unwrap_err().is_setup_failure());
    }
}
