//! Model kind to inference unit constructors

use crate::simulated::SimulatedUnit;
use crate::{Result, WorkerError};
use colo_core::{InferenceUnit, ModelKind, UnitSpec};
use std::collections::HashMap;
use tracing::debug;

/// Builds an inference unit from its launch parameters
pub type UnitFactory =
    Box<dyn Fn(&UnitSpec) -> colo_core::Result<Box<dyn InferenceUnit>> + Send + Sync>;

/// Lookup table of unit constructors.
///
/// The default registry maps every [`ModelKind`] to a [`SimulatedUnit`]; real
/// backends replace those entries with [`UnitRegistry::register`].
pub struct UnitRegistry {
    factories: HashMap<ModelKind, UnitFactory>,
}

impl UnitRegistry {
    /// A registry with no constructors
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `kind`
    pub fn register<F>(&mut self, kind: ModelKind, factory: F)
    where
        F: Fn(&UnitSpec) -> colo_core::Result<Box<dyn InferenceUnit>> + Send + Sync + 'static,
    {
        if self.factories.insert(kind, Box::new(factory)).is_some() {
            debug!("Replaced unit constructor for {}", kind);
        }
    }

    pub fn contains(&self, kind: ModelKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Registered kinds in declaration order
    pub fn kinds(&self) -> Vec<ModelKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Construct the unit described by `spec`
    pub fn create(&self, spec: &UnitSpec) -> Result<Box<dyn InferenceUnit>> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or(WorkerError::UnsupportedModel(spec.kind))?;

        factory(spec).map_err(|source| WorkerError::Setup {
            stage: "construct",
            source,
        })
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for kind in ModelKind::ALL {
            registry.register(kind, |spec: &UnitSpec| {
                Ok(Box::new(SimulatedUnit::new(spec.clone())) as Box<dyn InferenceUnit>)
            });
        }
        registry
    }
}
