//! The capability contract implemented by inference backends
//!
//! The harness never looks inside a model. It only needs to load it, prepare
//! inputs once, run one inference call at a time, and know the unit's id.

use crate::Result;

/// A pluggable inference workload driven by a worker process.
///
/// `load_model` and `load_data` are called exactly once, in that order,
/// before the first `infer`. `infer` is then called repeatedly and returns the
/// number of items the call completed (usually the batch size).
pub trait InferenceUnit {
    /// Stable id of this unit, recorded with every run (e.g. `bert-1`)
    fn id(&self) -> String;

    /// Load model weights onto the device
    fn load_model(&mut self) -> Result<()>;

    /// Prepare input data for repeated inference
    fn load_data(&mut self) -> Result<()>;

    /// Run one inference call, returning the number of completed items
    fn infer(&mut self) -> Result<u64>;
}

impl<U: InferenceUnit + ?Sized> InferenceUnit for Box<U> {
    fn id(&self) -> String {
        (**self).id()
    }

    fn load_model(&mut self) -> Result<()> {
        (**self).load_model()
    }

    fn load_data(&mut self) -> Result<()> {
        (**self).load_data()
    }

    fn infer(&mut self) -> Result<u64> {
        (**self).infer()
    }
}
