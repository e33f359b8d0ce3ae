//! # colo-core
//!
//! Core types, traits, and utilities for the co-location benchmark harness.
//!
//! This crate provides the pieces shared by every other component:
//!
//! - The [`InferenceUnit`] capability contract implemented by model backends
//! - Run statistics records and their on-disk codec
//! - The filesystem and signal protocol between workers and the synchronizer
//! - Harness configuration loading and validation
//! - Error handling types and tracing initialization

pub mod config;
pub mod error;
pub mod protocol;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{HarnessConfig, ReleaseMode};
pub use error::{Error, ErrorContext, Result};
pub use protocol::{ScratchPaths, START_SIGNAL, STOP_SIGNAL};
pub use traits::InferenceUnit;
pub use types::{ModelKind, RunRecord, RunStats, UnitSpec, WorkerId};
