//! Core data types shared between workers, the synchronizer and the aggregator

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Logical slot of a worker within a mix (the `tid` launch parameter).
pub type WorkerId = u32;

/// Model families the harness knows how to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Text-to-image diffusion pipeline
    Diffusion,
    /// Masked language model
    Bert,
    /// Causal language model
    Gpt,
    /// Speech-to-text
    Whisper,
}

impl ModelKind {
    /// All known model kinds
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Diffusion,
        ModelKind::Bert,
        ModelKind::Gpt,
        ModelKind::Whisper,
    ];

    /// Lower-case name used on the command line and in unit ids
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Diffusion => "diffusion",
            ModelKind::Bert => "bert",
            ModelKind::Gpt => "gpt",
            ModelKind::Whisper => "whisper",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| Error::UnknownModel(s.to_string()))
    }
}

/// Everything needed to construct one inference unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Model family
    pub kind: ModelKind,

    /// GPU index the unit should bind to
    pub device_id: u32,

    /// Items per inference call
    pub batch_size: u32,
}

impl UnitSpec {
    pub fn new(kind: ModelKind, device_id: u32, batch_size: u32) -> Self {
        Self {
            kind,
            device_id,
            batch_size,
        }
    }

    /// Stable unit id, `{model}-{batch}`
    pub fn unit_id(&self) -> String {
        format!("{}-{}", self.kind, self.batch_size)
    }
}

/// Statistics of one worker's measurement phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Id of the inference unit that produced these numbers
    pub model_id: String,

    /// Completed items per second of wall-clock measurement time
    pub throughput: f64,

    /// Per-request latencies in seconds, in request order
    pub latencies_s: Vec<f64>,
}

/// The record a worker persists when it finishes: `(tid, stats)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub tid: WorkerId,
    pub stats: RunStats,
}

impl RunRecord {
    pub fn new(tid: WorkerId, stats: RunStats) -> Self {
        Self { tid, stats }
    }

    /// Encode the record as a binary blob
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a record from a binary blob
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Persist the record at `path`.
    ///
    /// The blob is written next to the destination and renamed into place, so
    /// a reader that sees the path always sees a complete record.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut staging = path.as_os_str().to_owned();
        staging.push(".partial");
        std::fs::write(&staging, bytes)
            .with_context_fn(|| format!("writing {}", Path::new(&staging).display()))?;
        std::fs::rename(&staging, path)
            .with_context_fn(|| format!("publishing record {}", path.display()))?;
        Ok(())
    }

    /// Load a record previously written with [`RunRecord::write_to`]
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(format!("reading record {}", path.display()))?;
        Self::from_bytes(&bytes).map_err(|e| {
            Error::serialization(format!("{}: {}", path.display(), e))
        })
    }
}
