//! Configuration management for the benchmark harness
//!
//! Settings are layered from built-in defaults, an optional YAML file and
//! `COLO_*` environment variables. Command-line flags are applied on top by
//! the binaries.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default number of discarded warmup requests
pub const DEFAULT_WARMUP_REQUESTS: u32 = 5;

/// Default lock file created inside an aggregator result directory
pub const DEFAULT_LOCK_FILE_NAME: &str = ".colo-stats.lock";

/// How a ready worker waits for the start signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseMode {
    /// Spin on the start latch; lowest release jitter
    Spin,
    /// Sleep between polls of the start latch; no CPU burn
    Block,
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseMode::Spin => f.write_str("spin"),
            ReleaseMode::Block => f.write_str("block"),
        }
    }
}

impl FromStr for ReleaseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" => Ok(ReleaseMode::Spin),
            "block" => Ok(ReleaseMode::Block),
            other => Err(Error::config(format!(
                "unknown release mode '{}', expected 'spin' or 'block'",
                other
            ))),
        }
    }
}

/// Harness settings shared by the worker and aggregator binaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory holding readiness markers and run records
    pub scratch_dir: PathBuf,

    /// Requests run and discarded before a worker reports ready
    pub warmup_requests: u32,

    /// How a ready worker waits for release
    pub release: ReleaseMode,

    /// Poll interval for [`ReleaseMode::Block`], in milliseconds
    pub block_poll_ms: u64,

    /// Name of the lock file inside an aggregator result directory
    pub lock_file_name: String,
}

impl HarnessConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (`COLO_WARMUP_REQUESTS`, ...)
    /// 2. Configuration file (`COLO_CONFIG`, else `./colo.yaml` if present)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Ok(config_path) = std::env::var("COLO_CONFIG") {
            builder = builder.add_source(config::File::with_name(&config_path).required(true));
        } else {
            builder = builder.add_source(config::File::with_name("colo").required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("COLO")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    /// Load configuration from a specific file on top of the defaults
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path));

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.scratch_dir.as_os_str().is_empty() {
            return Err(Error::config("scratch_dir must not be empty"));
        }

        if self.release == ReleaseMode::Block && self.block_poll_ms == 0 {
            return Err(Error::config("block_poll_ms must be positive in block release mode"));
        }

        if self.lock_file_name.is_empty() || self.lock_file_name.contains('/') {
            return Err(Error::config(format!(
                "lock_file_name must be a plain file name, got '{}'",
                self.lock_file_name
            )));
        }

        Ok(())
    }

    /// Poll interval used by [`ReleaseMode::Block`]
    pub fn block_poll(&self) -> Duration {
        Duration::from_millis(self.block_poll_ms)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            warmup_requests: DEFAULT_WARMUP_REQUESTS,
            release: ReleaseMode::Spin,
            block_poll_ms: 1,
            lock_file_name: DEFAULT_LOCK_FILE_NAME.to_string(),
        }
    }
}
