//! Error handling for the benchmark harness
//!
//! Provides the shared error type and result alias used by every colo crate.

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the benchmark harness
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Model could not be loaded by an inference unit
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Input data could not be prepared by an inference unit
    #[error("Data load error: {0}")]
    DataLoad(String),

    /// A single inference call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model kind string did not name a known kind
    #[error("Unknown model kind: {0}")]
    UnknownModel(String),

    /// Record encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Layered configuration errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a data load error
    pub fn data_load(msg: impl Into<String>) -> Self {
        Self::DataLoad(msg.into())
    }

    /// Create an inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Whether this error happened while a unit was being set up.
    ///
    /// Setup failures are fatal for a worker and must never produce a record.
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, Error::ModelLoad(_) | Error::DataLoad(_))
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::ModelLoad(_) => "model_load",
            Error::DataLoad(_) => "data_load",
            Error::Inference(_) => "inference",
            Error::UnknownModel(_) => "unknown_model",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to Results
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context(self, context: impl Into<String>) -> Result<T>;

    /// Add context to an error using a closure
    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", context.into(), original_error))
        })
    }

    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", f(), original_error))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("warmup must be set");
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(err.to_string(), "Configuration error: warmup must be set");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::config("test").category(), "configuration");
        assert_eq!(Error::model_load("test").category(), "model_load");
        assert_eq!(Error::inference("test").category(), "inference");
    }

    #[test]
    fn test_setup_failure_classification() {
        assert!(Error::model_load("no weights").is_setup_failure());
        assert!(Error::data_load("no prompts").is_setup_failure());
        assert!(!Error::inference("oom").is_setup_failure());
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));

        let err = result.with_context("failed to read record").unwrap_err();

        assert!(matches!(err, Error::Other(_)));
        assert!(err.to_string().contains("failed to read record"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_context_fn() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "original error"));

        let err = result
            .with_context_fn(|| format!("writing marker for pid {}", 42))
            .unwrap_err();

        assert!(err.to_string().contains("writing marker for pid 42"));
        assert!(err.to_string().contains("original error"));
    }
}
