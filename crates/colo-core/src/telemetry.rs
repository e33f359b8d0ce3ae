//! Tracing initialization shared by the harness binaries

use crate::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse a log level name, falling back to `INFO`
pub fn parse_level(log_level: &str, verbose: bool) -> tracing::Level {
    if verbose {
        return tracing::Level::DEBUG;
    }

    match log_level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `targets` (e.g. `["colo_worker",
/// "colo_core"]`) are enabled at the requested level. Stdout stays free for
/// command output.
pub fn init_tracing(targets: &[&str], log_level: &str, verbose: bool) -> Result<()> {
    let level = parse_level(log_level, verbose);
    let default_filter = targets
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Other(anyhow::anyhow!("failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn", false), tracing::Level::WARN);
        assert_eq!(parse_level("TRACE", false), tracing::Level::TRACE);
        assert_eq!(parse_level("bogus", false), tracing::Level::INFO);
        assert_eq!(parse_level("error", true), tracing::Level::DEBUG);
    }
}
