//! Structured Logging
//!
//! Logging for design runs via the `tracing` ecosystem: level filtering,
//! JSON/pretty/compact output, and `RUST_LOG` override support. The
//! optimizer itself only emits events (`debug!` per iteration, `info!` on
//! terminal outcomes, `warn!` on ignored sink failures); installing a
//! subscriber is the application's choice.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pcfm_core::observe::{init_logging, LogConfig, LogLevel};
//!
//! let config = LogConfig {
//!     level: LogLevel::Debug,
//!     ..Default::default()
//! };
//! init_logging(&config);
//!
//! tracing::info!(iterations = 120, "run finished");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable)
    Json,
    /// Pretty format (human-readable)
    Pretty,
    /// Compact format (one line per event)
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Compact
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level
    pub level: LogLevel,
    /// Output format
    pub format: LogFormat,
    /// Custom filter directive (e.g. "pcfm_core=debug"); overrides `level`
    pub filter: Option<String>,
}

/// Initialize the global logging subscriber.
///
/// Call once at application startup. A subsequent call (or a subscriber
/// installed elsewhere) is silently ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = if let Some(ref custom) = config.filter {
        EnvFilter::try_new(custom).unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
    };

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init(),
    };
    // Another subscriber being installed first is fine.
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = LogConfig {
            level: LogLevel::Warn,
            format: LogFormat::Json,
            filter: Some("pcfm_core=trace".to_string()),
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: LogConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.level, LogLevel::Warn);
        assert_eq!(parsed.format, LogFormat::Json);
    }

    #[test]
    fn test_init_logging_idempotent() {
        let config = LogConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
