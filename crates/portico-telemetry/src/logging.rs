//! Structured logging.
//!
//! ```rust,ignore
//! use portico_telemetry::logging::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::production())?;
//! tracing::info!(route_group = "users", "gateway ready");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g. `info`, `portico_middleware=debug,info`).
    pub level: String,

    /// JSON output when `true`, pretty output otherwise.
    pub json_format: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to colorize pretty output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable debug output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            file_line_info: true,
            ansi: true,
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            file_line_info: false,
            ansi: false,
        }
    }
}

/// Validates a filter directive without installing anything.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level '{filter}': {e}")))
}

/// Installs the global subscriber.
///
/// Fails if the level is not a valid filter or a global subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(true)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(config.ansi)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(true)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let dev = LogConfig::development();
        assert!(!dev.json_format);
        assert_eq!(dev.level, "debug");

        let prod = LogConfig::production();
        assert!(prod.json_format);
        assert_eq!(prod.level, "info");
        assert_eq!(LogConfig::default(), prod);
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("portico_middleware=debug,warn").is_ok());
    }

    #[test]
    fn test_env_filter_rejects_garbage() {
        let err = create_env_filter("portico=verbose").unwrap_err();
        assert!(matches!(err, TelemetryError::LoggingInit(_)));
    }

    #[test]
    fn test_disabled_logging_is_noop() {
        let config = LogConfig {
            enabled: false,
            level: "not a level ][".to_string(),
            ..LogConfig::production()
        };
        assert!(init_logging(&config).is_ok());
    }
}
