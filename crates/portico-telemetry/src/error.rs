//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::MetricsInit("recorder already set".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to initialize metrics: recorder already set"
        );
        let err = TelemetryError::LoggingInit("bad level".to_string());
        assert_eq!(err.to_string(), "Failed to initialize logging: bad level");
    }
}
