//! Observability for Portico.
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, JSON output in
//!   production and pretty output in development
//! - **Metrics**: Prometheus text exposition via the `metrics` facade
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `portico_requests_total` | Counter | `route_group`, `status` | Completed requests |
//! | `portico_request_duration_seconds` | Histogram | `route_group` | Request latency |
//! | `portico_in_flight_requests` | Gauge | - | Requests being processed |
//! | `portico_authz_decisions_total` | Counter | `policy`, `allowed` | Policy decisions |
//! | `portico_probe_duration_seconds` | Histogram | `probe` | Probe latency |
//! | `portico_probe_status_total` | Counter | `probe`, `status` | Probe results |
//!
//! Recording functions are safe to call before (or without) installing the
//! recorder; the `metrics` facade drops the samples.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Combined logging and metrics settings.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging settings.
    pub logging: LogConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// Call once at startup, before the gateway is built, so registration logs
/// are captured.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
