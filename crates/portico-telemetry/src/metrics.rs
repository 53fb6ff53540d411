//! Prometheus metrics.
//!
//! [`init_metrics`] installs a global Prometheus recorder; the gateway
//! serves [`render_metrics`] on its metrics route.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Histogram buckets (seconds) for request and probe durations.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// Calling this more than once keeps the first recorder and returns an
/// error for the later calls.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    if METRICS_HANDLE.set(handle).is_err() {
        return Err(TelemetryError::MetricsInit(
            "metrics recorder already initialized".to_string(),
        ));
    }

    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus text format, `None` if not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "portico_requests_total",
        "Total number of HTTP requests processed"
    );
    describe_histogram!(
        "portico_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "portico_in_flight_requests",
        "Number of HTTP requests currently being processed"
    );
    describe_counter!(
        "portico_authz_decisions_total",
        "Authorization decisions by policy and result"
    );
    describe_histogram!(
        "portico_probe_duration_seconds",
        "Health probe duration in seconds"
    );
    describe_counter!(
        "portico_probe_status_total",
        "Health probe results by status"
    );
}

/// Records a completed request.
pub fn record_request(route_group: &str, status_code: u16, duration: Duration) {
    counter!(
        "portico_requests_total",
        "route_group" => route_group.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "portico_request_duration_seconds",
        "route_group" => route_group.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records an authorization decision.
pub fn record_authz_decision(policy: &str, allowed: bool) {
    counter!(
        "portico_authz_decisions_total",
        "policy" => policy.to_string(),
        "allowed" => allowed.to_string()
    )
    .increment(1);
}

/// Records one probe result.
pub fn record_probe(probe: &str, status: &str, duration: Duration) {
    counter!(
        "portico_probe_status_total",
        "probe" => probe.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "portico_probe_duration_seconds",
        "probe" => probe.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Keeps `portico_in_flight_requests` raised while alive.
///
/// Dropping the guard (including when a request future is cancelled)
/// lowers the gauge again.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Raises the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("portico_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("portico_in_flight_requests").decrement(1.0);
    }
}
