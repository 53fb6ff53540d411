//! Built-in operational endpoints.
//!
//! Both live in the anonymous [`OPERATIONS_GROUP`] route group:
//!
//! - `GET /health` runs the probes and returns the [`HealthReport`]
//!   (200 when Healthy or Degraded, 503 when Unhealthy); `?tag=<t>` limits
//!   the run to probes carrying tag `t`
//! - `GET /metrics` renders the Prometheus recorder

use std::time::Duration;

use http::StatusCode;
use portico_core::{BoxFuture, GatewayError};
use portico_health::{HealthAggregator, HealthReport};
use portico_middleware::routing::{Handler, HandlerRequest};
use portico_middleware::{Response, ResponseExt, StageResult};
use portico_telemetry::metrics::{record_probe, render_metrics};
use serde::Deserialize;
use tracing::{debug, warn};

/// Name of the built-in anonymous route group.
pub const OPERATIONS_GROUP: &str = "operations";

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Path of the metrics endpoint.
pub const METRICS_PATH: &str = "/metrics";

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Serves `GET /health`.
#[derive(Debug, Clone)]
pub struct HealthEndpoint {
    aggregator: HealthAggregator,
}

impl HealthEndpoint {
    /// Creates the endpoint over `aggregator`.
    #[must_use]
    pub fn new(aggregator: HealthAggregator) -> Self {
        Self { aggregator }
    }

    async fn report(&self, tag: Option<&str>) -> HealthReport {
        let report = match tag {
            Some(tag) => self.aggregator.run_tagged(tag).await,
            None => self.aggregator.run().await,
        };

        for entry in &report.entries {
            record_probe(
                &entry.name,
                entry.status.as_str(),
                Duration::from_millis(entry.duration_ms),
            );
        }
        if report.status.is_operational() {
            debug!(status = %report.status, probes = report.entries.len(), "health checked");
        } else {
            warn!(status = %report.status, probes = report.entries.len(), "gateway unhealthy");
        }
        report
    }
}

/// Query parameters accepted by `GET /health`.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
struct HealthQuery {
    tag: Option<String>,
}

impl HealthQuery {
    fn parse(query: Option<&str>) -> Result<Self, GatewayError> {
        let query: Self = serde_urlencoded::from_str(query.unwrap_or(""))
            .map_err(|e| GatewayError::bad_request(format!("invalid health query: {e}")))?;
        Ok(Self {
            tag: query.tag.filter(|tag| !tag.is_empty()),
        })
    }
}

impl Handler for HealthEndpoint {
    fn call(&self, input: HandlerRequest) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            let query = HealthQuery::parse(input.request.uri().query())?;
            let report = self.report(query.tag.as_deref()).await;
            Ok(Response::json(report.http_status(), &report))
        })
    }
}

/// Serves `GET /metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEndpoint;

impl Handler for MetricsEndpoint {
    fn call(&self, _input: HandlerRequest) -> BoxFuture<'_, StageResult> {
        Box::pin(async {
            let body = render_metrics()
                .ok_or_else(|| GatewayError::not_found("metrics recorder is not installed"))?;
            Ok(Response::with_body(StatusCode::OK, PROMETHEUS_CONTENT_TYPE, body))
        })
    }
}
