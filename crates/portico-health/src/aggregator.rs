//! Concurrent probe execution.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{HealthError, HealthResult};
use crate::probe::ProbeOutcome;
use crate::registration::ProbeRegistration;
use crate::report::{HealthEntry, HealthReport};
use crate::status::HealthStatus;

/// Overall budget applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Collects probe registrations during startup.
#[derive(Debug)]
pub struct HealthAggregatorBuilder {
    probes: Vec<ProbeRegistration>,
    names: HashSet<String>,
    timeout: Duration,
}

impl Default for HealthAggregatorBuilder {
    fn default() -> Self {
        Self {
            probes: Vec::new(),
            names: HashSet::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HealthAggregatorBuilder {
    /// Sets the overall timeout budget shared by all probes of a run.
    pub fn timeout(&mut self, timeout: Duration) -> HealthResult<&mut Self> {
        if timeout.is_zero() {
            return Err(HealthError::InvalidTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Registers a probe. Names must be unique.
    pub fn register(&mut self, registration: ProbeRegistration) -> HealthResult<&mut Self> {
        if registration.name().trim().is_empty() {
            return Err(HealthError::InvalidProbeName);
        }
        if !self.names.insert(registration.name().to_string()) {
            return Err(HealthError::DuplicateProbe {
                name: registration.name().to_string(),
            });
        }

        info!(
            probe = registration.name(),
            target = registration.target().unwrap_or("-"),
            failure_status = %registration.failure_status(),
            tags = ?registration.tags(),
            "registered health probe"
        );
        self.probes.push(registration);
        Ok(self)
    }

    /// Freezes the probe set.
    #[must_use]
    pub fn build(self) -> HealthAggregator {
        HealthAggregator {
            probes: self.probes.into(),
            timeout: self.timeout,
        }
    }
}

/// Immutable set of probes.
///
/// Each run spawns one task per probe, fences them all with a single
/// deadline and joins them before composing the report. A probe that faults,
/// panics or misses the deadline is recorded with its failure status; its
/// siblings are unaffected.
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    probes: Arc<[ProbeRegistration]>,
    timeout: Duration,
}

impl Default for HealthAggregator {
    fn default() -> Self {
        HealthAggregatorBuilder::default().build()
    }
}

impl HealthAggregator {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> HealthAggregatorBuilder {
        HealthAggregatorBuilder::default()
    }

    /// Overall timeout budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Registered probes in registration order.
    #[must_use]
    pub fn probes(&self) -> &[ProbeRegistration] {
        &self.probes
    }

    /// Runs every probe.
    pub async fn run(&self) -> HealthReport {
        self.run_where(|_| true).await
    }

    /// Runs only probes tagged with `tag`.
    pub async fn run_tagged(&self, tag: &str) -> HealthReport {
        self.run_where(|registration| registration.has_tag(tag)).await
    }

    async fn run_where<P>(&self, predicate: P) -> HealthReport
    where
        P: Fn(&ProbeRegistration) -> bool,
    {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;

        let checks = self
            .probes
            .iter()
            .filter(|registration| predicate(registration))
            .map(|registration| self.run_probe(registration, deadline));
        let entries = join_all(checks).await;

        let report = HealthReport::from_entries(entries, started.elapsed());
        debug!(
            status = %report.status,
            probes = report.entries.len(),
            duration_ms = report.total_duration_ms,
            "health run complete"
        );
        report
    }

    async fn run_probe(
        &self,
        registration: &ProbeRegistration,
        deadline: tokio::time::Instant,
    ) -> HealthEntry {
        let probe = registration.probe();
        let started = Instant::now();
        let mut handle = tokio::spawn(async move { probe.check().await });

        let result: Result<ProbeOutcome, String> =
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(Ok(outcome))) => Ok(outcome),
                Ok(Ok(Err(err))) => Err(err.to_string()),
                Ok(Err(join_err)) if join_err.is_panic() => Err("probe panicked".to_string()),
                Ok(Err(join_err)) => Err(format!("probe task failed: {join_err}")),
                Err(_) => {
                    handle.abort();
                    Err(format!(
                        "probe timed out after {}ms",
                        self.timeout.as_millis()
                    ))
                }
            };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, error, description) = match result {
            Ok(ProbeOutcome {
                status: HealthStatus::Unhealthy,
                description,
            }) => {
                let error = description
                    .clone()
                    .unwrap_or_else(|| "probe reported unhealthy".to_string());
                (registration.failure_status(), Some(error), description)
            }
            Ok(outcome) => (outcome.status, None, outcome.description),
            Err(error) => (registration.failure_status(), Some(error), None),
        };

        match &error {
            Some(error) => warn!(
                probe = registration.name(),
                target = registration.target().unwrap_or("-"),
                status = %status,
                duration_ms,
                error = %error,
                "health probe failed"
            ),
            None => debug!(
                probe = registration.name(),
                status = %status,
                duration_ms,
                "health probe completed"
            ),
        }

        HealthEntry {
            name: registration.name().to_string(),
            status,
            duration_ms,
            error,
            description,
            tags: registration.tags().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FnProbe, ProbeError};

    fn explode() -> Result<ProbeOutcome, ProbeError> {
        panic!("probe blew up")
    }

    fn healthy(name: &str) -> ProbeRegistration {
        ProbeRegistration::new(name, FnProbe::new(|| async { Ok(ProbeOutcome::healthy()) }))
    }

    #[test]
    fn test_duplicate_probe_rejected() {
        let mut builder = HealthAggregator::builder();
        builder.register(healthy("db")).unwrap();
        let err = builder.register(healthy("db")).unwrap_err();
        assert_eq!(err, HealthError::DuplicateProbe { name: "db".into() });
        assert_eq!(builder.build().probes().len(), 1);
    }

    #[test]
    fn test_invalid_registration() {
        let mut builder = HealthAggregator::builder();
        assert_eq!(
            builder.register(healthy("")).unwrap_err(),
            HealthError::InvalidProbeName
        );
        assert_eq!(
            builder.timeout(Duration::ZERO).unwrap_err(),
            HealthError::InvalidTimeout
        );
    }

    #[tokio::test]
    async fn test_empty_aggregator_is_healthy() {
        let report = HealthAggregator::default().run().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.entries.is_empty());
    }

    #[tokio::test]
    async fn test_fault_is_isolated() {
        let mut builder = HealthAggregator::builder();
        builder
            .register(healthy("identity-store"))
            .unwrap()
            .register(ProbeRegistration::new(
                "cache",
                FnProbe::new(|| async { Err(ProbeError::failed("connection refused")) }),
            ))
            .unwrap();
        let report = builder.build().run().await;

        assert_eq!(report.status, HealthStatus::Unhealthy);
        let cache = report.entry("cache").unwrap();
        assert_eq!(cache.status, HealthStatus::Unhealthy);
        assert_eq!(cache.error.as_deref(), Some("connection refused"));

        let store = report.entry("identity-store").unwrap();
        assert_eq!(store.status, HealthStatus::Healthy);
        assert!(store.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_status_override() {
        let mut builder = HealthAggregator::builder();
        builder
            .register(
                ProbeRegistration::new(
                    "search",
                    FnProbe::new(|| async { Err(ProbeError::failed("index offline")) }),
                )
                .with_failure_status(HealthStatus::Degraded),
            )
            .unwrap();
        let report = builder.build().run().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.http_status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reported_unhealthy_uses_failure_status_and_sets_error() {
        let mut builder = HealthAggregator::builder();
        builder
            .register(ProbeRegistration::new(
                "queue",
                FnProbe::new(|| async { Ok(ProbeOutcome::unhealthy("backlog too deep")) }),
            ))
            .unwrap();
        let report = builder.build().run().await;

        let entry = report.entry("queue").unwrap();
        assert_eq!(entry.status, HealthStatus::Unhealthy);
        assert_eq!(entry.error.as_deref(), Some("backlog too deep"));
    }

    #[tokio::test]
    async fn test_degraded_outcome_has_no_error() {
        let mut builder = HealthAggregator::builder();
        builder
            .register(ProbeRegistration::new(
                "replica",
                FnProbe::new(|| async { Ok(ProbeOutcome::degraded("lagging")) }),
            ))
            .unwrap();
        let report = builder.build().run().await;

        let entry = report.entry("replica").unwrap();
        assert_eq!(entry.status, HealthStatus::Degraded);
        assert!(entry.error.is_none());
        assert_eq!(entry.description.as_deref(), Some("lagging"));
    }

    #[tokio::test]
    async fn test_panicking_probe_is_recorded() {
        let mut builder = HealthAggregator::builder();
        builder
            .register(ProbeRegistration::new(
                "flaky",
                FnProbe::new(|| async { explode() }),
            ))
            .unwrap()
            .register(healthy("db"))
            .unwrap();
        let report = builder.build().run().await;

        assert_eq!(report.entry("flaky").unwrap().error.as_deref(), Some("probe panicked"));
        assert_eq!(report.entry("db").unwrap().status, HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_marks_only_slow_probe() {
        let mut builder = HealthAggregator::builder();
        builder
            .timeout(Duration::from_millis(100))
            .unwrap()
            .register(ProbeRegistration::new(
                "slow",
                FnProbe::new(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(ProbeOutcome::healthy())
                }),
            ))
            .unwrap()
            .register(healthy("fast"))
            .unwrap();
        let report = builder.build().run().await;

        let slow = report.entry("slow").unwrap();
        assert_eq!(slow.status, HealthStatus::Unhealthy);
        assert!(slow.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(report.entry("fast").unwrap().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_entries_keep_registration_order() {
        let mut builder = HealthAggregator::builder();
        for name in ["c", "a", "b"] {
            builder.register(healthy(name)).unwrap();
        }
        let report = builder.build().run().await;
        let names: Vec<_> = report.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_run_tagged_filters_probes() {
        let mut builder = HealthAggregator::builder();
        builder
            .register(healthy("cache").with_tags(["api", "Redis"]))
            .unwrap()
            .register(healthy("app-store").with_tags(["api", "SqlDb"]))
            .unwrap()
            .register(
                ProbeRegistration::new(
                    "batch",
                    FnProbe::new(|| async { Err(ProbeError::failed("down")) }),
                )
                .with_tags(["jobs"]),
            )
            .unwrap();
        let aggregator = builder.build();

        let report = aggregator.run_tagged("api").await;
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.status, HealthStatus::Healthy);

        let report = aggregator.run_tagged("Redis").await;
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].name, "cache");

        assert!(aggregator.run_tagged("missing").await.entries.is_empty());
        assert_eq!(aggregator.run().await.status, HealthStatus::Unhealthy);
    }
}
