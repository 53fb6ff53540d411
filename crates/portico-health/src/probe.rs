//! The probe abstraction and built-in probes.

use std::future::Future;
use std::time::Duration;

use portico_core::BoxFuture;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::status::HealthStatus;

/// What a probe observed about its dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Observed status. `Unhealthy` is reported with the registration's
    /// failure status.
    pub status: HealthStatus,
    /// Optional human-readable diagnostic.
    pub description: Option<String>,
}

impl ProbeOutcome {
    /// A healthy outcome with no description.
    #[must_use]
    pub const fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            description: None,
        }
    }

    /// A degraded outcome.
    #[must_use]
    pub fn degraded(description: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            description: Some(description.into()),
        }
    }

    /// An unhealthy outcome.
    #[must_use]
    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            description: Some(description.into()),
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A fault raised while probing.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The dependency could not be reached.
    #[error("{target} unreachable: {source}")]
    Unreachable {
        /// Probe target.
        target: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The probe ran but the check itself failed.
    #[error("{0}")]
    Failed(String),
}

impl ProbeError {
    /// Creates a generic probe failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A health check against one dependency.
///
/// Probes must not mutate the dependency they observe. A probe may be
/// cancelled at any await point when the aggregator's budget runs out.
pub trait Probe: Send + Sync + 'static {
    /// Runs the check once.
    fn check(&self) -> BoxFuture<'_, Result<ProbeOutcome, ProbeError>>;
}

/// A probe backed by an async closure.
///
/// ```
/// use portico_health::{FnProbe, ProbeOutcome};
///
/// let probe = FnProbe::new(|| async { Ok(ProbeOutcome::healthy()) });
/// # let _ = probe;
/// ```
pub struct FnProbe<F> {
    func: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeOutcome, ProbeError>> + Send + 'static,
{
    /// Wraps `func`.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeOutcome, ProbeError>> + Send + 'static,
{
    fn check(&self) -> BoxFuture<'_, Result<ProbeOutcome, ProbeError>> {
        Box::pin((self.func)())
    }
}

impl<F> std::fmt::Debug for FnProbe<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProbe").finish_non_exhaustive()
    }
}

/// Reachability probe: opens and immediately drops a TCP connection to a
/// `host:port` target.
///
/// Connecting is the only side effect, so it is safe against caches and
/// databases alike. Connections slower than `slow_threshold` report
/// `Degraded`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: String,
    slow_threshold: Option<Duration>,
}

impl TcpProbe {
    /// Creates a probe for `target` (`host:port`).
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            slow_threshold: None,
        }
    }

    /// Reports `Degraded` when connecting takes longer than `threshold`.
    #[must_use]
    pub const fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// Returns the probe target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Probe for TcpProbe {
    fn check(&self) -> BoxFuture<'_, Result<ProbeOutcome, ProbeError>> {
        Box::pin(async move {
            let started = std::time::Instant::now();
            let stream = TcpStream::connect(self.target.as_str())
                .await
                .map_err(|source| ProbeError::Unreachable {
                    target: self.target.clone(),
                    source,
                })?;
            drop(stream);

            let elapsed = started.elapsed();
            match self.slow_threshold {
                Some(threshold) if elapsed > threshold => Ok(ProbeOutcome::degraded(format!(
                    "connected to {} in {}ms",
                    self.target,
                    elapsed.as_millis()
                ))),
                _ => Ok(ProbeOutcome::healthy()
                    .with_description(format!("connected to {}", self.target))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_fn_probe() {
        let probe = FnProbe::new(|| async { Ok(ProbeOutcome::degraded("slow replica")) });
        let outcome = probe.check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Degraded);
        assert_eq!(outcome.description.as_deref(), Some("slow replica"));
    }

    #[tokio::test]
    async fn test_tcp_probe_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(addr.to_string());
        let outcome = probe.check().await.unwrap();
        assert_eq!(outcome.status, HealthStatus::Healthy);
        assert_eq!(
            outcome.description,
            Some(format!("connected to {addr}"))
        );
    }

    #[tokio::test]
    async fn test_tcp_probe_unreachable() {
        // Bind then drop to get a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = TcpProbe::new(addr.to_string());
        let err = probe.check().await.unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable { .. }));
        assert!(err.to_string().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_tcp_probe_rejects_bad_target() {
        let probe = TcpProbe::new("not a socket address");
        assert!(probe.check().await.is_err());
    }
}
