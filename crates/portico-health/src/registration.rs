//! Probe registrations.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::probe::Probe;
use crate::status::HealthStatus;

/// A probe together with the metadata the aggregator needs to run and
/// report it.
///
/// ```
/// use portico_health::{HealthStatus, ProbeRegistration, TcpProbe};
///
/// let registration = ProbeRegistration::new("cache", TcpProbe::new("localhost:6379"))
///     .with_target("localhost:6379")
///     .with_failure_status(HealthStatus::Degraded)
///     .with_tags(["api", "Redis"]);
/// assert!(registration.has_tag("Redis"));
/// ```
#[derive(Clone)]
pub struct ProbeRegistration {
    name: String,
    target: Option<String>,
    failure_status: HealthStatus,
    tags: BTreeSet<String>,
    probe: Arc<dyn Probe>,
}

impl ProbeRegistration {
    /// Registers `probe` under `name`. Failures report `Unhealthy` unless
    /// overridden.
    pub fn new(name: impl Into<String>, probe: impl Probe) -> Self {
        Self::from_arc(name, Arc::new(probe))
    }

    /// Like [`new`](Self::new) for an already shared probe.
    pub fn from_arc(name: impl Into<String>, probe: Arc<dyn Probe>) -> Self {
        Self {
            name: name.into(),
            target: None,
            failure_status: HealthStatus::Unhealthy,
            tags: BTreeSet::new(),
            probe,
        }
    }

    /// Sets the opaque target descriptor shown in logs.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the status recorded when the probe fails, faults or times out.
    #[must_use]
    pub const fn with_failure_status(mut self, status: HealthStatus) -> Self {
        self.failure_status = status;
        self
    }

    /// Adds filter tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Probe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target descriptor, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Failure status.
    #[must_use]
    pub const fn failure_status(&self) -> HealthStatus {
        self.failure_status
    }

    /// Filter tags.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns `true` if the registration carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub(crate) fn probe(&self) -> Arc<dyn Probe> {
        Arc::clone(&self.probe)
    }
}

impl std::fmt::Debug for ProbeRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistration")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("failure_status", &self.failure_status)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}
