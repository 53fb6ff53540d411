//! Error types for health aggregation setup.

use thiserror::Error;

/// Result type for health registration.
pub type HealthResult<T> = Result<T, HealthError>;

/// Errors raised while assembling the probe set.
///
/// Running probes never fails; these only occur at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    /// Two probes share a name.
    #[error("health probe '{name}' is already registered")]
    DuplicateProbe {
        /// The duplicated name.
        name: String,
    },

    /// A probe was registered with an empty name.
    #[error("health probe name must not be empty")]
    InvalidProbeName,

    /// The overall timeout budget was zero.
    #[error("health check timeout must be greater than zero")]
    InvalidTimeout,
}
