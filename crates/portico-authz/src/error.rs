//! Error types for the authorization crate.

use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors raised while registering or evaluating policies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// A policy with this name is already registered.
    #[error("policy '{name}' is already registered")]
    DuplicatePolicy {
        /// The duplicated name.
        name: String,
    },

    /// A policy was registered without any required roles.
    #[error("policy '{name}' requires at least one role")]
    EmptyPolicy {
        /// The offending policy name.
        name: String,
    },

    /// A policy name was empty or whitespace.
    #[error("policy name must not be empty")]
    InvalidPolicyName,

    /// Evaluation referenced a policy that was never registered.
    #[error("unknown policy '{name}'")]
    UnknownPolicy {
        /// The unregistered name.
        name: String,
    },
}

impl AuthzError {
    /// Returns `true` for errors that can only occur during startup.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        !matches!(self, Self::UnknownPolicy { .. })
    }
}
