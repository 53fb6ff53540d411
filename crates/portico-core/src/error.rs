//! Request-time error taxonomy and the uniform error envelope.
//!
//! Every failure that can end a request is a [`GatewayError`]. The error
//! interception stage renders it as an [`ErrorEnvelope`]:
//!
//! ```json
//! { "error": { "code": "AUTHENTICATION_REQUIRED", "message": "...", "detail": null } }
//! ```
//!
//! `detail` is only populated when the gateway runs with internal error
//! exposure enabled (development). Server-side faults additionally replace
//! their message with a generic one when exposure is off.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for request-time operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

const GENERIC_INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Broad classification of request-time failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or unacceptable request.
    BadRequest,
    /// Missing or invalid credentials.
    Authentication,
    /// Authenticated but not permitted.
    Authorization,
    /// No route matched the path.
    NotFound,
    /// A route matched the path but not the method.
    MethodNotAllowed,
    /// The request exceeded its time budget.
    Timeout,
    /// A fault inside the gateway or a handler.
    Internal,
}

impl ErrorCategory {
    /// Returns the HTTP status code for this category.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for failures attributed to the caller (4xx).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Timeout | Self::Internal)
    }
}

/// A failure that ends request processing.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request is malformed or unacceptable as sent.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Human-readable message.
        message: String,
    },

    /// A protected route was called without a credential.
    #[error("Authentication required: {message}")]
    AuthenticationRequired {
        /// Human-readable message.
        message: String,
    },

    /// A credential was presented but could not be validated.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials {
        /// Human-readable message.
        message: String,
    },

    /// The caller does not satisfy the policy bound to the route.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable message.
        message: String,
        /// Name of the policy that denied the request.
        policy: Option<String>,
    },

    /// A route referenced a policy that was never registered.
    #[error("Unknown policy '{policy}'")]
    UnknownPolicy {
        /// The unregistered policy name.
        policy: String,
    },

    /// No route matched.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// The path matched, the method did not.
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// The request exceeded its time budget.
    #[error("Timeout: {message}")]
    Timeout {
        /// Human-readable message.
        message: String,
    },

    /// An unhandled fault in a stage or handler.
    #[error("Unhandled fault: {message}")]
    Unhandled {
        /// Human-readable message.
        message: String,
        /// The underlying error (never exposed in production).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl GatewayError {
    /// Creates a bad-request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates an authentication-required error.
    #[must_use]
    pub fn authentication_required(message: impl Into<String>) -> Self {
        Self::AuthenticationRequired {
            message: message.into(),
        }
    }

    /// Creates an invalid-credentials error.
    #[must_use]
    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
        }
    }

    /// Creates an authorization error attributed to `policy`.
    #[must_use]
    pub fn authorization(message: impl Into<String>, policy: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
            policy: Some(policy.into()),
        }
    }

    /// Creates an unknown-policy error.
    #[must_use]
    pub fn unknown_policy(policy: impl Into<String>) -> Self {
        Self::UnknownPolicy {
            policy: policy.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method-not-allowed error.
    #[must_use]
    pub fn method_not_allowed(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates an unhandled fault without a source.
    #[must_use]
    pub fn unhandled(message: impl Into<String>) -> Self {
        Self::Unhandled {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unhandled fault wrapping `source`.
    pub fn unhandled_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Unhandled {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::BadRequest { .. } => ErrorCategory::BadRequest,
            Self::AuthenticationRequired { .. } | Self::InvalidCredentials { .. } => {
                ErrorCategory::Authentication
            }
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::UnknownPolicy { .. } | Self::Unhandled { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().status_code()
    }

    /// Returns the machine-readable envelope code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::AuthenticationRequired { .. } => "AUTHENTICATION_REQUIRED",
            Self::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            Self::Authorization { .. } => "AUTHORIZATION_DENIED",
            Self::UnknownPolicy { .. } => "UNKNOWN_POLICY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::Timeout { .. } => "REQUEST_TIMEOUT",
            Self::Unhandled { .. } => "INTERNAL_ERROR",
        }
    }

    /// Converts the error into an envelope.
    ///
    /// With `expose_detail` off, server-side faults carry a generic message
    /// and `detail` is always `null`.
    #[must_use]
    pub fn to_envelope(&self, expose_detail: bool) -> ErrorEnvelope {
        let message = if expose_detail || self.category().is_client_error() {
            self.to_string()
        } else {
            GENERIC_INTERNAL_MESSAGE.to_string()
        };

        ErrorEnvelope {
            error: ErrorBody {
                code: self.code().to_string(),
                message,
                detail: expose_detail.then(|| self.detail()).flatten(),
            },
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::Unhandled {
                source: Some(source),
                ..
            } => Some(format!("{source:#}")),
            Self::Unhandled { message, .. } => Some(message.clone()),
            Self::UnknownPolicy { policy } => {
                Some(format!("policy '{policy}' is not registered with the evaluator"))
            }
            Self::Authorization {
                policy: Some(policy),
                ..
            } => Some(format!("denied by policy '{policy}'")),
            _ => None,
        }
    }
}

/// The JSON body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error payload.
    pub error: ErrorBody,
}

/// Contents of an [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Diagnostic detail, `null` unless exposure is enabled.
    pub detail: Option<String>,
}

impl ErrorEnvelope {
    /// Serializes the envelope to a JSON string.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":{{"code":"{}","message":"{}","detail":null}}}}"#,
                self.error.code, GENERIC_INTERNAL_MESSAGE
            )
        })
    }
}
