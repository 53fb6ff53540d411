//! Startup and server errors.

use std::net::SocketAddr;

use portico_authz::AuthzError;
use portico_config::ConfigError;
use portico_health::HealthError;
use portico_middleware::PipelineError;
use portico_telemetry::TelemetryError;
use thiserror::Error;

/// Any configuration error raised while assembling the gateway.
///
/// Every variant is fatal: the process must not serve traffic with a
/// partially built gateway.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Invalid configuration file, environment or values.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Policy registration failed.
    #[error("policy registration failed: {0}")]
    Policy(#[from] AuthzError),

    /// Probe registration failed.
    #[error("probe registration failed: {0}")]
    Health(#[from] HealthError),

    /// Route table or stage chain is invalid.
    #[error("pipeline assembly failed: {0}")]
    Pipeline(#[from] PipelineError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The listener could not be set up.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Errors from the HTTP server loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address does not parse.
    #[error("invalid listen address '{addr}'")]
    InvalidAddress {
        /// The configured address.
        addr: String,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}")]
    Bind {
        /// Address we tried to bind.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_from_sources() {
        let err: StartupError = AuthzError::DuplicatePolicy {
            name: "OnlyAdmins".to_string(),
        }
        .into();
        assert!(err.to_string().contains("OnlyAdmins"));

        let err: StartupError = ConfigError::invalid_value("server.http_addr", "bad").into();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::InvalidAddress {
            addr: "nowhere".to_string(),
        };
        assert_eq!(err.to_string(), "invalid listen address 'nowhere'");
    }
}
