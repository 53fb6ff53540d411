//! The root configuration type.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use portico_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};

use crate::schema::{
    AuthenticationConfig, AuthorizationConfig, HealthConfig, LogFormat, RoutesConfig,
    ServerConfig, TelemetrySettings,
};
use crate::ConfigError;

/// Complete gateway configuration.
///
/// Built once at startup and treated as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PorticoConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySettings,

    /// Accepted credentials.
    #[serde(default)]
    pub authentication: AuthenticationConfig,

    /// Named role policies.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Route groups and their policy bindings.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Dependency probes.
    #[serde(default)]
    pub health: HealthConfig,
}

impl PorticoConfig {
    /// Local development: pretty debug logs, error detail exposed, no HTTPS.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config.server.expose_internal_errors = true;
        config.server.enforce_https = false;
        config
    }

    /// Production: JSON logs, masked errors, HTTPS enforced.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.logging.ansi_enabled = false;
        config.server.expose_internal_errors = false;
        config.server.enforce_https = true;
        config
    }

    /// Checks values serde cannot check on its own.
    ///
    /// Cross-references (group → policy) are verified again when the
    /// gateway is assembled; checking here reports them with the config
    /// path that caused them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_connections",
                "must be greater than zero",
            ));
        }
        if self.health.timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "health.timeout_ms",
                "must be greater than zero",
            ));
        }

        let policies: HashSet<&str> = self
            .authorization
            .policies
            .iter()
            .map(|p| p.name.as_str())
            .collect();

        let mut groups = HashSet::new();
        for group in &self.routes.groups {
            let field = format!("routes.groups.{}", group.name);
            if !groups.insert(group.name.as_str()) {
                return Err(ConfigError::invalid_value(field, "duplicate route group"));
            }
            match (&group.policy, group.anonymous) {
                (Some(_), true) => {
                    return Err(ConfigError::invalid_value(
                        field,
                        "a group cannot be both anonymous and bound to a policy",
                    ))
                }
                (None, false) => {
                    return Err(ConfigError::invalid_value(
                        field,
                        "a group must name a policy or set anonymous = true",
                    ))
                }
                (Some(policy), false) if !policies.contains(policy.as_str()) => {
                    return Err(ConfigError::invalid_value(
                        field,
                        format!("unknown policy '{policy}'"),
                    ))
                }
                _ => {}
            }
        }

        for token in &self.authentication.tokens {
            if token.token.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "authentication.tokens",
                    format!("empty token for subject '{}'", token.subject),
                ));
            }
        }

        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// Graceful shutdown drain window.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Overall health run budget.
    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health.timeout_ms)
    }

    /// Telemetry settings in the form the telemetry crate installs.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let logging = &self.telemetry.logging;
        TelemetryConfig {
            logging: LogConfig {
                enabled: logging.enabled,
                level: logging.level.clone(),
                json_format: logging.format == LogFormat::Json,
                file_line_info: logging.format == LogFormat::Pretty,
                ansi: logging.ansi_enabled,
            },
            metrics: MetricsConfig {
                enabled: self.telemetry.metrics.enabled,
                duration_buckets: self.telemetry.metrics.histogram_buckets.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RouteGroupConfig;

    #[test]
    fn test_default_is_valid() {
        PorticoConfig::default().validate().unwrap();
    }

    #[test]
    fn test_presets() {
        let dev = PorticoConfig::development();
        assert!(dev.server.expose_internal_errors);
        assert_eq!(dev.telemetry.logging.format, LogFormat::Pretty);

        let prod = PorticoConfig::production();
        assert!(!prod.server.expose_internal_errors);
        assert!(prod.server.enforce_https);
        assert!(prod.telemetry_config().logging.json_format);
    }

    #[test]
    fn test_invalid_addr() {
        let mut config = PorticoConfig::default();
        config.server.http_addr = "not-an-address".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_group_without_binding_rejected() {
        let mut config = PorticoConfig::default();
        config.routes.groups.push(RouteGroupConfig {
            name: "reports".to_string(),
            policy: None,
            anonymous: false,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("routes.groups.reports"));
    }

    #[test]
    fn test_group_with_unknown_policy_rejected() {
        let mut config = PorticoConfig::default();
        config.routes.groups[0].policy = Some("OnlySupport".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OnlySupport"));
    }

    #[test]
    fn test_group_both_anonymous_and_policy_rejected() {
        let mut config = PorticoConfig::default();
        config.routes.groups[0].anonymous = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let mut config = PorticoConfig::default();
        let first = config.routes.groups[0].clone();
        config.routes.groups.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = PorticoConfig::default();
        config.health.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = PorticoConfig::default();
        config.server.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = PorticoConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.health_timeout(), Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }
}
