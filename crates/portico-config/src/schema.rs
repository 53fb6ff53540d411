//! Configuration section types.
//!
//! Every section rejects unknown fields, so a misspelled key fails startup
//! instead of being silently ignored.

use portico_health::HealthStatus;
use serde::{Deserialize, Serialize};

/// HTTP server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g. "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown drain window in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Keep-alive timeout in seconds; `None` disables keep-alive.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: Option<u64>,

    /// Serve HTTP/2 as well as HTTP/1.1.
    #[serde(default = "default_true")]
    pub http2_enabled: bool,

    /// Redirect plain HTTP requests to HTTPS.
    #[serde(default)]
    pub enforce_https: bool,

    /// Port used in HTTPS redirects; 443 when unset.
    #[serde(default)]
    pub https_port: Option<u16>,

    /// Include internal error detail in error envelopes.
    #[serde(default)]
    pub expose_internal_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_connections: default_max_connections(),
            request_timeout_ms: default_request_timeout(),
            keep_alive_secs: default_keep_alive(),
            http2_enabled: true,
            enforce_https: false,
            https_port: None,
            expose_internal_errors: false,
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    10000
}

fn default_request_timeout() -> u64 {
    30000
}

#[allow(clippy::unnecessary_wraps)]
fn default_keep_alive() -> Option<u64> {
    Some(60)
}

fn default_true() -> bool {
    true
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Logging subsection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Colorize pretty output.
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics subsection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Histogram bucket boundaries in seconds.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySettings {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// A bearer token accepted by the static credential validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// The opaque token value.
    pub token: String,

    /// Subject the token authenticates as.
    pub subject: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Roles granted to the caller.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Authentication section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthenticationConfig {
    /// Accepted bearer tokens.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// A named role policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Policy name referenced by route groups.
    pub name: String,

    /// The caller must hold at least one of these roles.
    pub required_roles: Vec<String>,
}

/// Authorization section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Policies to register at startup.
    #[serde(default = "default_policies")]
    pub policies: Vec<PolicyConfig>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            policies: default_policies(),
        }
    }
}

fn default_policies() -> Vec<PolicyConfig> {
    vec![PolicyConfig {
        name: "OnlyAdmins".to_string(),
        required_roles: vec!["SuperAdmin".to_string(), "Admin".to_string()],
    }]
}

/// A route group and its authorization binding.
///
/// Exactly one of `policy` and `anonymous = true` must be given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteGroupConfig {
    /// Group name used when registering routes.
    pub name: String,

    /// Policy the group is bound to.
    #[serde(default)]
    pub policy: Option<String>,

    /// Explicitly open to unauthenticated callers.
    #[serde(default)]
    pub anonymous: bool,
}

/// Routes section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// Route groups available to domain handlers.
    #[serde(default = "default_route_groups")]
    pub groups: Vec<RouteGroupConfig>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            groups: default_route_groups(),
        }
    }
}

fn default_route_groups() -> Vec<RouteGroupConfig> {
    ["users", "apps"]
        .into_iter()
        .map(|name| RouteGroupConfig {
            name: name.to_string(),
            policy: Some("OnlyAdmins".to_string()),
            anonymous: false,
        })
        .collect()
}

/// How a probe checks its target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// TCP connect to a `host:port` target.
    #[default]
    Tcp,
}

/// A dependency probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Unique probe name, reported in health entries.
    pub name: String,

    /// Check mechanism.
    #[serde(default)]
    pub kind: ProbeKind,

    /// Dependency address.
    pub target: String,

    /// Status recorded when the probe fails or times out.
    #[serde(default = "default_failure_status")]
    pub failure_status: HealthStatus,

    /// Connects slower than this report Degraded.
    #[serde(default)]
    pub slow_threshold_ms: Option<u64>,

    /// Tags for `GET /health?tag=`.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_failure_status() -> HealthStatus {
    HealthStatus::Unhealthy
}

/// Health section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Overall budget for one health run, in milliseconds.
    #[serde(default = "default_health_timeout")]
    pub timeout_ms: u64,

    /// Probes to register at startup.
    #[serde(default = "default_probes")]
    pub probes: Vec<ProbeConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_health_timeout(),
            probes: default_probes(),
        }
    }
}

fn default_health_timeout() -> u64 {
    5000
}

fn default_probes() -> Vec<ProbeConfig> {
    let probe = |name: &str, target: &str, tags: &[&str]| ProbeConfig {
        name: name.to_string(),
        kind: ProbeKind::Tcp,
        target: target.to_string(),
        failure_status: HealthStatus::Unhealthy,
        slow_threshold_ms: None,
        tags: tags.iter().map(ToString::to_string).collect(),
    };
    vec![
        probe("cache", "localhost:6379", &["cache", "redis"]),
        probe("identity-store", "localhost:5432", &["db", "sql"]),
        probe("app-store", "localhost:5433", &["db", "sql"]),
    ]
}
