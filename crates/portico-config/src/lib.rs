//! Typed configuration for the Portico gateway.
//!
//! - TOML and JSON files
//! - `PORTICO__SECTION__KEY` environment overrides (and `.env` files)
//! - Strict parsing: unknown fields are errors
//! - `development()` and `production()` presets
//!
//! # Example
//!
//! ```no_run
//! use portico_config::ConfigLoader;
//!
//! # fn main() -> Result<(), portico_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_production()
//!     .with_file("portico.toml")?
//!     .with_env_prefix("PORTICO")
//!     .load()?;
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//! enforce_https = true
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [[authentication.tokens]]
//! token = "s3cr3t"
//! subject = "ops-bot"
//! roles = ["Admin"]
//!
//! [[authorization.policies]]
//! name = "OnlyAdmins"
//! required_roles = ["SuperAdmin", "Admin"]
//!
//! [[routes.groups]]
//! name = "users"
//! policy = "OnlyAdmins"
//!
//! [health]
//! timeout_ms = 5000
//!
//! [[health.probes]]
//! name = "cache"
//! target = "redis:6379"
//! tags = ["cache"]
//! ```

#![doc(html_root_url = "https://docs.rs/portico-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::PorticoConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    AuthenticationConfig, AuthorizationConfig, HealthConfig, LogFormat, LoggingConfig,
    MetricsSettings, PolicyConfig, ProbeConfig, ProbeKind, RouteGroupConfig, RoutesConfig,
    ServerConfig, TelemetrySettings, TokenConfig,
};
