//! Layered configuration loading.
//!
//! Later layers override earlier ones:
//! 1. Defaults (or a preset)
//! 2. A TOML or JSON file
//! 3. A `.env` file, feeding
//! 4. `PREFIX__SECTION__KEY` environment variables

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::schema::LogFormat;
use crate::{ConfigError, PorticoConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "PORTICO";

/// Builds a [`PorticoConfig`] from layered sources.
///
/// ```no_run
/// use portico_config::ConfigLoader;
///
/// # fn main() -> Result<(), portico_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("portico.toml")?
///     .with_dotenv()
///     .with_env_prefix("PORTICO")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: PorticoConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Starts from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PorticoConfig::default(),
            env_prefix: None,
        }
    }

    /// Starts from the development preset.
    ///
    /// ```
    /// use portico_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = PorticoConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = PorticoConfig::production();
        self
    }

    /// Loads a file; the format follows the extension (`.toml` or `.json`).
    ///
    /// Sections present in the file replace the current ones; absent
    /// sections keep their current values.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.with_string(&content, &format)
    }

    /// Loads a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration text in `format` ("toml" or "json").
    ///
    /// ```
    /// use portico_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let overlay: serde_json::Value = match format.to_lowercase().as_str() {
            "toml" => {
                let value: toml::Value = toml::from_str(content)?;
                serde_json::to_value(value)?
            }
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        let mut base = serde_json::to_value(&self.config)?;
        if let (Some(base), serde_json::Value::Object(overlay)) = (base.as_object_mut(), overlay) {
            for (section, value) in overlay {
                base.insert(section, value);
            }
        }
        self.config = serde_json::from_value(base)?;
        Ok(self)
    }

    /// Loads `.env` from the working directory into the process
    /// environment, if present.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Enables `PREFIX__SECTION__KEY` overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies environment overrides and validates.
    pub fn load(mut self) -> Result<PorticoConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: BTreeMap<String, String> = env::vars()
                .filter(|(key, _)| key.starts_with(&format!("{prefix}__")))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without validating it.
    #[must_use]
    pub fn load_unvalidated(self) -> PorticoConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let rest = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
        let parts: Vec<&str> = rest.split("__").collect();

        let config = &mut self.config;
        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_num(key, value)?;
            }
            ["SERVER", "MAX_CONNECTIONS"] => config.server.max_connections = parse_num(key, value)?,
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_num(key, value)?;
            }
            ["SERVER", "KEEP_ALIVE_SECS"] => {
                config.server.keep_alive_secs = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(parse_num(key, value)?)
                };
            }
            ["SERVER", "HTTP2_ENABLED"] => config.server.http2_enabled = parse_flag(key, value)?,
            ["SERVER", "ENFORCE_HTTPS"] => config.server.enforce_https = parse_flag(key, value)?,
            ["SERVER", "HTTPS_PORT"] => {
                config.server.https_port = if value.is_empty() {
                    None
                } else {
                    Some(parse_num(key, value)?)
                };
            }
            ["SERVER", "EXPOSE_INTERNAL_ERRORS"] => {
                config.server.expose_internal_errors = parse_flag(key, value)?;
            }

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                config.telemetry.logging.ansi_enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_flag(key, value)?;
            }

            ["HEALTH", "TIMEOUT_MS"] => config.health.timeout_ms = parse_num(key, value)?,

            _ => {
                return Err(ConfigError::env_parse_error(
                    key,
                    "unknown configuration key",
                ))
            }
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
