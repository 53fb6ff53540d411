//! Health status levels.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Health of a single dependency or of the whole gateway.
///
/// Variants are ordered by severity, so the composite status of a report is
/// simply the maximum of its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Fully functional.
    #[default]
    #[serde(alias = "healthy")]
    Healthy,
    /// Functional with reduced capability.
    #[serde(alias = "degraded")]
    Degraded,
    /// Not functional.
    #[serde(alias = "unhealthy")]
    Unhealthy,
}

impl HealthStatus {
    /// Returns `true` for statuses that still accept traffic.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    /// HTTP status code for a report carrying this status.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Healthy | Self::Degraded => StatusCode::OK,
            Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Most severe status in `statuses`; `Healthy` when empty.
    pub fn worst<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        statuses.into_iter().max().unwrap_or(Self::Healthy)
    }

    /// Returns the status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Degraded => "Degraded",
            Self::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(Self::Healthy),
            "degraded" => Ok(Self::Degraded),
            "unhealthy" => Ok(Self::Unhealthy),
            other => Err(format!("unknown health status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
    }

    #[test]
    fn test_worst() {
        assert_eq!(HealthStatus::worst([]), HealthStatus::Healthy);
        assert_eq!(
            HealthStatus::worst([HealthStatus::Healthy, HealthStatus::Degraded]),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::worst([
                HealthStatus::Unhealthy,
                HealthStatus::Degraded,
                HealthStatus::Healthy
            ]),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(HealthStatus::Healthy.http_status(), StatusCode::OK);
        assert_eq!(HealthStatus::Degraded.http_status(), StatusCode::OK);
        assert_eq!(
            HealthStatus::Unhealthy.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"Degraded\""
        );
        let parsed: HealthStatus = serde_json::from_str("\"unhealthy\"").unwrap();
        assert_eq!(parsed, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Degraded".parse::<HealthStatus>().unwrap(), HealthStatus::Degraded);
        assert!("broken".parse::<HealthStatus>().is_err());
    }
}
