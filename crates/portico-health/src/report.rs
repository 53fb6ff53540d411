//! Health report types.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::HealthStatus;

/// The result of one probe within a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
    /// Probe name.
    pub name: String,
    /// Recorded status.
    pub status: HealthStatus,
    /// Wall time spent on this probe.
    pub duration_ms: u64,
    /// Failure detail; always `null` for healthy entries.
    pub error: Option<String>,
    /// Diagnostic reported by the probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags of the registration.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

/// Composite health of every probe that ran.
///
/// A report is built fresh for each run and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Worst entry status, `Healthy` when there are no entries.
    pub status: HealthStatus,
    /// Entries in registration order.
    pub entries: Vec<HealthEntry>,
    /// Wall time of the whole run.
    pub total_duration_ms: u64,
    /// When the run completed.
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Builds a report from finished entries.
    #[must_use]
    pub fn from_entries(entries: Vec<HealthEntry>, total: Duration) -> Self {
        Self {
            status: HealthStatus::worst(entries.iter().map(|entry| entry.status)),
            entries,
            total_duration_ms: total.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    /// Looks up an entry by probe name.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&HealthEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// HTTP status code for this report.
    #[must_use]
    pub const fn http_status(&self) -> http::StatusCode {
        self.status.http_status()
    }

    /// Serializes the report as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, status: HealthStatus, error: Option<&str>) -> HealthEntry {
        HealthEntry {
            name: name.to_string(),
            status,
            duration_ms: 5,
            error: error.map(ToString::to_string),
            description: None,
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_empty_report_is_healthy() {
        let report = HealthReport::from_entries(Vec::new(), Duration::ZERO);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.entries.is_empty());
        assert_eq!(report.http_status(), http::StatusCode::OK);
    }

    #[test]
    fn test_status_is_worst_entry() {
        let report = HealthReport::from_entries(
            vec![
                entry("a", HealthStatus::Healthy, None),
                entry("b", HealthStatus::Degraded, Some("slow")),
            ],
            Duration::from_millis(7),
        );
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.total_duration_ms, 7);
        assert_eq!(report.entry("b").unwrap().error.as_deref(), Some("slow"));
    }

    #[test]
    fn test_json_shape() {
        let report = HealthReport::from_entries(
            vec![entry("cache", HealthStatus::Unhealthy, Some("timed out"))],
            Duration::from_millis(1),
        );
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["status"], "Unhealthy");
        assert_eq!(value["entries"][0]["name"], "cache");
        assert_eq!(value["entries"][0]["durationMs"], 5);
        assert_eq!(value["entries"][0]["error"], "timed out");
        assert!(value["entries"][0].get("tags").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_healthy_entry_serializes_null_error() {
        let report = HealthReport::from_entries(
            vec![entry("db", HealthStatus::Healthy, None)],
            Duration::ZERO,
        );
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["entries"][0]["error"].is_null());
    }
}
