// src/context.rs

//! Per-run context threaded through the planner, build driver, installer
//! and executor.
//!
//! Everything that would otherwise be process-global state lives here: the
//! debugging switch, the feature-packages opt-in, and the metrics sink.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::Result;

/// Telemetry sink. Failures to record are never surfaced to callers;
/// metrics must not affect the outcome of an operation.
pub trait MetricsSink: Send + Sync {
    fn track_property(&self, name: &str, value: &str);
    fn track_metric(&self, name: &str, value: f64);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn track_property(&self, _name: &str, _value: &str) {}
    fn track_metric(&self, _name: &str, _value: f64) {}
}

#[derive(Debug, Serialize)]
struct MetricEvent<'a> {
    timestamp: DateTime<Utc>,
    kind: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

/// Appends one JSON object per event to a log file.
pub struct JsonFileMetrics {
    file: Mutex<File>,
}

impl JsonFileMetrics {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn append(&self, event: &MetricEvent<'_>) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = writeln!(file, "{}", line) {
            warn!("failed to record metric event: {}", e);
        }
    }
}

impl MetricsSink for JsonFileMetrics {
    fn track_property(&self, name: &str, value: &str) {
        self.append(&MetricEvent {
            timestamp: Utc::now(),
            kind: "property",
            name,
            text: Some(value),
            value: None,
        });
    }

    fn track_metric(&self, name: &str, value: f64) {
        self.append(&MetricEvent {
            timestamp: Utc::now(),
            kind: "metric",
            name,
            text: None,
            value: Some(value),
        });
    }
}

/// Explicit run state, passed by reference everywhere.
pub struct RunContext {
    /// Pass child process output through instead of discarding it.
    pub debugging: bool,
    /// Enables the feature-aware planner and feature syntax in specs.
    pub feature_packages: bool,
    metrics: Box<dyn MetricsSink>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            debugging: false,
            feature_packages: false,
            metrics: Box::new(NullMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Box<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &dyn MetricsSink {
        self.metrics.as_ref()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_metrics_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.jsonl");

        let sink = JsonFileMetrics::open(&path).unwrap();
        sink.track_property("installplan", "zlib:x64-windows");
        sink.track_metric("buildtimeus-zlib:x64-windows", 1234.0);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"kind\":\"property\""));
        assert!(lines[1].contains("\"kind\":\"metric\""));
    }

    #[test]
    fn test_default_context() {
        let ctx = RunContext::new();
        assert!(!ctx.debugging);
        assert!(!ctx.feature_packages);
        ctx.metrics().track_property("noop", "ok");
    }
}
