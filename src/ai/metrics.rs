//! Observability sinks shipped with the engine
//!
//! [`InMemoryMetricsCollector`] keeps per-operation counters in a concurrent
//! map for host-side introspection; [`TracingLogger`] forwards structured log
//! lines to the `tracing` macros.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::ai::traits::{MetricsCollector, StructuredLogger};

/// Counters for one logical operation (`stage1_analysis`, `stage2_analysis`,
/// `two_stage_analysis`).
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub success_count: u64,
    pub error_count: u64,
    pub total_duration_ms: u64,
    pub last_error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl OperationStats {
    fn new() -> Self {
        Self {
            success_count: 0,
            error_count: 0,
            total_duration_ms: 0,
            last_error: None,
            last_updated: Utc::now(),
        }
    }

    pub fn total_count(&self) -> u64 {
        self.success_count + self.error_count
    }

    pub fn average_duration_ms(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        self.total_duration_ms as f64 / total as f64
    }
}

/// Metrics collector backed by a concurrent map, safe to share across all
/// engine calls.
#[derive(Debug, Default)]
pub struct InMemoryMetricsCollector {
    operations: DashMap<String, OperationStats>,
}

impl InMemoryMetricsCollector {
    pub fn new() -> Self {
        Self {
            operations: DashMap::new(),
        }
    }

    /// Current counters for one operation, if it has been recorded.
    pub fn snapshot(&self, operation: &str) -> Option<OperationStats> {
        self.operations.get(operation).map(|stats| stats.clone())
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn record_success(&self, operation: &str, duration: Duration) {
        let mut stats = self
            .operations
            .entry(operation.to_string())
            .or_insert_with(OperationStats::new);
        stats.success_count += 1;
        stats.total_duration_ms += duration.as_millis() as u64;
        stats.last_updated = Utc::now();
    }

    fn record_error(&self, operation: &str, duration: Duration, error_kind: &str) {
        let mut stats = self
            .operations
            .entry(operation.to_string())
            .or_insert_with(OperationStats::new);
        stats.error_count += 1;
        stats.total_duration_ms += duration.as_millis() as u64;
        stats.last_error = Some(error_kind.to_string());
        stats.last_updated = Utc::now();
    }
}

/// Default [`StructuredLogger`] that emits through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl StructuredLogger for TracingLogger {
    fn info(&self, message: &str, context: serde_json::Value) {
        info!(context = %context, "{}", message);
    }

    fn debug(&self, message: &str, context: serde_json::Value) {
        debug!(context = %context, "{}", message);
    }

    fn warn(&self, message: &str, context: serde_json::Value) {
        warn!(context = %context, "{}", message);
    }

    fn error(&self, message: &str, context: serde_json::Value) {
        error!(context = %context, "{}", message);
    }
}
