//! Aggregate execution metrics, separate from the pass/fail verdict.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::report::ExecutionResult;

/// Snapshot of everything collected so far.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total iterations recorded.
    pub total_executions: u64,
    /// Iterations that succeeded.
    pub success_count: u64,
    /// Iterations that failed.
    pub failure_count: u64,
    /// Mean iteration duration in milliseconds, across all recorded
    /// iterations.
    pub avg_duration_ms: f64,
    /// Per-injector metrics snapshots, last write wins per key.
    pub per_injector: HashMap<String, HashMap<String, f64>>,
}

#[derive(Default)]
struct Inner {
    total_executions: u64,
    success_count: u64,
    failure_count: u64,
    total_duration_ms: u64,
    per_injector: HashMap<String, HashMap<String, f64>>,
}

/// Accumulates execution results and per-injector metrics across a run.
/// A single `Mutex`-guarded aggregate, matching the teacher's
/// `Mutex<HashMap<...>>`-style counters rather than one atomic per
/// field.
#[derive(Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

impl MetricsCollector {
    /// Build an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one iteration's result into the running totals.
    pub fn record_execution(&self, result: &ExecutionResult) {
        let mut inner = self.inner.lock();
        inner.total_executions += 1;
        if result.success {
            inner.success_count += 1;
        } else {
            inner.failure_count += 1;
        }
        inner.total_duration_ms += result.duration_ms;
    }

    /// Record (overwriting) an injector's metrics snapshot.
    pub fn record_injector_metrics(&self, injector_name: &str, values: HashMap<String, f64>) {
        self.inner.lock().per_injector.insert(injector_name.to_string(), values);
    }

    /// A point-in-time snapshot of everything collected so far.
    pub fn stats(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let avg_duration_ms = if inner.total_executions == 0 {
            0.0
        } else {
            inner.total_duration_ms as f64 / inner.total_executions as f64
        };
        MetricsSnapshot {
            total_executions: inner.total_executions,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            avg_duration_ms,
            per_injector: inner.per_injector.clone(),
        }
    }
}
