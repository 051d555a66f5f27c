//! The verdict data model: thresholds in, a classified report out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of one iteration, as seen by the reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Name of the scenario this iteration belongs to.
    pub scenario: String,
    /// Zero-based iteration index.
    pub iteration: u64,
    /// Whether every step and validator passed.
    pub success: bool,
    /// Number of steps actually executed before either completing the
    /// sequence or bailing out on the first failing step.
    pub steps_executed: u64,
    /// Wall-clock duration of the iteration, in milliseconds.
    pub duration_ms: u64,
    /// When the iteration started.
    pub timestamp: DateTime<Utc>,
    /// Failure text, when `success` is `false`. Expected to contain a
    /// classification keyword (`"validator <name> failed"`, `"timeout"`,
    /// `"panic"`, `"goroutine"`, `"recursion"`, `"memory"`) produced by
    /// [`crate::error::ExecutorError`]'s `Display` impl.
    pub error: Option<String>,
}

/// Severity of a categorized failure pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Always fails the run.
    Critical,
    /// Downgrades the run to `UNSTABLE` unless something else already
    /// fails it.
    Warning,
    /// Recorded but does not affect the verdict.
    Info,
}

/// The final pass/fail classification (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// All thresholds satisfied, no warnings.
    Pass,
    /// Thresholds satisfied but at least one warning-severity pattern
    /// occurred.
    Unstable,
    /// A threshold was violated, or a critical-severity pattern occurred.
    Fail,
}

impl Verdict {
    /// Process exit code this verdict maps to: 0 for `Pass`/`Unstable`,
    /// 1 for `Fail` (spec §6).
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Pass | Verdict::Unstable => 0,
            Verdict::Fail => 1,
        }
    }
}

/// Thresholds the reporter applies to decide the verdict. Embedders may
/// load these from a YAML/JSON config file via `serde_yaml`/`serde_json`
/// rather than constructing them in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessThresholds {
    /// Minimum fraction of iterations that must succeed, in `[0, 1]`.
    pub min_success_rate: f64,
    /// Maximum number of failed iterations tolerated before `FAIL`. Zero
    /// means "unbounded" (the rule is skipped).
    pub max_failed_iterations: u64,
    /// Every validator must pass in every iteration.
    pub require_all_validators_passing: bool,
    /// Validator-category names whose occurrence always fails the run.
    pub critical_validators: Vec<String>,
    /// Validator-category names whose occurrence downgrades to
    /// `UNSTABLE`.
    pub warning_validators: Vec<String>,
}

impl Default for SuccessThresholds {
    fn default() -> Self {
        Self {
            min_success_rate: 0.95,
            max_failed_iterations: 0,
            require_all_validators_passing: false,
            critical_validators: vec![
                "goroutine-limit".to_string(),
                "recursion-depth".to_string(),
                "memory-limit".to_string(),
                "panic-recovery".to_string(),
                "slow-iteration".to_string(),
            ],
            warning_validators: vec!["execution-time".to_string()],
        }
    }
}

/// A failure pattern tallied across the run, with its digit runs
/// normalized to `N` so that e.g. `"connection to host-3 refused"` and
/// `"connection to host-7 refused"` collapse into one pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    /// Normalized pattern text.
    pub pattern: String,
    /// Number of iterations exhibiting it.
    pub count: u64,
}

/// A validator/error-type failure broken out for the failure-analysis
/// section of the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureAnalysis {
    /// Failure counts keyed by validator name (extracted from `"validator
    /// <name> failed: ..."` text).
    pub by_validator: HashMap<String, u64>,
    /// Failure counts keyed by classified error type (`"panic"`,
    /// `"timeout"`, `"goroutine"`, `"recursion"`, `"memory"`, `"other"`,
    /// `"unknown"`).
    pub by_type: HashMap<String, u64>,
}

/// Failure rate within one time window of the run, when time-windowed
/// analysis was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRateWindow {
    /// Window start, as an iteration index.
    pub start_iteration: u64,
    /// Window end, as an iteration index (exclusive).
    pub end_iteration: u64,
    /// Fraction of iterations in this window that failed.
    pub failure_rate: f64,
}

/// The complete classified report produced by
/// [`crate::reporter::Reporter::get_verdict`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Name of the scenario these results belong to (empty if no
    /// iterations were recorded).
    pub scenario: String,
    /// When the earliest recorded iteration started.
    pub executed_at: DateTime<Utc>,
    /// Sum of every recorded iteration's wall-clock duration.
    pub total_duration_ms: u64,
    /// The final verdict.
    pub verdict: Verdict,
    /// One-line human-readable explanation of which rule decided the
    /// verdict.
    pub summary: String,
    /// Total iterations observed.
    pub total_executions: u64,
    /// Iterations that succeeded.
    pub success_count: u64,
    /// Iterations that failed.
    pub failure_count: u64,
    /// `success_count / total_executions`, or `1.0` when there were no
    /// iterations.
    pub success_rate: f64,
    /// Mean iteration duration, in milliseconds.
    pub avg_duration_ms: f64,
    /// Failures bucketed by severity, keyed by the canonical category
    /// name (spec §6: validator-name normalization).
    pub categorized_failures: HashMap<Severity, Vec<String>>,
    /// The five most common normalized error patterns, most frequent
    /// first.
    pub top_error_patterns: Vec<ErrorPattern>,
    /// Failure analysis broken out by validator and by error type.
    pub failure_analysis: FailureAnalysis,
    /// Failure rate over time, when windowed analysis was requested.
    pub failure_rate_series: Option<Vec<FailureRateWindow>>,
    /// The thresholds that were applied to reach this verdict.
    pub applied_thresholds: ThresholdsSnapshot,
}

/// A serializable copy of the thresholds that produced a [`Report`],
/// embedded for audit purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsSnapshot {
    /// See [`SuccessThresholds::min_success_rate`].
    pub min_success_rate: f64,
    /// See [`SuccessThresholds::max_failed_iterations`].
    pub max_failed_iterations: u64,
    /// See [`SuccessThresholds::require_all_validators_passing`].
    pub require_all_validators_passing: bool,
}

impl From<&SuccessThresholds> for ThresholdsSnapshot {
    fn from(thresholds: &SuccessThresholds) -> Self {
        Self {
            min_success_rate: thresholds.min_success_rate,
            max_failed_iterations: thresholds.max_failed_iterations,
            require_all_validators_passing: thresholds.require_all_validators_passing,
        }
    }
}
