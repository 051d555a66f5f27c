//! Turns a stream of iteration results into a pass/fail verdict.
//!
//! The classification text this module parses comes entirely from
//! [`crate::error::ExecutorError`]'s `Display` implementation — a
//! substring scan over lowercased text, the same "sniff the string"
//! approach the teacher crate's `analytics.rs` uses to bucket raw error
//! strings before its ML layer sees them.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::ReporterError;
use crate::report::{
    ErrorPattern, ExecutionResult, FailureAnalysis, FailureRateWindow, Report, Severity,
    SuccessThresholds, ThresholdsSnapshot, Verdict,
};

/// Accumulates [`ExecutionResult`]s across a run and, on demand, reduces
/// them to a [`Report`] against a set of [`SuccessThresholds`].
#[derive(Default)]
pub struct Reporter {
    results: Mutex<Vec<ExecutionResult>>,
}

impl Reporter {
    /// Build an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one iteration's result.
    pub fn record(&self, result: ExecutionResult) {
        self.results.lock().push(result);
    }

    /// Reduce everything recorded so far to a verdict, against the given
    /// thresholds.
    pub fn get_verdict(&self, thresholds: &SuccessThresholds) -> Result<Report, ReporterError> {
        if !(0.0..=1.0).contains(&thresholds.min_success_rate) {
            return Err(ReporterError::InvalidSuccessRate(thresholds.min_success_rate));
        }

        let results = self.results.lock().clone();
        let total_executions = results.len() as u64;
        let success_count = results.iter().filter(|r| r.success).count() as u64;
        let failure_count = total_executions - success_count;
        let success_rate = if total_executions == 0 {
            1.0
        } else {
            success_count as f64 / total_executions as f64
        };
        let avg_duration_ms = if total_executions == 0 {
            0.0
        } else {
            results.iter().map(|r| r.duration_ms).sum::<u64>() as f64 / total_executions as f64
        };

        let scenario = results.first().map(|r| r.scenario.clone()).unwrap_or_default();
        let executed_at = results.iter().map(|r| r.timestamp).min().unwrap_or_else(chrono::Utc::now);
        let total_duration_ms = results.iter().map(|r| r.duration_ms).sum();

        let failure_texts: Vec<&str> = results
            .iter()
            .filter_map(|r| r.error.as_deref())
            .collect();

        let failure_analysis = analyze_failures(&failure_texts);
        let top_error_patterns = top_patterns(&failure_texts);
        let categorized_failures = categorize_failures(&failure_texts, thresholds);
        let failure_rate_series = windowed_failure_rate(&results);

        let has_critical = categorized_failures
            .get(&Severity::Critical)
            .is_some_and(|v| !v.is_empty());
        let has_warning = categorized_failures
            .get(&Severity::Warning)
            .is_some_and(|v| !v.is_empty());

        let (verdict, summary) = if has_critical {
            (
                Verdict::Fail,
                "FAIL: a critical-severity validator failure occurred".to_string(),
            )
        } else if success_rate < thresholds.min_success_rate {
            (
                Verdict::Fail,
                format!(
                    "FAIL: success rate {:.1}% is below the required {:.1}%",
                    success_rate * 100.0,
                    thresholds.min_success_rate * 100.0
                ),
            )
        } else if thresholds.max_failed_iterations > 0 && failure_count > thresholds.max_failed_iterations {
            (
                Verdict::Fail,
                format!(
                    "FAIL: {failure_count} failed iterations exceeds the maximum of {}",
                    thresholds.max_failed_iterations
                ),
            )
        } else if thresholds.require_all_validators_passing && failure_count > 0 {
            (
                Verdict::Fail,
                format!("FAIL: {failure_count} iteration(s) failed and all validators are required to pass"),
            )
        } else if has_warning {
            (
                Verdict::Unstable,
                "UNSTABLE: a warning-severity validator failure occurred".to_string(),
            )
        } else {
            (Verdict::Pass, "PASS: all thresholds satisfied".to_string())
        };

        Ok(Report {
            scenario,
            executed_at,
            total_duration_ms,
            verdict,
            summary,
            total_executions,
            success_count,
            failure_count,
            success_rate,
            avg_duration_ms,
            categorized_failures,
            top_error_patterns,
            failure_analysis,
            failure_rate_series,
            applied_thresholds: ThresholdsSnapshot::from(thresholds),
        })
    }
}

/// Pull the validator name out of `"validator <name> failed: ..."` text.
fn extract_validator_name(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("validator ")?;
    let (name, rest) = rest.split_once(' ')?;
    rest.starts_with("failed").then_some(name)
}

/// Classify error text into a coarse error-type bucket by substring
/// match on the lowercased text, in a fixed priority order.
fn classify_error_type(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    const ORDER: &[(&str, &str)] = &[
        ("goroutine", "goroutine"),
        ("panic", "panic"),
        ("recursion", "recursion"),
        ("timeout", "timeout"),
        ("memory", "memory"),
    ];
    for (needle, label) in ORDER {
        if lower.contains(needle) {
            return label;
        }
    }
    if lower.is_empty() {
        "unknown"
    } else {
        "other"
    }
}

fn analyze_failures(texts: &[&str]) -> FailureAnalysis {
    let mut by_validator = HashMap::new();
    let mut by_type = HashMap::new();
    for text in texts {
        if let Some(name) = extract_validator_name(text) {
            *by_validator.entry(name.to_string()).or_insert(0u64) += 1;
        }
        *by_type.entry(classify_error_type(text).to_string()).or_insert(0u64) += 1;
    }
    FailureAnalysis { by_validator, by_type }
}

/// Collapse digit runs to `N` so that patterns differing only in an
/// embedded number (host index, attempt count, byte offset) tally
/// together.
fn normalize_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            out.push('N');
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn top_patterns(texts: &[&str]) -> Vec<ErrorPattern> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for text in texts {
        *counts.entry(normalize_pattern(text)).or_insert(0) += 1;
    }
    let mut patterns: Vec<ErrorPattern> = counts
        .into_iter()
        .map(|(pattern, count)| ErrorPattern { pattern, count })
        .collect();
    patterns.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pattern.cmp(&b.pattern)));
    patterns.truncate(5);
    patterns
}

/// Normalize a validator name to its canonical category: strip a
/// trailing `_<digits><letters>`/`-<digits><letters>` disambiguation
/// suffix and a leading `no_`/`no-` negation prefix, matching the
/// teacher's scenario-naming convention of suffixing instance numbers
/// onto a base category name, then canonicalize every remaining
/// separator to `-` so the result matches the spec's hyphenated
/// category names (`goroutine-limit`, `recursion-depth`, ...)
/// regardless of whether the raw validator name used `_` or `-`.
fn normalize_validator_category(name: &str) -> String {
    let stripped_suffix = {
        let bytes = name.as_bytes();
        let mut cut = name.len();
        let mut idx = name.len();
        while idx > 0 {
            let c = bytes[idx - 1] as char;
            if c.is_ascii_alphabetic() {
                idx -= 1;
                continue;
            }
            break;
        }
        let alpha_start = idx;
        let mut digit_idx = alpha_start;
        while digit_idx > 0 && (bytes[digit_idx - 1] as char).is_ascii_digit() {
            digit_idx -= 1;
        }
        if digit_idx > 0 && matches!(bytes[digit_idx - 1], b'_' | b'-') && digit_idx < alpha_start {
            cut = digit_idx - 1;
        } else if digit_idx < alpha_start && digit_idx > 0 {
            cut = digit_idx;
        }
        let mut cut = cut;
        while cut > 0 && matches!(bytes[cut - 1], b'_' | b'-') {
            cut -= 1;
        }
        &name[..cut]
    };

    let without_prefix = stripped_suffix
        .strip_prefix("no_")
        .or_else(|| stripped_suffix.strip_prefix("no-"))
        .unwrap_or(stripped_suffix);

    without_prefix.replace('_', "-")
}

fn categorize_failures(
    texts: &[&str],
    thresholds: &SuccessThresholds,
) -> HashMap<Severity, Vec<String>> {
    let mut out: HashMap<Severity, Vec<String>> = HashMap::new();
    for text in texts {
        let Some(name) = extract_validator_name(text) else {
            continue;
        };
        let category = normalize_validator_category(name);
        let severity = if thresholds.critical_validators.iter().any(|c| c == &category) {
            Severity::Critical
        } else if thresholds.warning_validators.iter().any(|w| w == &category) {
            Severity::Warning
        } else {
            Severity::Info
        };
        out.entry(severity).or_default().push(category);
    }
    out
}

/// Split the run into fixed-size windows (10 iterations, or one window
/// covering the whole run if shorter) and compute each window's failure
/// rate. Returns `None` for an empty run.
fn windowed_failure_rate(results: &[ExecutionResult]) -> Option<Vec<FailureRateWindow>> {
    if results.is_empty() {
        return None;
    }
    const WINDOW: usize = 10;
    let mut windows = Vec::new();
    for chunk_start in (0..results.len()).step_by(WINDOW) {
        let chunk = &results[chunk_start..(chunk_start + WINDOW).min(results.len())];
        let failures = chunk.iter().filter(|r| !r.success).count();
        windows.push(FailureRateWindow {
            start_iteration: chunk.first().expect("chunk is non-empty").iteration,
            end_iteration: chunk.last().expect("chunk is non-empty").iteration + 1,
            failure_rate: failures as f64 / chunk.len() as f64,
        });
    }
    Some(windows)
}
