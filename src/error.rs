//! Crate-wide error taxonomy.
//!
//! Every variant's `Display` text carries the discriminator words the
//! [`crate::reporter::Reporter`]'s substring classifier keys on (see
//! `reporter.rs`): `"validator <name> failed"`, `"goroutine"`, `"panic"`,
//! `"recursion"`, `"timeout"`, `"memory"`.

use thiserror::Error;

/// Errors surfaced from [`crate::executor::Executor::run`].
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// `target.setup` returned an error; no injectors were started.
    #[error("target setup failed: {0}")]
    Setup(#[source] anyhow::Error),

    /// An injector's `inject` failed during startup; already-started
    /// injectors have been stopped in reverse order.
    #[error("injector '{injector}' failed to start: {source}")]
    InjectorStart {
        /// Name of the injector that failed to start.
        injector: String,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// A step returned an error or panicked.
    #[error("step '{step}' failed: {source}")]
    Step {
        /// Name of the failing step.
        step: String,
        /// Underlying cause.
        #[source]
        source: StepError,
    },

    /// A validator rejected the iteration.
    #[error("validator {validator} failed: {detail}")]
    Validator {
        /// Name of the failing validator.
        validator: String,
        /// Human-readable detail, expected to contain a classification
        /// keyword such as "timeout", "panic", "goroutine", "recursion"
        /// or "memory" when applicable.
        detail: String,
    },

    /// Injector `stop`/`teardownNetwork`, or `target.teardown`, failed.
    /// Only surfaced from `run` when no earlier error exists.
    #[error("shutdown error: {0}")]
    Shutdown(#[source] anyhow::Error),

    /// Scenario failed preflight checks (no target, for instance).
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}

/// Error produced by a single step execution.
#[derive(Error, Debug)]
pub enum StepError {
    /// The step's own closure returned an error.
    #[error("{0}")]
    User(#[source] anyhow::Error),

    /// The step panicked; the payload is captured as text where possible.
    #[error("panic: {0}")]
    Panic(String),

    /// A step-wrapper (validator-enforced deadline) timed out.
    #[error("timeout: step exceeded its deadline")]
    Timeout,
}

/// Errors raised by the [`crate::reporter::Reporter`].
#[derive(Error, Debug)]
pub enum ReporterError {
    /// `minSuccessRate` was outside `[0, 1]`.
    #[error("invalid thresholds: minSuccessRate must be within [0, 1], got {0}")]
    InvalidSuccessRate(f64),

    /// `maxFailedIterations` was negative (represented as a signed input
    /// at the API boundary so this can be reported cleanly).
    #[error("invalid thresholds: maxFailedIterations must be >= 0, got {0}")]
    InvalidMaxFailedIterations(i64),
}

/// Errors raised by the chaos context plane.
#[derive(Error, Debug)]
pub enum ChaosContextError {
    /// A registered provider panicked when invoked through `apply_chaos`.
    #[error("chaos provider '{0}' panicked")]
    ProviderPanic(String),
}
