//! `chaoskit-core` — the scenario execution engine at the heart of a
//! chaos-engineering harness.
//!
//! This crate owns three coupled subsystems: the [`executor`] (lifecycle
//! management — target setup/teardown, injector start/stop, iterated
//! step execution), the context-attached chaos plane
//! ([`chaos_context`] plus the probes exposed through [`step::IterationContext`]),
//! and the verdict engine ([`reporter`] reducing [`report::ExecutionResult`]s
//! into a severity-classified [`report::Report`]).
//!
//! Concrete injectors, validators, and targets are supplied by the
//! embedder; this crate only specifies and drives the interfaces
//! ([`injector::Injector`], [`validator::Validator`], [`target::Target`]).

mod chaos_context;
mod error;
mod executor;
mod injector;
mod metrics;
mod recorder;
mod render;
mod report;
mod reporter;
mod rng;
mod scenario;
mod step;
mod target;
mod validator;

pub use chaos_context::{
    CancellationProvider, ChaosContext, ChaosProvider, DelayProvider, ErrorProvider,
    NetworkProvider, PanicProvider,
};
pub use error::{ChaosContextError, ExecutorError, ReporterError, StepError};
pub use executor::{Executor, ExecutorConfig, FailurePolicy, LogLevel, LoggingConfig};
pub use injector::{FixedDelay, Injector, InjectorKind, MetricsProvider, NetworkLifecycle, StepInjector};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use recorder::Recorder;
pub use render::{render_json, render_junit, render_text};
pub use report::{
    ErrorPattern, ExecutionResult, FailureAnalysis, FailureRateWindow, Report, Severity,
    SuccessThresholds, ThresholdsSnapshot, Verdict,
};
pub use reporter::Reporter;
pub use scenario::{Scenario, ScenarioBuilder, Scope, Termination};
pub use step::{CancellationToken, IterationContext, Step, StepFuture};
pub use target::Target;
pub use validator::{DeadlineValidator, EventSink, Validator};
