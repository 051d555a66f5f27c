//! The orchestrator: composes `Scenario`, `ChaosContext`, `Recorder`,
//! `MetricsCollector`, and `Reporter` into iterated runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt as _;
use tracing::{debug, error, info, warn};

use crate::chaos_context::ChaosContext;
use crate::error::{ExecutorError, StepError};
use crate::injector::Injector;
use crate::metrics::MetricsCollector;
use crate::recorder::Recorder;
use crate::report::ExecutionResult;
use crate::reporter::Reporter;
use crate::scenario::{Scenario, Termination};
use crate::step::{IterationContext, Step};
use crate::target::Target;
use crate::validator::Validator;

/// How the executor reacts to the first failing iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop iterating as soon as one iteration fails.
    FailFast,
    /// Keep iterating; still report the first error encountered once the
    /// loop ends.
    ContinueOnFailure,
}

/// Minimum severity the embedder's `tracing_subscriber` should emit.
/// Mirrors `tracing::Level`, which does not itself implement
/// `serde::Deserialize` — this thin wrapper is what makes `LoggingConfig`
/// loadable from the same YAML/JSON config files as
/// [`crate::report::SuccessThresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Verbose diagnostic detail.
    Debug,
    /// Orchestrator-level lifecycle events (default).
    Info,
    /// Recoverable but noteworthy conditions.
    Warn,
    /// Errors, including contained panics.
    Error,
}

impl LogLevel {
    /// Convert to the `tracing::Level` the embedder's subscriber expects.
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Logging knobs the embedding binary may feed into its own
/// `tracing_subscriber` construction. This crate never installs a global
/// subscriber itself — it only emits `tracing` events.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum severity the embedder should emit.
    pub level: LogLevel,
    /// Whether the embedder's subscriber should use JSON-structured
    /// output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json: false,
        }
    }
}

/// Configuration accepted by [`Executor::new`].
#[derive(Clone)]
pub struct ExecutorConfig {
    /// See [`LoggingConfig`].
    pub logging: LoggingConfig,
    /// See [`FailurePolicy`].
    pub failure_policy: FailurePolicy,
    /// Supply an external metrics collector instead of a fresh one.
    pub metrics: Option<Arc<MetricsCollector>>,
    /// Supply an external reporter instead of a fresh one.
    pub reporter: Option<Arc<Reporter>>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            failure_policy: FailurePolicy::FailFast,
            metrics: None,
            reporter: None,
        }
    }
}

/// Runs [`Scenario`]s to completion, producing `ExecutionResult`s on its
/// metrics collector and reporter as it goes.
pub struct Executor<T: Target + 'static> {
    config: ExecutorConfig,
    metrics: Arc<MetricsCollector>,
    reporter: Arc<Reporter>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "chaos: injected panic".to_string()
    }
}

impl<T: Target + 'static> Executor<T> {
    /// Build an executor from the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        let metrics = config.metrics.clone().unwrap_or_default();
        let reporter = config.reporter.clone().unwrap_or_default();
        Self {
            config,
            metrics,
            reporter,
            _marker: std::marker::PhantomData,
        }
    }

    /// The metrics collector populated during `run`.
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// The reporter populated during `run`.
    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// Run a scenario to completion. `cancellation`, when supplied, ends
    /// the iteration loop at the next iteration boundary once set (spec
    /// B5); it never preempts an in-flight iteration.
    pub async fn run(
        &self,
        scenario: &Scenario<T>,
        cancellation: Option<crate::step::CancellationToken>,
    ) -> Result<(), ExecutorError> {
        let termination = match scenario.termination {
            Termination::Repeat(0) => Termination::Repeat(1),
            Termination::Duration(d) if d.is_zero() => Termination::Repeat(1),
            other => other,
        };

        info!(scenario = %scenario.name, "target setup");
        scenario
            .target
            .setup()
            .await
            .map_err(ExecutorError::Setup)?;

        let injectors = scenario.all_injectors();
        let mut started: Vec<Arc<dyn Injector>> = Vec::with_capacity(injectors.len());
        for injector in &injectors {
            info!(scenario = %scenario.name, injector = injector.name(), "starting injector");
            if let Some(network) = injector.as_network_lifecycle() {
                if let Err(source) = network.setup_network().await {
                    self.rollback(&started).await;
                    let _ = scenario.target.teardown().await;
                    return Err(ExecutorError::InjectorStart {
                        injector: injector.name().to_string(),
                        source,
                    });
                }
            }
            if let Err(source) = injector.inject().await {
                if let Some(network) = injector.as_network_lifecycle() {
                    if let Err(e) = network.teardown_network().await {
                        error!(scenario = %scenario.name, injector = injector.name(), error = %e, "network teardown failed after inject failure");
                    }
                }
                self.rollback(&started).await;
                let _ = scenario.target.teardown().await;
                return Err(ExecutorError::InjectorStart {
                    injector: injector.name().to_string(),
                    source,
                });
            }
            started.push(injector.clone());
        }

        let step_injectors: Vec<Arc<dyn Injector>> = injectors
            .iter()
            .filter(|i| i.as_step_injector().is_some())
            .cloned()
            .collect();

        let effective_steps: Vec<Step<T>> = scenario
            .steps
            .iter()
            .cloned()
            .map(|step| {
                scenario
                    .validators
                    .iter()
                    .fold(step, |step, validator| validator.wrap_step(step))
            })
            .collect();

        let mut first_error: Option<ExecutorError> = None;

        match termination {
            Termination::Repeat(n) => {
                for i in 0..n {
                    if cancellation.as_ref().is_some_and(|c| c.is_cancelled()) {
                        warn!(scenario = %scenario.name, iteration = i, "run cancelled before iteration");
                        break;
                    }
                    let (result, err) = self
                        .run_iteration(scenario, &effective_steps, &step_injectors, i)
                        .await;
                    self.metrics.record_execution(&result);
                    self.reporter.record(result);
                    if let Some(err) = err {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                        if self.config.failure_policy == FailurePolicy::FailFast {
                            break;
                        }
                    }
                }
            }
            Termination::Duration(duration) => {
                let deadline = Instant::now() + duration;
                let mut i = 0u64;
                loop {
                    if Instant::now() >= deadline {
                        break;
                    }
                    if cancellation.as_ref().is_some_and(|c| c.is_cancelled()) {
                        warn!(scenario = %scenario.name, iteration = i, "run cancelled before iteration");
                        break;
                    }
                    let (result, err) = self
                        .run_iteration(scenario, &effective_steps, &step_injectors, i)
                        .await;
                    self.metrics.record_execution(&result);
                    self.reporter.record(result);
                    if let Some(err) = err {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                        if self.config.failure_policy == FailurePolicy::FailFast {
                            break;
                        }
                    }
                    i += 1;
                    tokio::task::yield_now().await;
                }
            }
        }

        for injector in &started {
            if let Some(provider) = injector.as_metrics_provider() {
                self.metrics.record_injector_metrics(injector.name(), provider.get_metrics());
            }
        }

        let mut shutdown_error: Option<anyhow::Error> = None;
        for injector in started.iter().rev() {
            info!(scenario = %scenario.name, injector = injector.name(), "stopping injector");
            if let Err(e) = injector.stop().await {
                error!(scenario = %scenario.name, injector = injector.name(), error = %e, "injector stop failed");
                shutdown_error.get_or_insert(e);
            }
            if let Some(network) = injector.as_network_lifecycle() {
                if let Err(e) = network.teardown_network().await {
                    error!(scenario = %scenario.name, injector = injector.name(), error = %e, "network teardown failed");
                    shutdown_error.get_or_insert(e);
                }
            }
        }

        info!(scenario = %scenario.name, "target teardown");
        if let Err(e) = scenario.target.teardown().await {
            error!(scenario = %scenario.name, error = %e, "target teardown failed");
            shutdown_error.get_or_insert(e);
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if let Some(err) = shutdown_error {
            return Err(ExecutorError::Shutdown(err));
        }
        Ok(())
    }

    async fn rollback(&self, started: &[Arc<dyn Injector>]) {
        for injector in started.iter().rev() {
            if let Err(e) = injector.stop().await {
                error!(injector = injector.name(), error = %e, "rollback stop failed");
            }
            if let Some(network) = injector.as_network_lifecycle() {
                if let Err(e) = network.teardown_network().await {
                    error!(injector = injector.name(), error = %e, "rollback network teardown failed");
                }
            }
        }
    }

    async fn run_iteration(
        &self,
        scenario: &Scenario<T>,
        effective_steps: &[Step<T>],
        step_injectors: &[Arc<dyn Injector>],
        iteration: u64,
    ) -> (ExecutionResult, Option<ExecutorError>) {
        let start = Instant::now();
        let timestamp = chrono::Utc::now();

        let chaos = Arc::new(ChaosContext::empty());
        chaos.wire_from_injectors(&scenario.all_injectors());
        let recorder = Arc::new(Recorder::from_validators(&scenario.validators));
        for validator in &scenario.validators {
            validator.reset();
        }
        let rng = crate::rng::iteration_rng(scenario.seed, iteration);
        let ctx = Arc::new(IterationContext::new(chaos, recorder, rng, iteration));

        let mut iteration_error: Option<ExecutorError> = None;
        let mut steps_executed = 0u64;

        for step in effective_steps {
            for injector in step_injectors {
                if let Some(hook) = injector.as_step_injector() {
                    let outcome = std::panic::AssertUnwindSafe(hook.before_step(&step.name))
                        .catch_unwind()
                        .await;
                    if let Err(payload) = outcome {
                        let message = panic_message(&*payload);
                        ctx.record_panic(&message);
                        error!(scenario = %scenario.name, injector = injector.name(), "before_step panicked");
                    }
                }
            }

            let outcome = std::panic::AssertUnwindSafe(step.run(ctx.clone(), scenario.target.clone()))
                .catch_unwind()
                .await;
            steps_executed += 1;

            let step_error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => {
                    let message = panic_message(&*payload);
                    ctx.record_panic(&message);
                    Some(StepError::Panic(message))
                }
            };
            let error_text = step_error.as_ref().map(|e| e.to_string());

            for injector in step_injectors.iter().rev() {
                if let Some(hook) = injector.as_step_injector() {
                    let outcome = std::panic::AssertUnwindSafe(hook.after_step(&step.name, error_text.as_deref()))
                        .catch_unwind()
                        .await;
                    if let Err(payload) = outcome {
                        let message = panic_message(&*payload);
                        ctx.record_panic(&message);
                        error!(scenario = %scenario.name, injector = injector.name(), "after_step panicked");
                    }
                }
            }

            if let Some(source) = step_error {
                iteration_error = Some(ExecutorError::Step {
                    step: step.name.clone(),
                    source,
                });
                break;
            }
        }

        if iteration_error.is_none() {
            for validator in &scenario.validators {
                let outcome = std::panic::AssertUnwindSafe(validator.validate(ctx.clone(), scenario.target.clone()))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        if iteration_error.is_none() {
                            iteration_error = Some(ExecutorError::Validator {
                                validator: validator.name().to_string(),
                                detail: e.to_string(),
                            });
                        }
                    }
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        ctx.record_panic(&message);
                        if iteration_error.is_none() {
                            iteration_error = Some(ExecutorError::Validator {
                                validator: validator.name().to_string(),
                                detail: format!("panic: {message}"),
                            });
                        }
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = iteration_error.is_none();
        debug!(scenario = %scenario.name, iteration, success, duration_ms, "iteration finished");

        let result = ExecutionResult {
            scenario: scenario.name.clone(),
            iteration,
            success,
            steps_executed,
            duration_ms,
            timestamp,
            error: iteration_error.as_ref().map(|e| e.to_string()),
        };

        (result, iteration_error)
    }
}
