//! Validator protocol: invariant checks plus optional event sinks and
//! step-wrapping.

use std::sync::Arc;

use async_trait::async_trait;

use crate::step::{IterationContext, Step};

/// Event sink a validator may implement to receive panic/recursion
/// events recorded by user code via [`crate::recorder::Recorder`].
pub trait EventSink: Send + Sync {
    /// A panic was captured somewhere in this iteration.
    fn record_panic(&self, _message: &str) {}

    /// A recursion-depth sample was recorded.
    fn record_recursion(&self, _depth: usize) {}
}

/// An invariant checker. May also record events and wrap step execution.
#[async_trait]
pub trait Validator<T: Send + Sync + 'static>: Send + Sync {
    /// Unique name within a scenario; embedded verbatim in the
    /// `"validator <name> failed: ..."` error text the reporter's
    /// classifier keys on.
    fn name(&self) -> &str;

    /// Check the invariant after all steps in an iteration have run
    /// (only called when every step succeeded).
    async fn validate(&self, ctx: Arc<IterationContext>, target: Arc<T>) -> anyhow::Result<()>;

    /// Reset any per-iteration state. Called at the start of every
    /// iteration, before step 1.
    fn reset(&self) {}

    /// Expose this validator as an event sink, if it records panic or
    /// recursion events. Defaults to "not a sink". Borrowed rather than
    /// `Arc<Self>`-based so the method stays callable through a `dyn
    /// Validator<T>` trait object; the executor wraps the owning `Arc`
    /// in a small adapter (see `executor.rs`) when it needs an owned,
    /// `'static` sink for the `Recorder`.
    fn as_event_sink(&self) -> Option<&dyn EventSink> {
        None
    }

    /// Wrap a step's execution, e.g. to enforce a deadline. The default
    /// is the identity wrapper (no change).
    fn wrap_step(&self, step: Step<T>) -> Step<T> {
        step
    }
}

/// A validator wrapping every step with a fixed deadline, surfacing
/// `StepError::Timeout` (classified by the reporter as `"timeout"`) if
/// the step outlasts it.
pub struct DeadlineValidator {
    name: String,
    deadline: std::time::Duration,
}

impl DeadlineValidator {
    /// Build a deadline validator with the given name and per-step
    /// allowance.
    pub fn new(name: impl Into<String>, deadline: std::time::Duration) -> Self {
        Self {
            name: name.into(),
            deadline,
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Validator<T> for DeadlineValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, _ctx: Arc<IterationContext>, _target: Arc<T>) -> anyhow::Result<()> {
        Ok(())
    }

    fn wrap_step(&self, step: Step<T>) -> Step<T> {
        let deadline = self.deadline;
        let inner = step.func();
        let name = step.name.clone();
        Step::from_raw(
            name,
            Arc::new(move |ctx, target| {
                let inner = inner.clone();
                let fut = (inner)(ctx, target);
                Box::pin(async move {
                    match tokio::time::timeout(deadline, fut).await {
                        Ok(result) => result,
                        Err(_) => Err(crate::error::StepError::Timeout),
                    }
                }) as crate::step::StepFuture
            }),
        )
    }
}
