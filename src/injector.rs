//! Injector protocol: lifecycle plus typed capability tags.
//!
//! An injector's optional behaviors are each their own trait rather than
//! flags on one giant struct (design note §9: "represent each capability
//! as its own abstract interface rather than flags on a giant struct,
//! and never downcast inside hot paths"). The executor detects a
//! capability by calling the corresponding `as_*` accessor once per
//! iteration and caching the `Option<&dyn Capability>` it gets back,
//! rather than re-checking on every probe call.

use async_trait::async_trait;
use std::time::Duration;

use rand::rngs::StdRng;

use crate::chaos_context::{CancellationProvider, DelayProvider, ErrorProvider, NetworkProvider};

/// Where an injector's effects originate, informing the executor of
/// where to look for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectorKind {
    /// Effects come from outside the process (network proxies, OS-level
    /// pressure) — the executor does nothing beyond lifecycle calls.
    Global,
    /// Effects are delivered through the [`crate::chaos_context::ChaosContext`]
    /// plane (delay/panic/network/cancellation providers).
    ContextPlane,
    /// Effects are delivered by wrapping step execution
    /// (`before_step`/`after_step`).
    StepWrap,
    /// A mix of the above.
    Hybrid,
}

/// Before/after hooks for step-wrapping injectors.
#[async_trait]
pub trait StepInjector: Send + Sync {
    /// Invoked before a step runs, in declaration order.
    async fn before_step(&self, step_name: &str) {
        let _ = step_name;
    }

    /// Invoked after a step runs (regardless of its outcome), in reverse
    /// declaration order.
    async fn after_step(&self, step_name: &str, err: Option<&str>) {
        let _ = (step_name, err);
    }
}

/// Separate start/stop pair for injectors whose network setup is
/// logically distinct from their chaos-plane `inject`/`stop`.
#[async_trait]
pub trait NetworkLifecycle: Send + Sync {
    /// Called before `inject`.
    async fn setup_network(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after `stop`.
    async fn teardown_network(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Exposes a metrics snapshot for the [`crate::metrics::MetricsCollector`]
/// to fold in under this injector's name.
pub trait MetricsProvider: Send + Sync {
    /// Current metrics snapshot, keyed by metric name.
    fn get_metrics(&self) -> std::collections::HashMap<String, f64>;
}

/// A fault source. Required capability is lifecycle (`name`/`inject`/
/// `stop`); everything else is optional and detected via the `as_*`
/// accessors, each defaulting to "not supported".
#[async_trait]
pub trait Injector: Send + Sync {
    /// Unique name within a scenario.
    fn name(&self) -> &str;

    /// Idempotent start.
    async fn inject(&self) -> anyhow::Result<()>;

    /// Idempotent stop; safe to call even if `inject` failed or was
    /// never called.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Where this injector's effects come from. Purely informational —
    /// the executor still calls every `as_*` accessor to discover actual
    /// capabilities.
    fn kind(&self) -> InjectorKind {
        InjectorKind::Global
    }

    /// Expose a delay-drawing capability, if supported.
    fn as_delay_provider(&self) -> Option<&dyn DelayProvider> {
        None
    }

    /// Expose an error-yielding capability, if supported.
    fn as_error_provider(&self) -> Option<&dyn ErrorProvider> {
        None
    }

    /// Expose a panic-triggering capability, if supported.
    fn as_panic_provider(&self) -> Option<&dyn crate::chaos_context::PanicProvider> {
        None
    }

    /// Expose a network-chaos capability, if supported.
    fn as_network_provider(&self) -> Option<&dyn NetworkProvider> {
        None
    }

    /// Expose a cancellation-deriving capability, if supported.
    fn as_cancellation_provider(&self) -> Option<&dyn CancellationProvider> {
        None
    }

    /// Expose step-wrap hooks, if supported.
    fn as_step_injector(&self) -> Option<&dyn StepInjector> {
        None
    }

    /// Expose separate network setup/teardown, if supported.
    fn as_network_lifecycle(&self) -> Option<&dyn NetworkLifecycle> {
        None
    }

    /// Expose a metrics snapshot, if supported.
    fn as_metrics_provider(&self) -> Option<&dyn MetricsProvider> {
        None
    }
}

/// A fixed-probability, fixed-duration delay provider — a minimal
/// reference implementation used by the crate's own tests and suitable
/// as a starting point for real injectors.
pub struct FixedDelay {
    duration: Duration,
    probability: f64,
}

impl FixedDelay {
    /// Build a delay provider that delays by `duration` with probability
    /// `probability` on every draw.
    pub fn new(duration: Duration, probability: f64) -> Self {
        Self { duration, probability }
    }
}

#[async_trait]
impl DelayProvider for FixedDelay {
    async fn draw_delay(&self, rng: &mut StdRng) -> Option<Duration> {
        use rand::Rng;
        if rng.random::<f64>() < self.probability {
            Some(self.duration)
        } else {
            None
        }
    }
}
