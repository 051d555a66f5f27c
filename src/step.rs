//! Named units of work executed once per iteration, plus the
//! per-iteration context threaded through them.
//!
//! Rust has no implicit per-task value carrier equivalent to Go's
//! `context.Context`, and the design notes explicitly forbid globals for
//! this purpose ("never embed the RNG or provider maps in globals").
//! The faithful realization here (REDESIGN R1, see `SPEC_FULL.md`) is an
//! explicit, cheaply-`Arc`-cloned [`IterationContext`] passed by value
//! into every step, validator, and probe call — steps and targets are
//! themselves held behind `Arc` so a step's future can be `'static`
//! without borrowing across an `.await`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;

use crate::chaos_context::ChaosContext;
use crate::error::StepError;
use crate::recorder::Recorder;

/// A boxed, owned future — the shape every step and step-wrapper deals
/// in, since the things they wrap may run across `.await` points inside
/// a `tokio::spawn` or `tokio::time::timeout`.
pub type StepFuture = Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>>;

/// Everything one iteration's user-visible chaos plane consists of:
/// the chaos context, the recorder, and this iteration's deterministic
/// (or entropy-seeded) RNG.
pub struct IterationContext {
    /// The wired probe plane for this iteration.
    pub chaos: Arc<ChaosContext>,
    /// This iteration's event recorder.
    pub recorder: Arc<Recorder>,
    /// Zero-based iteration index.
    pub iteration: u64,
    rng: Mutex<StdRng>,
}

impl IterationContext {
    /// Build a fresh per-iteration context.
    pub fn new(chaos: Arc<ChaosContext>, recorder: Arc<Recorder>, rng: StdRng, iteration: u64) -> Self {
        Self {
            chaos,
            recorder,
            iteration,
            rng: Mutex::new(rng),
        }
    }

    /// `shouldFail(ctx, probability) -> bool`: a deterministic Bernoulli
    /// draw using this iteration's RNG. Not safe to call from multiple
    /// concurrent tasks within the same iteration and expect a
    /// particular interleaving — the draw itself is always correct and
    /// race-free, but ordering across concurrent callers is not part of
    /// the determinism guarantee (spec §5: "the RNG ... is NOT safe for
    /// parallel use by multiple probes").
    pub fn should_fail(&self, probability: f64) -> bool {
        let mut rng = self.rng.lock();
        crate::rng::bernoulli(&mut rng, probability)
    }

    /// `maybeDelay(ctx)`. Draws through this iteration's RNG, same as
    /// [`Self::should_fail`].
    pub async fn maybe_delay(&self) {
        let mut rng = self.rng.lock();
        self.chaos.maybe_delay(&mut rng).await;
    }

    /// `maybeError(ctx) -> error?`.
    pub fn maybe_error(&self) -> Option<anyhow::Error> {
        self.chaos.maybe_error()
    }

    /// `maybePanic(ctx)`. Draws through this iteration's RNG, same as
    /// [`Self::should_fail`].
    pub fn maybe_panic(&self) {
        let mut rng = self.rng.lock();
        self.chaos.maybe_panic(&mut rng);
    }

    /// `maybeNetworkChaos(ctx, host, port)`.
    pub async fn maybe_network_chaos(&self, host: &str, port: u16) -> bool {
        self.chaos.maybe_network_chaos(host, port).await
    }

    /// `maybeCancelContext(ctx) -> (childCtx, cancelFn)`, realized as a
    /// token: `is_cancelled()` reflects the wired cancellation provider
    /// (or `false` if none is wired); `cancel()` lets the caller force
    /// it regardless, matching "a possibly-cancelled child" plus an
    /// always-available (possibly no-op) cancel function.
    pub fn maybe_cancel_context(&self) -> CancellationToken {
        CancellationToken::with_state(self.chaos.should_cancel())
    }

    /// `applyChaos(ctx, providerName) -> bool`.
    pub async fn apply_chaos(&self, provider_name: &str) -> Result<bool, crate::error::ChaosContextError> {
        self.chaos.apply_chaos(provider_name).await
    }

    /// Record a panic surfaced from user code.
    pub fn record_panic(&self, message: &str) {
        self.recorder.record_panic(message);
    }

    /// Record a recursion-depth sample.
    pub fn record_recursion_depth(&self, depth: usize) {
        self.recorder.record_recursion_depth(depth);
    }
}

/// A possibly-cancelled child context handle returned by
/// `maybe_cancel_context`, and also the handle an embedder passes into
/// [`crate::executor::Executor::run`] to request cancellation of the
/// iteration loop (spec §5: cancelling the caller's context ends the
/// loop at the next iteration boundary).
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    /// Build a fresh, not-yet-cancelled token. Call [`Self::cancel`] from
    /// wherever the run should be stopped.
    pub fn new() -> Self {
        Self::with_state(false)
    }

    fn with_state(initially_cancelled: bool) -> Self {
        Self {
            cancelled: Arc::new(std::sync::atomic::AtomicBool::new(initially_cancelled)),
        }
    }

    /// Whether this child context is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Cancel it.
    pub fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A named unit of work inside an iteration: `(name, fn(ctx, target) ->
/// error?)`.
pub struct Step<T> {
    /// Step name, used in error text and step-wrapper/injector hooks.
    pub name: String,
    func: Arc<dyn Fn(Arc<IterationContext>, Arc<T>) -> StepFuture + Send + Sync>,
}

impl<T: Send + Sync + 'static> Step<T> {
    /// Build a step from an async closure over `(Arc<IterationContext>,
    /// Arc<T>)`.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<IterationContext>, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let func = Arc::new(move |ctx: Arc<IterationContext>, target: Arc<T>| {
            let fut = f(ctx, target);
            Box::pin(async move { fut.await.map_err(StepError::User) }) as StepFuture
        });
        Self {
            name: name.into(),
            func,
        }
    }

    /// Build a step directly from a function already returning a boxed,
    /// classified [`StepFuture`] — the primitive step-wrappers use this
    /// to splice in extra behavior (deadlines, retries) around an inner
    /// step without re-wrapping the user's original closure type.
    pub fn from_raw(
        name: impl Into<String>,
        func: Arc<dyn Fn(Arc<IterationContext>, Arc<T>) -> StepFuture + Send + Sync>,
    ) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Run the step.
    pub async fn run(&self, ctx: Arc<IterationContext>, target: Arc<T>) -> Result<(), StepError> {
        (self.func)(ctx, target).await
    }

    /// The underlying callable, for composing step-wrappers.
    pub fn func(&self) -> Arc<dyn Fn(Arc<IterationContext>, Arc<T>) -> StepFuture + Send + Sync> {
        self.func.clone()
    }
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: self.func.clone(),
        }
    }
}
