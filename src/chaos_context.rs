//! The context-attached chaos plane.
//!
//! `ChaosContext` is the in-band channel by which injectors influence
//! user code that opts in via small probe calls. It is built fresh once
//! per iteration by the executor (`executor.rs`) from whichever
//! injectors advertise a relevant capability, then handed to user code
//! through [`crate::step::IterationContext`].
//!
//! Concurrency rule (spec §4.4, §5): every probe reads the hook under a
//! short read lock, releases the lock, and only then invokes the hook.
//! This is the same "snapshot under lock, act outside it" shape the
//! teacher crate uses for its `RwLock`-guarded state (e.g.
//! `FaultInjector::check_pattern`), generalized here to arbitrary
//! function-valued hooks so that a hook which itself wants to sleep or
//! mutate provider state can never deadlock against the lock that
//! handed it out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::rngs::StdRng;

use crate::error::ChaosContextError;

/// A generic chaos-plane citizen, dispatchable by name via
/// [`ChaosContext::apply`] / the `apply_chaos` probe.
#[async_trait]
pub trait ChaosProvider: Send + Sync {
    /// Unique name within a scenario's provider set.
    fn name(&self) -> &str;

    /// Apply whatever effect this provider represents. Returns whether
    /// the effect was actually applied.
    async fn apply(&self) -> bool;
}

/// A delay-drawing capability, wired to the `maybe_delay` probe.
///
/// Takes the iteration RNG so a drawn delay is a pure function of
/// `(seed, iteration)` under a fixed seed (spec §9), the same way
/// [`should_fail`] consumes it rather than reaching for OS entropy.
#[async_trait]
pub trait DelayProvider: Send + Sync {
    /// Draw a delay and whether it is currently active. `None` duration
    /// means "no delay this call".
    async fn draw_delay(&self, rng: &mut StdRng) -> Option<std::time::Duration>;
}

/// A panic-triggering capability, wired to the `maybe_panic` probe.
///
/// Takes the iteration RNG for the same determinism reason as
/// [`DelayProvider::draw_delay`].
pub trait PanicProvider: Send + Sync {
    /// Whether this call should panic.
    fn should_panic(&self, rng: &mut StdRng) -> bool;

    /// Configured panic probability, for introspection/reporting.
    fn probability(&self) -> f64;
}

/// An error-yielding capability, wired to the `maybe_error` probe.
pub trait ErrorProvider: Send + Sync {
    /// Produce an error for this call, or `None`.
    fn maybe_error(&self) -> Option<anyhow::Error>;
}

/// A network-chaos capability, wired to the `maybe_network_chaos` probe.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Decide (and apply, provider-side) network chaos for `(host, port)`.
    async fn decide(&self, host: &str, port: u16) -> bool;
}

/// A cancellation-deriving capability, wired to `maybe_cancel_context`.
pub trait CancellationProvider: Send + Sync {
    /// Whether the child context this call would derive should already
    /// be cancelled.
    fn should_cancel(&self) -> bool;
}

type DelayHook = Arc<dyn DelayProvider>;
type PanicHook = Arc<dyn PanicProvider>;
type ErrorHook = Arc<dyn ErrorProvider>;
type NetworkHook = Arc<dyn NetworkProvider>;
type CancellationHook = Arc<dyn CancellationProvider>;

/// One per iteration. Registers whichever hooks that iteration's
/// injectors advertise, and fans generic `apply_chaos` calls out to
/// named providers.
#[derive(Default)]
pub struct ChaosContext {
    delay: RwLock<Option<DelayHook>>,
    panic: RwLock<Option<PanicHook>>,
    error: RwLock<Option<ErrorHook>>,
    network: RwLock<Option<NetworkHook>>,
    cancellation: RwLock<Option<CancellationHook>>,
    providers: RwLock<HashMap<String, Arc<dyn ChaosProvider>>>,
}

impl ChaosContext {
    /// An empty chaos context: every probe is a no-op.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wire the delay hook. Last registration wins if multiple injectors
    /// advertise the capability.
    pub fn set_delay_provider(&self, hook: DelayHook) {
        *self.delay.write() = Some(hook);
    }

    /// Wire the panic hook.
    pub fn set_panic_provider(&self, hook: PanicHook) {
        *self.panic.write() = Some(hook);
    }

    /// Wire the error hook.
    pub fn set_error_provider(&self, hook: ErrorHook) {
        *self.error.write() = Some(hook);
    }

    /// Wire the network hook.
    pub fn set_network_provider(&self, hook: NetworkHook) {
        *self.network.write() = Some(hook);
    }

    /// Wire the cancellation hook.
    pub fn set_cancellation_provider(&self, hook: CancellationHook) {
        *self.cancellation.write() = Some(hook);
    }

    /// Register a named generic provider for `apply_chaos` dispatch.
    pub fn register_provider(&self, provider: Arc<dyn ChaosProvider>) {
        self.providers.write().insert(provider.name().to_string(), provider);
    }

    /// Wire every hook advertised by the given injectors. Last injector
    /// to advertise a given capability wins (spec §4.3c). Each hook is a
    /// thin, uncached trampoline back onto the injector's own capability
    /// accessor — it re-checks the injector on every call rather than
    /// snapshotting provider state, matching "never cached across
    /// calls".
    pub fn wire_from_injectors(&self, injectors: &[Arc<dyn crate::injector::Injector>]) {
        for injector in injectors {
            if injector.as_delay_provider().is_some() {
                self.set_delay_provider(Arc::new(InjectorDelayHook(injector.clone())));
            }
            if injector.as_panic_provider().is_some() {
                self.set_panic_provider(Arc::new(InjectorPanicHook(injector.clone())));
            }
            if injector.as_error_provider().is_some() {
                self.set_error_provider(Arc::new(InjectorErrorHook(injector.clone())));
            }
            if injector.as_network_provider().is_some() {
                self.set_network_provider(Arc::new(InjectorNetworkHook(injector.clone())));
            }
            if injector.as_cancellation_provider().is_some() {
                self.set_cancellation_provider(Arc::new(InjectorCancellationHook(injector.clone())));
            }
        }
    }

    /// `maybeDelay`: invoke the wired delay hook, if any, and sleep for
    /// whatever duration it draws. `rng` is this iteration's RNG, so the
    /// draw is reproducible under a fixed seed.
    pub async fn maybe_delay(&self, rng: &mut StdRng) {
        let hook = self.delay.read().clone();
        if let Some(hook) = hook {
            if let Some(duration) = hook.draw_delay(rng).await {
                tokio::time::sleep(duration).await;
            }
        }
    }

    /// `maybeError`: return whatever the wired error hook yields.
    pub fn maybe_error(&self) -> Option<anyhow::Error> {
        let hook = self.error.read().clone();
        hook.and_then(|h| h.maybe_error())
    }

    /// `maybePanic`: panic with a tagged message if the wired hook says
    /// so. `rng` is this iteration's RNG, for the same reason as
    /// [`Self::maybe_delay`].
    pub fn maybe_panic(&self, rng: &mut StdRng) {
        let hook = self.panic.read().clone();
        if let Some(hook) = hook {
            if hook.should_panic(rng) {
                panic!("chaos: injected panic");
            }
        }
    }

    /// `maybeNetworkChaos`: ask the wired network hook to decide for
    /// `(host, port)`.
    pub async fn maybe_network_chaos(&self, host: &str, port: u16) -> bool {
        let hook = self.network.read().clone();
        match hook {
            Some(hook) => hook.decide(host, port).await,
            None => false,
        }
    }

    /// `maybeCancelContext`: report whether the wired cancellation hook
    /// says this call's child context should already be cancelled.
    pub fn should_cancel(&self) -> bool {
        let hook = self.cancellation.read().clone();
        hook.map(|h| h.should_cancel()).unwrap_or(false)
    }

    /// `applyChaos`: generic dispatch by provider name. Guards against a
    /// misbehaving provider panicking inside `apply` (providers run
    /// inside user-adjacent injector code, same panic-containment rule
    /// as injector hooks in general, per spec §4.3).
    pub async fn apply_chaos(&self, provider_name: &str) -> Result<bool, ChaosContextError> {
        let provider = self.providers.read().get(provider_name).cloned();
        match provider {
            Some(provider) => {
                let name = provider.name().to_string();
                std::panic::AssertUnwindSafe(provider.apply())
                    .catch_unwind()
                    .await
                    .map_err(|_| ChaosContextError::ProviderPanic(name))
            }
            None => Ok(false),
        }
    }
}

struct InjectorDelayHook(Arc<dyn crate::injector::Injector>);

#[async_trait]
impl DelayProvider for InjectorDelayHook {
    async fn draw_delay(&self, rng: &mut StdRng) -> Option<std::time::Duration> {
        match self.0.as_delay_provider() {
            Some(provider) => provider.draw_delay(rng).await,
            None => None,
        }
    }
}

struct InjectorPanicHook(Arc<dyn crate::injector::Injector>);

impl PanicProvider for InjectorPanicHook {
    fn should_panic(&self, rng: &mut StdRng) -> bool {
        self.0.as_panic_provider().is_some_and(|p| p.should_panic(rng))
    }

    fn probability(&self) -> f64 {
        self.0.as_panic_provider().map(|p| p.probability()).unwrap_or(0.0)
    }
}

struct InjectorErrorHook(Arc<dyn crate::injector::Injector>);

impl ErrorProvider for InjectorErrorHook {
    fn maybe_error(&self) -> Option<anyhow::Error> {
        self.0.as_error_provider().and_then(|p| p.maybe_error())
    }
}

struct InjectorNetworkHook(Arc<dyn crate::injector::Injector>);

#[async_trait]
impl NetworkProvider for InjectorNetworkHook {
    async fn decide(&self, host: &str, port: u16) -> bool {
        match self.0.as_network_provider() {
            Some(provider) => provider.decide(host, port).await,
            None => false,
        }
    }
}

struct InjectorCancellationHook(Arc<dyn crate::injector::Injector>);

impl CancellationProvider for InjectorCancellationHook {
    fn should_cancel(&self) -> bool {
        self.0.as_cancellation_provider().is_some_and(|p| p.should_cancel())
    }
}

use futures::FutureExt as _;

/// Deterministic Bernoulli draw for the `shouldFail` probe, consuming
/// the iteration RNG rather than this context (the RNG is not a
/// `ChaosContext` hook — it lives on `IterationContext` directly per
/// spec §9's "all user-visible randomness ... from context").
pub fn should_fail(rng: &mut StdRng, probability: f64) -> bool {
    crate::rng::bernoulli(rng, probability)
}
