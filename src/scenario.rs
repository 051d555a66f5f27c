//! The immutable scenario description.

use std::sync::Arc;
use std::time::Duration;

use crate::injector::Injector;
use crate::step::Step;
use crate::target::Target;
use crate::validator::Validator;

/// How a scenario's iteration loop terminates.
#[derive(Debug, Clone, Copy)]
pub enum Termination {
    /// Run exactly this many iterations.
    Repeat(u64),
    /// Run iterations until this much wall-clock time has elapsed.
    Duration(Duration),
}

/// A named grouping of injectors. Purely a labeling device — scheduling
/// is identical to top-level injectors (spec §3, §4.7: scopes do not
/// nest).
pub struct Scope {
    /// Scope name, surfaced only in logs/reports.
    pub name: String,
    /// Injectors belonging to this scope.
    pub injectors: Vec<Arc<dyn Injector>>,
}

impl Scope {
    /// Build a named scope around a set of injectors.
    pub fn new(name: impl Into<String>, injectors: Vec<Arc<dyn Injector>>) -> Self {
        Self {
            name: name.into(),
            injectors,
        }
    }
}

/// Immutable description of what to run, produced by [`ScenarioBuilder::build`].
pub struct Scenario<T: Target + 'static> {
    /// Identity surfaced in reports.
    pub name: String,
    /// The system under test.
    pub target: Arc<T>,
    /// Steps executed, in order, once per iteration.
    pub steps: Vec<Step<T>>,
    /// Top-level injectors.
    pub injectors: Vec<Arc<dyn Injector>>,
    /// Named, grouped injectors — scheduled identically to top-level
    /// ones.
    pub scopes: Vec<Scope>,
    /// Invariant validators, run after a successful iteration.
    pub validators: Vec<Arc<dyn Validator<T>>>,
    /// How the iteration loop terminates.
    pub termination: Termination,
    /// If set, all per-iteration RNGs derive deterministically from this
    /// seed (spec §3, §9).
    pub seed: Option<i64>,
    /// Free-form labels, surfaced only in report metadata (spec §4.7).
    pub tags: Vec<String>,
}

impl<T: Target + 'static> Scenario<T> {
    /// Every injector this scenario owns, top-level first then each
    /// scope in declaration order — the order the executor starts them
    /// in.
    pub fn all_injectors(&self) -> Vec<Arc<dyn Injector>> {
        let mut all = self.injectors.clone();
        for scope in &self.scopes {
            all.extend(scope.injectors.iter().cloned());
        }
        all
    }
}

/// Pure, fluent constructor for [`Scenario`]. No coherence validation
/// beyond type shape — the executor performs preflight checks (spec
/// §4.1).
pub struct ScenarioBuilder<T: Target + 'static> {
    name: String,
    target: Option<Arc<T>>,
    steps: Vec<Step<T>>,
    injectors: Vec<Arc<dyn Injector>>,
    scopes: Vec<Scope>,
    validators: Vec<Arc<dyn Validator<T>>>,
    repeat: Option<u64>,
    duration: Option<Duration>,
    seed: Option<i64>,
    tags: Vec<String>,
}

impl<T: Target + 'static> ScenarioBuilder<T> {
    /// Start building a scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            steps: Vec::new(),
            injectors: Vec::new(),
            scopes: Vec::new(),
            validators: Vec::new(),
            repeat: None,
            duration: None,
            seed: None,
            tags: Vec::new(),
        }
    }

    /// Set the target.
    pub fn target(mut self, target: T) -> Self {
        self.target = Some(Arc::new(target));
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step<T>) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a top-level injector.
    pub fn injector(mut self, injector: Arc<dyn Injector>) -> Self {
        self.injectors.push(injector);
        self
    }

    /// Append a named scope of injectors.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Append a validator.
    pub fn validator(mut self, validator: Arc<dyn Validator<T>>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Run a fixed number of iterations.
    pub fn repeat(mut self, count: u64) -> Self {
        self.repeat = Some(count);
        self
    }

    /// Run iterations until this much wall-clock time has elapsed. When
    /// both `repeat` and `duration` are set on the same builder,
    /// `duration` wins regardless of call order (spec §3: "Exactly one
    /// of the two determines termination; if both set, duration wins"),
    /// resolved in [`Self::build`] rather than by last-writer-wins.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Seed all per-iteration RNGs deterministically.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Attach free-form labels.
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Finish building. Panics if no target was set — a scenario without
    /// a target cannot be run at all, so this is a programmer error
    /// rather than a runtime condition the executor should have to
    /// handle (the executor's own preflight, spec §4.2 step 1, still
    /// separately checks at `run` time since a `Scenario` can also be
    /// constructed by hand without the builder).
    pub fn build(self) -> Scenario<T> {
        let termination = match self.duration {
            Some(duration) => Termination::Duration(duration),
            None => Termination::Repeat(self.repeat.unwrap_or(1)),
        };
        Scenario {
            name: self.name,
            target: self.target.expect("ScenarioBuilder::build requires a target"),
            steps: self.steps,
            injectors: self.injectors,
            scopes: self.scopes,
            validators: self.validators,
            termination,
            seed: self.seed,
            tags: self.tags,
        }
    }
}
