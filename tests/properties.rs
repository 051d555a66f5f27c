//! End-to-end property and scenario tests exercising the full
//! `Executor::run` -> `Reporter::get_verdict` pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use chaoskit_core::{
    render_junit, CancellationToken, DeadlineValidator, Executor, ExecutorConfig, ExecutorError,
    FailurePolicy, Injector, InjectorKind, IterationContext, NetworkLifecycle, Scenario,
    ScenarioBuilder, Scope, Step, StepInjector, SuccessThresholds, Target, Validator, Verdict,
};

struct NoopTarget;

#[async_trait]
impl Target for NoopTarget {
    fn name(&self) -> &str {
        "noop"
    }
}

fn always_ok_step() -> Step<NoopTarget> {
    Step::new("noop", |_ctx, _target| async { Ok(()) })
}

// P1 — exactly N ExecutionResults for repeat = N.
#[tokio::test]
async fn p1_repeat_n_yields_n_results() {
    let scenario = ScenarioBuilder::new("p1")
        .target(NoopTarget)
        .step(always_ok_step())
        .repeat(25)
        .build();

    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");

    assert_eq!(executor.metrics().stats().total_executions, 25);
    let report = executor
        .reporter()
        .get_verdict(&SuccessThresholds::default())
        .expect("valid thresholds");
    assert_eq!(report.total_executions, 25);
}

// P2 — teardown invoked iff setup succeeded, exactly once.
struct LifecycleTarget {
    setup_calls: Arc<AtomicUsize>,
    teardown_calls: Arc<AtomicUsize>,
    fail_setup: bool,
}

#[async_trait]
impl Target for LifecycleTarget {
    fn name(&self) -> &str {
        "lifecycle"
    }
    async fn setup(&self) -> anyhow::Result<()> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_setup {
            anyhow::bail!("setup refused")
        } else {
            Ok(())
        }
    }
    async fn teardown(&self) -> anyhow::Result<()> {
        self.teardown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn p2_teardown_runs_exactly_once_iff_setup_succeeded() {
    let teardown_calls = Arc::new(AtomicUsize::new(0));
    let scenario = ScenarioBuilder::new("p2-ok")
        .target(LifecycleTarget {
            setup_calls: Arc::new(AtomicUsize::new(0)),
            teardown_calls: teardown_calls.clone(),
            fail_setup: false,
        })
        .step(Step::new("noop", |_ctx, _t: Arc<LifecycleTarget>| async { Ok(()) }))
        .repeat(1)
        .build();
    let executor: Executor<LifecycleTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");
    assert_eq!(teardown_calls.load(Ordering::SeqCst), 1);

    let teardown_calls_failing = Arc::new(AtomicUsize::new(0));
    let failing_scenario = ScenarioBuilder::new("p2-fail")
        .target(LifecycleTarget {
            setup_calls: Arc::new(AtomicUsize::new(0)),
            teardown_calls: teardown_calls_failing.clone(),
            fail_setup: true,
        })
        .step(Step::new("noop", |_ctx, _t: Arc<LifecycleTarget>| async { Ok(()) }))
        .repeat(1)
        .build();
    let executor: Executor<LifecycleTarget> = Executor::new(ExecutorConfig::default());
    let result = executor.run(&failing_scenario, None).await;
    assert!(matches!(result, Err(ExecutorError::Setup(_))));
    assert_eq!(teardown_calls_failing.load(Ordering::SeqCst), 0);
}

// P3 — every started injector is stopped exactly once, in reverse order.
struct OrderedInjector {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Injector for OrderedInjector {
    fn name(&self) -> &str {
        self.name
    }
    async fn inject(&self) -> anyhow::Result<()> {
        self.log.lock().push(self.name);
        Ok(())
    }
    async fn stop(&self) -> anyhow::Result<()> {
        self.log.lock().push(self.name);
        Ok(())
    }
}

#[tokio::test]
async fn p3_injectors_stop_in_reverse_start_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scenario = ScenarioBuilder::new("p3")
        .target(NoopTarget)
        .step(always_ok_step())
        .injector(Arc::new(OrderedInjector { name: "a", log: log.clone() }))
        .injector(Arc::new(OrderedInjector { name: "b", log: log.clone() }))
        .repeat(1)
        .build();

    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");

    assert_eq!(*log.lock(), vec!["a", "b", "b", "a"]);
}

// P4 / S5 — deterministic replay of shouldFail under a fixed seed.
#[tokio::test]
async fn p4_s5_deterministic_replay_under_shared_seed() {
    async fn collect_outcomes() -> Vec<bool> {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let outcomes_clone = outcomes.clone();
        let step: Step<NoopTarget> = Step::new("draw", move |ctx: Arc<IterationContext>, _target| {
            let outcomes = outcomes_clone.clone();
            async move {
                outcomes.lock().push(ctx.should_fail(0.2));
                Ok(())
            }
        });
        let scenario = ScenarioBuilder::new("p4")
            .target(NoopTarget)
            .step(step)
            .repeat(10)
            .seed(42)
            .build();
        let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
        executor.run(&scenario, None).await.expect("run succeeds");
        Arc::try_unwrap(outcomes).expect("sole owner").into_inner()
    }

    let first = collect_outcomes().await;
    let second = collect_outcomes().await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 10);
}

// P5 — a panic anywhere in the hot path never escapes `run`.
#[tokio::test]
async fn p5_panicking_step_is_contained() {
    let step: Step<NoopTarget> = Step::new("boom", |_ctx, _target| async { panic!("chaos: injected panic") });
    let scenario = ScenarioBuilder::new("p5").target(NoopTarget).step(step).repeat(1).build();
    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    let result = executor.run(&scenario, None).await;
    assert!(matches!(result, Err(ExecutorError::Step { .. })));
}

// P6 — verdict monotonicity: a critical failure never improves the verdict.
#[tokio::test]
async fn p6_critical_failure_forces_fail_regardless_of_success_rate() {
    struct FailingValidator;
    #[async_trait]
    impl Validator<NoopTarget> for FailingValidator {
        fn name(&self) -> &str {
            "goroutine_limit_100"
        }
        async fn validate(&self, _ctx: Arc<IterationContext>, _target: Arc<NoopTarget>) -> anyhow::Result<()> {
            anyhow::bail!("exceeded limit")
        }
    }

    let scenario = ScenarioBuilder::new("p6")
        .target(NoopTarget)
        .step(always_ok_step())
        .validator(Arc::new(FailingValidator))
        .repeat(100)
        .build();

    let config = ExecutorConfig {
        failure_policy: FailurePolicy::ContinueOnFailure,
        ..Default::default()
    };
    let executor: Executor<NoopTarget> = Executor::new(config);
    let _ = executor.run(&scenario, None).await;

    let thresholds = SuccessThresholds {
        min_success_rate: 0.0,
        require_all_validators_passing: false,
        critical_validators: vec!["goroutine-limit".to_string()],
        ..Default::default()
    };
    let report = executor.reporter().get_verdict(&thresholds).expect("valid thresholds");
    assert_eq!(report.verdict, Verdict::Fail);
}

// P7 — rendering a Report to JUnit XML and scanning it back yields the
// same test-case names, the same failure/error counts, and the same
// overall verdict classification as the source Report.
#[tokio::test]
async fn p7_junit_rendering_round_trips_test_case_names_and_counts() {
    struct CriticalOnce;
    #[async_trait]
    impl Validator<NoopTarget> for CriticalOnce {
        fn name(&self) -> &str {
            "goroutine_limit_7"
        }
        async fn validate(&self, _ctx: Arc<IterationContext>, _target: Arc<NoopTarget>) -> anyhow::Result<()> {
            anyhow::bail!("exceeded limit")
        }
    }

    let scenario = ScenarioBuilder::new("p7")
        .target(NoopTarget)
        .step(always_ok_step())
        .validator(Arc::new(CriticalOnce))
        .repeat(3)
        .build();

    let config = ExecutorConfig {
        failure_policy: FailurePolicy::ContinueOnFailure,
        ..Default::default()
    };
    let executor: Executor<NoopTarget> = Executor::new(config);
    let _ = executor.run(&scenario, None).await;

    let thresholds = SuccessThresholds {
        min_success_rate: 0.0,
        require_all_validators_passing: false,
        critical_validators: vec!["goroutine-limit".to_string()],
        ..Default::default()
    };
    let report = executor.reporter().get_verdict(&thresholds).expect("valid thresholds");
    assert_eq!(report.verdict, Verdict::Fail);

    let xml = render_junit(&report, "2026-01-01T00:00:00Z");

    // Scan the rendered XML back: one testcase per categorized failure
    // plus the synthetic verdict case, matching what the Report carries.
    let testcase_count = xml.matches("<testcase ").count();
    let critical = report.categorized_failures.get(&chaoskit_core::Severity::Critical);
    let expected_cases = 1 + critical.map_or(0, Vec::len);
    assert_eq!(testcase_count, expected_cases);

    assert!(xml.contains("name=\"chaos-test-verdict\""));
    assert!(xml.contains("name=\"goroutine-limit\""));

    // FAIL verdict means the verdict testcase carries <failure>, and
    // failures/errors attributes match what was actually rendered.
    let rendered_failures = xml.matches("<failure ").count();
    let rendered_errors = xml.matches("<error ").count();
    assert!(xml.contains(&format!("failures=\"{rendered_failures}\"")));
    assert!(xml.contains(&format!("errors=\"{rendered_errors}\"")));
    assert!(rendered_errors == 0, "an all-critical FAIL run should not emit <error> test cases");
}

// P8 — idempotence of get_verdict on an unchanged reporter.
#[tokio::test]
async fn p8_get_verdict_is_idempotent() {
    let scenario = ScenarioBuilder::new("p8").target(NoopTarget).step(always_ok_step()).repeat(5).build();
    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");

    let thresholds = SuccessThresholds::default();
    let first = executor.reporter().get_verdict(&thresholds).expect("valid thresholds");
    let second = executor.reporter().get_verdict(&thresholds).expect("valid thresholds");
    assert_eq!(first.verdict, second.verdict);
    assert_eq!(first.total_executions, second.total_executions);
    assert_eq!(first.success_rate, second.success_rate);
}

// B1 — repeat = 0 and duration = 0 is treated as repeat = 1.
#[tokio::test]
async fn b1_zero_repeat_and_zero_duration_runs_once() {
    let scenario = Scenario {
        name: "b1".to_string(),
        target: Arc::new(NoopTarget),
        steps: vec![always_ok_step()],
        injectors: Vec::new(),
        scopes: Vec::new(),
        validators: Vec::new(),
        termination: chaoskit_core::Termination::Repeat(0),
        seed: None,
        tags: Vec::new(),
    };
    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");
    assert_eq!(executor.metrics().stats().total_executions, 1);
}

// B4 — empty step list with duration > 0 still produces iterations.
#[tokio::test]
async fn b4_empty_steps_with_duration_runs_iterations() {
    let scenario = ScenarioBuilder::new("b4")
        .target(NoopTarget)
        .duration(Duration::from_millis(50))
        .build();
    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");
    assert!(executor.metrics().stats().total_executions > 0);
}

// B5 — cancelling mid-run stops further iterations at the next boundary.
#[tokio::test]
async fn b5_cancellation_stops_further_iterations() {
    let scenario = ScenarioBuilder::new("b5")
        .target(NoopTarget)
        .step(always_ok_step())
        .duration(Duration::from_secs(5))
        .build();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, Some(cancel)).await.expect("run succeeds");
    assert_eq!(executor.metrics().stats().total_executions, 0);
}

// S2 — a single critical validator failure fails the run.
#[tokio::test]
async fn s2_single_critical_failure_fails_the_run() {
    struct OccasionallyFails(Arc<AtomicUsize>);
    #[async_trait]
    impl Validator<NoopTarget> for OccasionallyFails {
        fn name(&self) -> &str {
            "goroutine_limit_100"
        }
        async fn validate(&self, _ctx: Arc<IterationContext>, _target: Arc<NoopTarget>) -> anyhow::Result<()> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 50 {
                anyhow::bail!("exceeded limit")
            } else {
                Ok(())
            }
        }
    }

    let scenario = ScenarioBuilder::new("s2")
        .target(NoopTarget)
        .step(always_ok_step())
        .validator(Arc::new(OccasionallyFails(Arc::new(AtomicUsize::new(0)))))
        .repeat(100)
        .build();

    let config = ExecutorConfig {
        failure_policy: FailurePolicy::ContinueOnFailure,
        ..Default::default()
    };
    let executor: Executor<NoopTarget> = Executor::new(config);
    let _ = executor.run(&scenario, None).await;

    let thresholds = SuccessThresholds {
        critical_validators: vec!["goroutine-limit".to_string()],
        ..Default::default()
    };
    let report = executor.reporter().get_verdict(&thresholds).expect("valid thresholds");
    assert_eq!(report.verdict, Verdict::Fail);
    assert!((report.success_rate - 0.99).abs() < 1e-9);
}

// S4 — a warning-only validator downgrades the verdict to UNSTABLE.
#[tokio::test]
async fn s4_warning_only_yields_unstable_with_zero_exit_code() {
    struct SlowOnce(Arc<AtomicUsize>);
    #[async_trait]
    impl Validator<NoopTarget> for SlowOnce {
        fn name(&self) -> &str {
            "execution_time_100"
        }
        async fn validate(&self, _ctx: Arc<IterationContext>, _target: Arc<NoopTarget>) -> anyhow::Result<()> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("too slow")
            } else {
                Ok(())
            }
        }
    }

    let scenario = ScenarioBuilder::new("s4")
        .target(NoopTarget)
        .step(always_ok_step())
        .validator(Arc::new(SlowOnce(Arc::new(AtomicUsize::new(0)))))
        .repeat(100)
        .build();

    let config = ExecutorConfig {
        failure_policy: FailurePolicy::ContinueOnFailure,
        ..Default::default()
    };
    let executor: Executor<NoopTarget> = Executor::new(config);
    let _ = executor.run(&scenario, None).await;

    let thresholds = SuccessThresholds {
        min_success_rate: 0.0,
        require_all_validators_passing: false,
        warning_validators: vec!["execution-time".to_string()],
        ..Default::default()
    };
    let report = executor.reporter().get_verdict(&thresholds).expect("valid thresholds");
    assert_eq!(report.verdict, Verdict::Unstable);
    assert_eq!(report.verdict.exit_code(), 0);
}

// S6 — a step-wrapper deadline fails every over-long iteration with a
// timeout-classified error.
#[tokio::test]
async fn s6_step_wrapper_deadline_fails_slow_iterations() {
    let step: Step<NoopTarget> = Step::new("slow", |_ctx, _target| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    });
    let scenario = ScenarioBuilder::new("s6")
        .target(NoopTarget)
        .step(step)
        .validator(Arc::new(DeadlineValidator::new("deadline", Duration::from_millis(100))))
        .repeat(3)
        .build();

    let config = ExecutorConfig {
        failure_policy: FailurePolicy::ContinueOnFailure,
        ..Default::default()
    };
    let executor: Executor<NoopTarget> = Executor::new(config);
    let _ = executor.run(&scenario, None).await;

    let report = executor
        .reporter()
        .get_verdict(&SuccessThresholds::default())
        .expect("valid thresholds");
    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.failure_analysis.by_type.get("timeout").copied(), Some(3));
}

// Scope flattening: injectors inside a scope start and stop alongside
// top-level ones.
#[tokio::test]
async fn scoped_injectors_participate_in_lifecycle() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scenario = ScenarioBuilder::new("scoped")
        .target(NoopTarget)
        .step(always_ok_step())
        .scope(Scope::new(
            "network-faults",
            vec![Arc::new(OrderedInjector { name: "scoped", log: log.clone() })],
        ))
        .repeat(1)
        .build();

    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");
    assert_eq!(*log.lock(), vec!["scoped", "scoped"]);
}

// Step-injector before/after hooks run in the documented order.
struct RecordingStepInjector(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Injector for RecordingStepInjector {
    fn name(&self) -> &str {
        "recorder"
    }
    async fn inject(&self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
    fn kind(&self) -> InjectorKind {
        InjectorKind::StepWrap
    }
    fn as_step_injector(&self) -> Option<&dyn StepInjector> {
        Some(self)
    }
}

#[async_trait]
impl StepInjector for RecordingStepInjector {
    async fn before_step(&self, step_name: &str) {
        self.0.lock().push(format!("before:{step_name}"));
    }
    async fn after_step(&self, step_name: &str, err: Option<&str>) {
        self.0.lock().push(format!("after:{step_name}:{}", err.is_some()));
    }
}

#[tokio::test]
async fn step_injector_hooks_wrap_every_step() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scenario = ScenarioBuilder::new("hooks")
        .target(NoopTarget)
        .step(always_ok_step())
        .injector(Arc::new(RecordingStepInjector(log.clone())))
        .repeat(1)
        .build();

    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");
    assert_eq!(*log.lock(), vec!["before:noop", "after:noop:false"]);
}

// Network lifecycle ordering: setupNetwork before inject, teardownNetwork
// after stop.
struct NetworkInjector(Arc<Mutex<Vec<&'static str>>>);

#[async_trait]
impl Injector for NetworkInjector {
    fn name(&self) -> &str {
        "network"
    }
    async fn inject(&self) -> anyhow::Result<()> {
        self.0.lock().push("inject");
        Ok(())
    }
    async fn stop(&self) -> anyhow::Result<()> {
        self.0.lock().push("stop");
        Ok(())
    }
    fn as_network_lifecycle(&self) -> Option<&dyn NetworkLifecycle> {
        Some(self)
    }
}

#[async_trait]
impl NetworkLifecycle for NetworkInjector {
    async fn setup_network(&self) -> anyhow::Result<()> {
        self.0.lock().push("setup_network");
        Ok(())
    }
    async fn teardown_network(&self) -> anyhow::Result<()> {
        self.0.lock().push("teardown_network");
        Ok(())
    }
}

#[tokio::test]
async fn network_lifecycle_brackets_inject_and_stop() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scenario = ScenarioBuilder::new("network")
        .target(NoopTarget)
        .step(always_ok_step())
        .injector(Arc::new(NetworkInjector(log.clone())))
        .repeat(1)
        .build();

    let executor: Executor<NoopTarget> = Executor::new(ExecutorConfig::default());
    executor.run(&scenario, None).await.expect("run succeeds");
    assert_eq!(*log.lock(), vec!["setup_network", "inject", "stop", "teardown_network"]);
}
