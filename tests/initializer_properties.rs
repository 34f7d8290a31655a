//! Behavioural properties of the initializer: idempotent start, dependency
//! ordering, disposal short-circuit, and failure replay.

mod common;

use common::{gated_initializer, inline_factory, RunLog, PROMPTLY, SETTLE};
use lintbridge_core::initialization::{
    AsyncInitializerFactory, InitializationError, InitializationState, ReadinessHandle, RequiresInitialization,
};
use lintbridge_core::test_utils::{Gate, InlineThreadHandling};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_share_one_delegate_run() {
    let factory = inline_factory();
    let runs = Arc::new(AtomicUsize::new(0));
    let initializer = Arc::new(factory.create_manual("Shared", Vec::new(), {
        let runs = Arc::clone(&runs);
        move |_| async move {
            runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            anyhow::Ok(())
        }
    }));

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let initializer = Arc::clone(&initializer);
            tokio::spawn(async move { initializer.start().await })
        })
        .collect();

    for caller in callers {
        assert_ok!(caller.await.unwrap());
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(initializer.state(), InitializationState::Initialized);
}

#[tokio::test]
async fn test_failing_delegate_is_replayed_without_rerun() {
    let factory = inline_factory();
    let runs = Arc::new(AtomicUsize::new(0));
    let component = factory.create_manual("Z", Vec::new(), {
        let runs = Arc::clone(&runs);
        move |_| async move {
            runs.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("invalid state: boom")
        }
    });

    let first = assert_err!(component.start().await);
    assert_eq!(first.setup_error().unwrap().to_string(), "invalid state: boom");
    assert_eq!(first.owner(), Some("Z"));

    let second = assert_err!(component.start().await);
    assert_eq!(second.setup_error().unwrap().to_string(), "invalid state: boom");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!component.is_initialized());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dependent_waits_for_every_dependency_in_order() {
    let factory = inline_factory();
    let log = RunLog::default();
    let gate = Gate::new();
    let a_runs = Arc::new(AtomicUsize::new(0));

    let a = gated_initializer(&factory, "A", &gate, &log, &a_runs);
    let b = factory.create_manual("B", Vec::new(), {
        let log = log.clone();
        move |_| async move {
            log.record("B");
            anyhow::Ok(())
        }
    });
    let d = factory.create_manual("D", vec![a.readiness(), b.readiness()], {
        let log = log.clone();
        move |_| async move {
            log.record("D");
            anyhow::Ok(())
        }
    });

    let pending = d.start();
    tokio::time::sleep(SETTLE).await;

    assert!(log.entries().is_empty(), "nothing may run while A is gated");
    assert!(!pending.is_completed());
    assert_eq!(d.state(), InitializationState::Initializing);

    gate.open();
    assert_ok!(timeout(PROMPTLY, pending).await.expect("D should finish after the gate opens"));
    assert_eq!(log.entries(), vec!["A", "B", "D"]);
    assert!(a.is_initialized() && b.is_initialized());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shared_dependency_runs_once_for_many_dependents() {
    let factory = inline_factory();
    let runs = Arc::new(AtomicUsize::new(0));
    let base = factory.create_manual("Base", Vec::new(), {
        let runs = Arc::clone(&runs);
        move |_| async move {
            runs.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        }
    });

    let dependents: Vec<_> = (0..5)
        .map(|i| factory.create_manual(format!("Dependent{i}"), vec![base.readiness()], |_| async { Ok(()) }))
        .collect();

    for dependent in &dependents {
        assert_ok!(timeout(PROMPTLY, dependent.start()).await.unwrap());
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

// Single-threaded runtime: the spawned sequence cannot reach the disposed
// check until this test yields, so dispose() is guaranteed to land first.
#[tokio::test]
async fn test_dispose_before_gate_skips_delegate() {
    let factory = inline_factory();
    let log = RunLog::default();
    let gate = Gate::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let w = gated_initializer(&factory, "W", &gate, &log, &runs);

    let pending = w.start();
    w.dispose();
    gate.open();

    assert_ok!(timeout(PROMPTLY, pending).await.unwrap());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(log.entries().is_empty());
    assert_eq!(w.state(), InitializationState::Disposed);
    assert!(w.is_initialized());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispose_while_waiting_on_dependency_abandons_setup() {
    let factory = inline_factory();
    let log = RunLog::default();
    let gate = Gate::new();
    let y_runs = Arc::new(AtomicUsize::new(0));
    let x_runs = Arc::new(AtomicUsize::new(0));

    let y = gated_initializer(&factory, "Y", &gate, &log, &y_runs);
    let x = factory.create_manual("X", vec![y.readiness()], {
        let x_runs = Arc::clone(&x_runs);
        move |_| async move {
            x_runs.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        }
    });

    let pending = x.start();
    tokio::time::sleep(SETTLE).await;
    x.dispose();
    x.dispose();
    gate.open();

    assert_ok!(timeout(PROMPTLY, pending).await.unwrap());
    assert_eq!(x_runs.load(Ordering::SeqCst), 0);
    assert_eq!(log.entries(), vec!["Y"]);
}

#[test]
fn test_runtime_shutdown_mid_setup_resolves_waiters() {
    let hosting = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let factory = AsyncInitializerFactory::new(Arc::new(InlineThreadHandling::background()), hosting.handle().clone());
    let log = RunLog::default();
    let gate = Gate::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let stranded = gated_initializer(&factory, "Stranded", &gate, &log, &runs);
    let dependent = factory.create_manual("Dependent", vec![stranded.readiness()], |_| async { Ok(()) });

    let pending = stranded.start();
    std::thread::sleep(SETTLE);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    hosting.shutdown_timeout(std::time::Duration::from_millis(500));

    let observer = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let outcome = observer
        .block_on(async { timeout(std::time::Duration::from_secs(2), pending).await })
        .expect("waiters must not hang once the sequence is gone");
    assert!(matches!(outcome, Err(InitializationError::SequenceDropped { .. })));
    assert!(log.entries().is_empty());

    // Later starts replay the same outcome rather than hanging
    let replay = observer.block_on(async { timeout(std::time::Duration::from_secs(2), stranded.start()).await }).unwrap();
    assert!(matches!(replay, Err(InitializationError::SequenceDropped { .. })));

    // Starting against the stopped runtime resolves too
    let late = observer.block_on(async { timeout(std::time::Duration::from_secs(2), dependent.start()).await }).unwrap();
    assert!(matches!(late, Err(InitializationError::SequenceDropped { .. })));
    assert!(!dependent.is_initialized());
}

#[tokio::test]
async fn test_dispose_after_completion_keeps_outcome() {
    let factory = inline_factory();
    let initializer = factory.create_manual("Done", Vec::new(), |_| async { Ok(()) });

    assert_ok!(initializer.start().await);
    initializer.dispose();

    assert_eq!(initializer.state(), InitializationState::Disposed);
    assert_ok!(initializer.start().await);
}

#[tokio::test]
async fn test_failed_dependency_faults_dependent_without_running_it() {
    let factory = inline_factory();
    let dependent_runs = Arc::new(AtomicUsize::new(0));
    let failing = factory.create_manual("SettingsStore", Vec::new(), |_| async {
        anyhow::bail!("settings file corrupt")
    });
    let dependent = factory.create_manual("RuleSetProvider", vec![failing.readiness()], {
        let dependent_runs = Arc::clone(&dependent_runs);
        move |_| async move {
            dependent_runs.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        }
    });

    match dependent.start().await {
        Err(InitializationError::DependencyFailed { owner, dependency, .. }) => {
            assert_eq!(owner, "RuleSetProvider");
            assert_eq!(dependency, "SettingsStore");
        }
        other => panic!("expected a dependency failure, got {other:?}"),
    }

    let err = assert_err!(dependent.start().await);
    assert_eq!(err.root_owner(), Some("SettingsStore"));
    assert_eq!(err.setup_error().unwrap().to_string(), "settings file corrupt");
    assert_eq!(dependent_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_abandoned_dependency_is_not_a_failure() {
    let factory = inline_factory();
    let dependent_runs = Arc::new(AtomicUsize::new(0));
    let abandoned = factory.create_manual("Closed", Vec::new(), |_| async {
        anyhow::bail!("must not run")
    });
    abandoned.dispose();

    let dependent = factory.create_manual("Dependent", vec![abandoned.readiness()], {
        let dependent_runs = Arc::clone(&dependent_runs);
        move |_| async move {
            dependent_runs.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        }
    });

    assert_ok!(dependent.start().await);
    assert_eq!(dependent_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failure_propagates_through_a_chain() {
    let factory = inline_factory();
    let root = factory.create_manual("Root", Vec::new(), |_| async { anyhow::bail!("host unavailable") });
    let middle = factory.create_manual("Middle", vec![root.readiness()], |_| async { Ok(()) });
    let leaf = factory.create_manual("Leaf", vec![middle.readiness()], |_| async { Ok(()) });

    let err = assert_err!(leaf.start().await);
    assert_eq!(err.owner(), Some("Leaf"));
    assert_eq!(err.root_owner(), Some("Root"));
    assert!(matches!(middle.start().await, Err(InitializationError::DependencyFailed { .. })));
}

#[tokio::test]
async fn test_readiness_handle_from_trait_matches_processor() {
    let factory = inline_factory();
    let flags = lintbridge_core::consumers::FeatureFlagService::new(
        &factory,
        &lintbridge_core::config::FeatureFlagsConfig::default(),
    );
    let handle: ReadinessHandle = flags.readiness();

    assert_ok!(handle.wait().await);
    assert_eq!(handle.owner(), "FeatureFlagService");
    assert!(flags.initialization_processor().is_initialized());
}

fn run_concurrent_starts(callers: usize, fail: bool) -> (usize, Vec<bool>) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let factory = inline_factory();
        let runs = Arc::new(AtomicUsize::new(0));
        let initializer = Arc::new(factory.create_manual("Property", Vec::new(), {
            let runs = Arc::clone(&runs);
            move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                if fail {
                    anyhow::bail!("property failure");
                }
                Ok(())
            }
        }));

        let tasks: Vec<_> = (0..callers)
            .map(|_| {
                let initializer = Arc::clone(&initializer);
                tokio::spawn(async move { initializer.start().await.is_ok() })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(callers);
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }
        (runs.load(Ordering::SeqCst), outcomes)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: N concurrent starts agree on the outcome and run the delegate once
    #[test]
    fn concurrent_starts_agree_and_run_once(callers in 1usize..32, fail in any::<bool>()) {
        let (runs, outcomes) = run_concurrent_starts(callers, fail);
        prop_assert_eq!(runs, 1);
        prop_assert_eq!(outcomes.len(), callers);
        prop_assert!(outcomes.iter().all(|ok| *ok == !fail));
    }
}
