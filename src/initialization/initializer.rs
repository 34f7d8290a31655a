//! # Async Initializer
//!
//! One instance per participating component. Owns the component's setup
//! sequencing:
//!
//! 1. await each dependency's readiness, in declared order
//! 2. re-check the disposed flag; if set, resolve successfully without setup
//! 3. run the setup delegate with the thread-affinity capability
//! 4. resolve the completion signal with the delegate's outcome
//!
//! `start()` and `dispose()` are total: any number of calls, from any thread,
//! in any order. The delegate runs at most once because it is an `FnOnce`
//! taken out of the lifecycle lock by the first `start()`.

use super::errors::{InitializationError, SetupFailure};
use super::signal::{CompletionSignal, CompletionSource, InitializationOutcome};
use super::states::InitializationState;
use crate::logging::log_initialization_event;
use crate::threading::primary_thread::panic_message;
use crate::threading::ThreadHandling;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub(crate) type SetupFuture = BoxFuture<'static, anyhow::Result<()>>;
pub(crate) type SetupDelegate = Box<dyn FnOnce(Arc<dyn ThreadHandling>) -> SetupFuture + Send>;

/// Implemented by every component that exposes a readiness handle
pub trait RequiresInitialization: Send + Sync {
    /// The component's initializer
    fn initialization_processor(&self) -> &AsyncInitializer;

    /// Handle for dependents to declare and await this component
    fn readiness(&self) -> ReadinessHandle {
        self.initialization_processor().readiness()
    }
}

struct Lifecycle {
    phase: InitializationState,
    disposed: bool,
    delegate: Option<SetupDelegate>,
}

struct InitializerInner {
    id: Uuid,
    owner: String,
    dependencies: Vec<ReadinessHandle>,
    thread_handling: Arc<dyn ThreadHandling>,
    runtime: Handle,
    slow_setup_warning: Option<Duration>,
    lifecycle: Mutex<Lifecycle>,
    completion: CompletionSource,
}

/// Setup sequencer owned 1:1 by a component.
///
/// Not `Clone`: the owner holds the only initializer and hands
/// out [`ReadinessHandle`]s to dependents.
pub struct AsyncInitializer {
    inner: Arc<InitializerInner>,
}

/// Read-only view of another component's initializer
#[derive(Clone)]
pub struct ReadinessHandle {
    inner: Arc<InitializerInner>,
}

impl AsyncInitializer {
    pub(crate) fn new(
        owner: String,
        dependencies: Vec<ReadinessHandle>,
        thread_handling: Arc<dyn ThreadHandling>,
        runtime: Handle,
        slow_setup_warning: Option<Duration>,
        delegate: SetupDelegate,
    ) -> Self {
        let inner = Arc::new(InitializerInner {
            id: Uuid::new_v4(),
            completion: CompletionSource::new(owner.clone()),
            owner,
            dependencies,
            thread_handling,
            runtime,
            slow_setup_warning,
            lifecycle: Mutex::new(Lifecycle {
                phase: InitializationState::NotStarted,
                disposed: false,
                delegate: Some(delegate),
            }),
        });

        debug!(
            owner = %inner.owner,
            initializer_id = %inner.id,
            dependencies = ?inner.dependency_owners(),
            "Initializer created"
        );

        Self { inner }
    }

    /// Begin the sequence if nobody has yet, and return the shared signal.
    ///
    /// Does not block; the sequence runs on the async runtime.
    pub fn start(&self) -> CompletionSignal {
        self.inner.start()
    }

    /// Mark the owner disposed.
    ///
    /// Prevents the delegate from starting if the gate has not been reached.
    /// A delegate that is already running is left to finish.
    pub fn dispose(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.disposed {
            return;
        }
        lifecycle.disposed = true;
        let phase = lifecycle.phase;
        drop(lifecycle);

        log_initialization_event(&self.inner.owner, self.inner.id, "dispose", &phase.to_string(), None);
    }

    pub fn readiness(&self) -> ReadinessHandle {
        ReadinessHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> InitializationState {
        self.inner.state()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lifecycle.lock().disposed
    }

    /// True once the sequence resolved successfully (including abandonment)
    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    pub fn dependencies(&self) -> &[ReadinessHandle] {
        &self.inner.dependencies
    }
}

impl std::fmt::Debug for AsyncInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncInitializer")
            .field("owner", &self.inner.owner)
            .field("id", &self.inner.id)
            .field("state", &self.inner.state())
            .field("dependencies", &self.inner.dependency_owners())
            .finish()
    }
}

impl ReadinessHandle {
    /// Start the component's sequence if needed and wait for its outcome
    pub async fn wait(&self) -> InitializationOutcome {
        self.inner.start().wait().await
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completion.is_completed()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    pub fn owner(&self) -> &str {
        &self.inner.owner
    }
}

impl std::fmt::Debug for ReadinessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessHandle")
            .field("owner", &self.inner.owner)
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Resolves the signal with `SequenceDropped` if the sequence task goes away
/// before completing it, e.g. when the runtime shuts down.
struct SequenceGuard {
    inner: Arc<InitializerInner>,
}

impl Drop for SequenceGuard {
    fn drop(&mut self) {
        if self.inner.completion.is_completed() {
            return;
        }
        self.inner.lifecycle.lock().phase = InitializationState::Initialized;
        let outcome = Err(InitializationError::SequenceDropped {
            owner: self.inner.owner.clone(),
        });
        if self.inner.completion.complete(outcome) {
            error!(
                owner = %self.inner.owner,
                initializer_id = %self.inner.id,
                "❌ Initialization sequence dropped before completing"
            );
        }
    }
}

impl InitializerInner {
    fn dependency_owners(&self) -> Vec<&str> {
        self.dependencies.iter().map(ReadinessHandle::owner).collect()
    }

    fn state(&self) -> InitializationState {
        let lifecycle = self.lifecycle.lock();
        if lifecycle.disposed {
            InitializationState::Disposed
        } else {
            lifecycle.phase
        }
    }

    fn is_initialized(&self) -> bool {
        matches!(self.completion.signal().outcome(), Some(Ok(())))
    }

    fn start(self: &Arc<Self>) -> CompletionSignal {
        let delegate = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.phase == InitializationState::NotStarted {
                lifecycle.phase = InitializationState::Initializing;
                lifecycle.delegate.take()
            } else {
                None
            }
        };

        if let Some(delegate) = delegate {
            log_initialization_event(&self.owner, self.id, "start", "initializing", None);
            // Moved into the task so a cancelled or never-polled sequence
            // still resolves its waiters
            let guard = SequenceGuard {
                inner: Arc::clone(self),
            };
            self.runtime.spawn(async move {
                let inner = Arc::clone(&guard.inner);
                inner.run_sequence(delegate).await;
                drop(guard);
            });
        }

        self.completion.signal()
    }

    async fn run_sequence(self: Arc<Self>, delegate: SetupDelegate) {
        let outcome = self.execute(delegate).await;

        self.lifecycle.lock().phase = InitializationState::Initialized;
        match &outcome {
            Ok(()) => info!(owner = %self.owner, initializer_id = %self.id, "✅ Component initialized"),
            Err(e) => error!(owner = %self.owner, initializer_id = %self.id, error = %e, "❌ Component initialization failed"),
        }
        self.completion.complete(outcome);
    }

    async fn execute(&self, delegate: SetupDelegate) -> InitializationOutcome {
        for dependency in &self.dependencies {
            debug!(owner = %self.owner, dependency = %dependency.owner(), "Awaiting dependency");
            if let Err(cause) = dependency.wait().await {
                return Err(InitializationError::DependencyFailed {
                    owner: self.owner.clone(),
                    dependency: dependency.owner().to_string(),
                    cause: Box::new(cause),
                });
            }
        }

        // Single gate: disposal after this point does not stop the delegate
        if self.lifecycle.lock().disposed {
            warn!(owner = %self.owner, initializer_id = %self.id, "Owner disposed before setup, abandoning initialization");
            return Ok(());
        }

        let started = Instant::now();
        let thread_handling = Arc::clone(&self.thread_handling);
        let result = AssertUnwindSafe(async move { delegate(thread_handling).await })
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        if let Some(threshold) = self.slow_setup_warning {
            if elapsed > threshold {
                warn!(
                    owner = %self.owner,
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "Slow component setup"
                );
            }
        }

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(InitializationError::SetupFailed {
                owner: self.owner.clone(),
                failure: SetupFailure::new(e),
            }),
            Err(payload) => Err(InitializationError::SetupPanicked {
                owner: self.owner.clone(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::AsyncInitializerFactory;
    use crate::test_utils::InlineThreadHandling;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn factory() -> AsyncInitializerFactory {
        AsyncInitializerFactory::new(Arc::new(InlineThreadHandling::background()), Handle::current())
    }

    #[tokio::test]
    async fn test_manual_initializer_does_nothing_until_started() {
        let runs = Arc::new(AtomicUsize::new(0));
        let initializer = factory().create_manual("Manual", Vec::new(), {
            let runs = Arc::clone(&runs);
            move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::task::yield_now().await;
        assert_eq!(initializer.state(), InitializationState::NotStarted);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        initializer.start().await.unwrap();
        assert_eq!(initializer.state(), InitializationState::Initialized);
        assert!(initializer.is_initialized());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delegate_receives_thread_handling() {
        let initializer = factory().create_manual("Affinity", Vec::new(), |threading| async move {
            threading.require_off_primary_thread("setup")?;
            anyhow::Ok(())
        });

        assert!(initializer.start().await.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_delegate_is_captured() {
        let initializer = factory().create_manual("Panicky", Vec::new(), |_| async move {
            if true {
                panic!("setup exploded");
            }
            Ok(())
        });

        match initializer.start().await {
            Err(InitializationError::SetupPanicked { owner, message }) => {
                assert_eq!(owner, "Panicky");
                assert_eq!(message, "setup exploded");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!initializer.is_initialized());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_reported_in_state() {
        let initializer = factory().create_manual("Disposable", Vec::new(), |_| async { Ok(()) });
        initializer.dispose();
        initializer.dispose();

        assert!(initializer.is_disposed());
        assert_eq!(initializer.state(), InitializationState::Disposed);
        assert!(initializer.start().await.is_ok());
        assert!(initializer.is_initialized());
    }

    #[test]
    fn test_start_on_shut_down_runtime_reports_sequence_dropped() {
        let stopped = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let handle = stopped.handle().clone();
        drop(stopped);

        let initializer = AsyncInitializerFactory::new(Arc::new(InlineThreadHandling::background()), handle)
            .create_manual("Orphaned", Vec::new(), |_| async { Ok(()) });

        let waiter = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let outcome = waiter
            .block_on(async { tokio::time::timeout(Duration::from_secs(2), initializer.start()).await })
            .expect("waiters must not hang on a dead runtime");

        assert!(matches!(outcome, Err(InitializationError::SequenceDropped { ref owner }) if owner == "Orphaned"));
        assert!(!initializer.is_initialized());
        assert_eq!(initializer.state(), InitializationState::Initialized);
    }

    #[tokio::test]
    async fn test_readiness_handle_starts_unstarted_dependency() {
        let dependency = factory().create_manual("Dependency", Vec::new(), |_| async { Ok(()) });
        let handle = dependency.readiness();
        assert!(!handle.is_completed());

        handle.wait().await.unwrap();
        assert!(handle.is_completed());
        assert!(handle.is_initialized());
        assert_eq!(dependency.state(), InitializationState::Initialized);
    }
}
