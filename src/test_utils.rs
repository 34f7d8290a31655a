//! # Test Utilities
//!
//! Fakes for the host seams, shared by unit tests and the `tests/` suites.
//! Everything here is deterministic and in-process: no real host, no real
//! settings files.

use crate::consumers::{BindingConfigProvider, BindingConfiguration, SolutionEvent, SolutionHost};
use crate::error::CriticalError;
use crate::events::{EventHandler, EventSource, SubscriptionId};
use crate::threading::{PrimaryWork, ThreadAffinityError, ThreadHandling};
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

thread_local! {
    static INLINE_PRIMARY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// [`ThreadHandling`] that runs "primary" work inline on the calling thread.
///
/// In `primary()` mode every caller counts as being on the primary thread. In
/// `background()` mode only dispatched work does, for as long as it runs.
#[derive(Debug)]
pub struct InlineThreadHandling {
    always_primary: bool,
    dispatches: AtomicUsize,
}

impl InlineThreadHandling {
    pub fn primary() -> Self {
        Self {
            always_primary: true,
            dispatches: AtomicUsize::new(0),
        }
    }

    pub fn background() -> Self {
        Self {
            always_primary: false,
            dispatches: AtomicUsize::new(0),
        }
    }

    /// Number of work items hopped onto the "primary thread"
    pub fn dispatch_count(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }
}

impl ThreadHandling for InlineThreadHandling {
    fn is_on_primary_thread(&self) -> bool {
        self.always_primary || INLINE_PRIMARY_DEPTH.with(|depth| depth.get() > 0)
    }

    fn dispatch_to_primary(&self, work: PrimaryWork) -> Result<(), ThreadAffinityError> {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        INLINE_PRIMARY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        work();
        INLINE_PRIMARY_DEPTH.with(|depth| depth.set(depth.get() - 1));
        Ok(())
    }
}

/// One-shot latch for holding a fake in place until the test releases it
#[derive(Debug, Clone)]
pub struct Gate {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn open(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives in self, so this cannot observe a closed channel
        let _ = receiver.wait_for(|open| *open).await;
    }

    /// Block the calling OS thread until the gate opens
    pub fn wait_blocking(&self) {
        futures::executor::block_on(self.wait());
    }
}

/// In-memory [`SolutionHost`] with call counters and failure injection
pub struct FakeSolutionHost {
    solution: RwLock<Option<String>>,
    events: EventSource<SolutionEvent>,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    name_reads: AtomicUsize,
    name_failure: Mutex<Option<String>>,
    name_gate: Mutex<Option<Gate>>,
    primary_check: Mutex<Option<Arc<dyn ThreadHandling>>>,
}

impl Default for FakeSolutionHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSolutionHost {
    /// Host with no solution open
    pub fn new() -> Self {
        Self {
            solution: RwLock::new(None),
            events: EventSource::new("host_solution_events"),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
            name_reads: AtomicUsize::new(0),
            name_failure: Mutex::new(None),
            name_gate: Mutex::new(None),
            primary_check: Mutex::new(None),
        }
    }

    pub fn with_solution(name: impl Into<String>) -> Self {
        let host = Self::new();
        *host.solution.write() = Some(name.into());
        host
    }

    /// Switch to `name` and raise `Opened` on the calling thread
    pub fn open_solution(&self, name: impl Into<String>) {
        let name = name.into();
        *self.solution.write() = Some(name.clone());
        self.events.raise(&SolutionEvent::Opened { name });
    }

    /// Close the solution and raise `Closed` on the calling thread
    pub fn close_solution(&self) {
        *self.solution.write() = None;
        self.events.raise(&SolutionEvent::Closed);
    }

    /// Make `current_solution_name` fail with `message` from now on
    pub fn fail_name_reads(&self, message: impl Into<String>) {
        *self.name_failure.lock() = Some(message.into());
    }

    /// Make `current_solution_name` block until `gate` opens
    pub fn gate_name_reads(&self, gate: Gate) {
        *self.name_gate.lock() = Some(gate);
    }

    /// Make `current_solution_name` fail unless called on `threading`'s primary thread
    pub fn require_primary_thread(&self, threading: Arc<dyn ThreadHandling>) {
        *self.primary_check.lock() = Some(threading);
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn name_reads(&self) -> usize {
        self.name_reads.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

impl SolutionHost for FakeSolutionHost {
    fn current_solution_name(&self) -> anyhow::Result<Option<String>> {
        self.name_reads.fetch_add(1, Ordering::SeqCst);

        let gate = self.name_gate.lock().clone();
        if let Some(gate) = gate {
            gate.wait_blocking();
        }

        let threading = self.primary_check.lock().clone();
        if let Some(threading) = threading {
            threading.require_on_primary_thread("current_solution_name")?;
        }

        if let Some(message) = self.name_failure.lock().clone() {
            anyhow::bail!(message);
        }
        Ok(self.solution.read().clone())
    }

    fn subscribe_solution_events(&self, handler: EventHandler<SolutionEvent>) -> SubscriptionId {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.events.subscribe_handler(handler)
    }

    fn unsubscribe_solution_events(&self, id: SubscriptionId) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.events.unsubscribe(id);
    }
}

#[derive(Debug, Clone)]
enum ProviderFailure {
    Recoverable(String),
    Critical(String),
}

/// [`BindingConfigProvider`] backed by a map; unknown solutions are standalone
#[derive(Default)]
pub struct StaticBindingProvider {
    bindings: RwLock<HashMap<String, BindingConfiguration>>,
    failure: Mutex<Option<ProviderFailure>>,
    gates: Mutex<HashMap<String, Gate>>,
    background_check: Mutex<Option<Arc<dyn ThreadHandling>>>,
    lookups: AtomicUsize,
}

impl StaticBindingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(self, solution_name: impl Into<String>, binding: BindingConfiguration) -> Self {
        self.set_binding(solution_name, binding);
        self
    }

    pub fn set_binding(&self, solution_name: impl Into<String>, binding: BindingConfiguration) {
        self.bindings.write().insert(solution_name.into(), binding);
    }

    /// Fail lookups with an ordinary error
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(ProviderFailure::Recoverable(message.into()));
    }

    /// Fail lookups with a [`CriticalError`]
    pub fn fail_critically(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(ProviderFailure::Critical(message.into()));
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Make lookups for `solution_name` block until `gate` opens
    pub fn gate_lookups_for(&self, solution_name: impl Into<String>, gate: Gate) {
        self.gates.lock().insert(solution_name.into(), gate);
    }

    /// Make lookups fail when called on `threading`'s primary thread
    pub fn forbid_primary_thread(&self, threading: Arc<dyn ThreadHandling>) {
        *self.background_check.lock() = Some(threading);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl BindingConfigProvider for StaticBindingProvider {
    fn binding_for(&self, solution_name: Option<&str>) -> anyhow::Result<BindingConfiguration> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let threading = self.background_check.lock().clone();
        if let Some(threading) = threading {
            threading.require_off_primary_thread("binding_for")?;
        }

        let gate = solution_name.and_then(|name| self.gates.lock().get(name).cloned());
        if let Some(gate) = gate {
            gate.wait_blocking();
        }

        match self.failure.lock().clone() {
            Some(ProviderFailure::Recoverable(message)) => anyhow::bail!(message),
            Some(ProviderFailure::Critical(message)) => return Err(CriticalError::new(message).into()),
            None => {}
        }

        Ok(solution_name
            .and_then(|name| self.bindings.read().get(name).cloned())
            .unwrap_or_default())
    }
}

/// Collects every payload raised on an [`EventSource`]
pub struct EventRecorder<T> {
    events: Arc<Mutex<Vec<T>>>,
    subscription: SubscriptionId,
}

impl<T: Clone + Send + 'static> EventRecorder<T> {
    pub fn attach(source: &EventSource<T>) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscription = source.subscribe({
            let events = Arc::clone(&events);
            move |payload: &T| events.lock().push(payload.clone())
        });
        Self { events, subscription }
    }

    pub fn events(&self) -> Vec<T> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Resolve once at least `count` payloads have been recorded
    pub async fn wait_for_len(&self, count: usize) {
        while self.len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
