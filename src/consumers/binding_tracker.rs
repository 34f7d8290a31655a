//! Tracks the server binding of the active solution.
//!
//! Depends on [`SolutionTracker`]: the binding can only be resolved once the
//! active solution is known, so the tracker's readiness handle is declared as
//! a dependency and its delegate runs strictly after the tracker is ready.
//!
//! Every resolution is stamped with a generation. Only the resolution for the
//! latest solution change may write the cached binding, so a slow settings
//! read can never overwrite the binding of a solution opened after it began.

use super::host::{BindingConfigProvider, BindingConfiguration};
use super::solution_tracker::{ActiveSolutionChanged, SolutionTracker};
use super::SubscriptionSlot;
use crate::error::log_recoverable;
use crate::events::EventSource;
use crate::initialization::{AsyncInitializer, AsyncInitializerFactory, RequiresInitialization};
use crate::logging::log_component_event;
use crate::threading::{ThreadHandling, ThreadHandlingExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, error};

/// Outward notification that the binding of the active solution changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingChanged {
    pub solution_name: Option<String>,
    pub previous: BindingConfiguration,
    pub current: BindingConfiguration,
}

pub struct SolutionBindingTracker {
    solution_tracker: Arc<SolutionTracker>,
    provider: Arc<dyn BindingConfigProvider>,
    threading: Arc<dyn ThreadHandling>,
    runtime: Handle,
    initializer: AsyncInitializer,
    current: RwLock<BindingConfiguration>,
    generation: AtomicU64,
    subscription: SubscriptionSlot,
    binding_changed: EventSource<BindingChanged>,
}

impl SolutionBindingTracker {
    pub const OWNER: &'static str = "SolutionBindingTracker";

    pub fn new(
        factory: &AsyncInitializerFactory,
        solution_tracker: Arc<SolutionTracker>,
        provider: Arc<dyn BindingConfigProvider>,
    ) -> Arc<Self> {
        let tracker = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let initializer = factory.create_manual(
                Self::OWNER,
                vec![solution_tracker.readiness()],
                move |threading| async move {
                    match weak.upgrade() {
                        Some(tracker) => tracker.initialize(threading).await,
                        None => Ok(()),
                    }
                },
            );

            Self {
                solution_tracker,
                provider,
                threading: Arc::clone(factory.thread_handling()),
                runtime: factory.runtime().clone(),
                initializer,
                current: RwLock::new(BindingConfiguration::default()),
                generation: AtomicU64::new(0),
                subscription: SubscriptionSlot::default(),
                binding_changed: EventSource::new("binding_changed"),
            }
        });

        tracker.initializer.start();
        tracker
    }

    /// Binding of the active solution; standalone until ready, and after disposal
    pub fn current_configuration(&self) -> BindingConfiguration {
        if !self.is_live() {
            return BindingConfiguration::default();
        }
        self.current.read().clone()
    }

    pub fn binding_changed(&self) -> &EventSource<BindingChanged> {
        &self.binding_changed
    }

    /// Stop reacting to solution changes. Idempotent.
    pub fn dispose(&self) {
        self.initializer.dispose();
        if let Some(id) = self.subscription.dispose() {
            self.solution_tracker.active_solution_changed().unsubscribe(id);
            debug!(component = Self::OWNER, subscription = %id, "Unsubscribed from solution changes");
        }
    }

    fn is_live(&self) -> bool {
        self.initializer.is_initialized() && !self.subscription.is_disposed()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn initialize(self: Arc<Self>, threading: Arc<dyn ThreadHandling>) -> anyhow::Result<()> {
        let weak = Arc::downgrade(&self);
        let changes = self.solution_tracker.active_solution_changed();
        let id = changes.subscribe(move |change: &ActiveSolutionChanged| {
            if let Some(tracker) = weak.upgrade() {
                tracker.on_active_solution_changed(change);
            }
        });

        if let Some(orphan) = self.subscription.install(id) {
            changes.unsubscribe(orphan);
            return Ok(());
        }

        // Stamp before reading the name: a change raised from here on bumps
        // the generation and resolves its own binding
        let generation = self.next_generation();
        let solution = self.solution_tracker.active_solution_name();
        let provider = Arc::clone(&self.provider);
        let binding = threading
            .run_on_background_thread(move || provider.binding_for(solution.as_deref()))
            .await??;

        if self.store(generation, binding).is_none() {
            debug!(component = Self::OWNER, "Solution changed during setup, keeping the newer binding");
        }
        Ok(())
    }

    fn on_active_solution_changed(self: &Arc<Self>, change: &ActiveSolutionChanged) {
        let generation = self.next_generation();
        let solution_name = change.solution_name.clone();

        if !self.threading.is_on_primary_thread() {
            let resolved = self.provider.binding_for(solution_name.as_deref());
            match Self::settle(resolved) {
                Ok(binding) => self.apply(generation, solution_name, binding),
                Err(critical) => panic!("{}: {critical:#}", Self::OWNER),
            }
            return;
        }

        // Raised on the primary thread: settings reads go to the worker pool
        let weak = Arc::downgrade(self);
        let provider = Arc::clone(&self.provider);
        let threading = Arc::clone(&self.threading);
        self.runtime.spawn(async move {
            let lookup = solution_name.clone();
            let resolved = threading
                .run_on_background_thread(move || provider.binding_for(lookup.as_deref()))
                .await
                .unwrap_or_else(|affinity| Err(affinity.into()));

            match Self::settle(resolved) {
                Ok(binding) => {
                    if let Some(tracker) = weak.upgrade() {
                        tracker.apply(generation, solution_name, binding);
                    }
                }
                Err(critical) => {
                    // Re-raised where the event came from
                    let message = format!("{}: {critical:#}", Self::OWNER);
                    if let Err(e) = threading.dispatch_to_primary(Box::new(move || panic!("{message}"))) {
                        error!(component = Self::OWNER, error = %e, "Could not re-raise critical failure on primary thread");
                    }
                }
            }
        });
    }

    /// Recoverable provider failures fall back to standalone
    fn settle(resolved: anyhow::Result<BindingConfiguration>) -> anyhow::Result<BindingConfiguration> {
        match resolved {
            Ok(binding) => Ok(binding),
            Err(err) => log_recoverable(Self::OWNER, Err(err)).map(|()| BindingConfiguration::default()),
        }
    }

    /// Write `binding` unless a newer change has been seen; returns the
    /// replaced binding when written
    fn store(&self, generation: u64, binding: BindingConfiguration) -> Option<BindingConfiguration> {
        let mut current = self.current.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        Some(std::mem::replace(&mut *current, binding))
    }

    fn apply(&self, generation: u64, solution_name: Option<String>, binding: BindingConfiguration) {
        let Some(previous) = self.store(generation, binding.clone()) else {
            debug!(component = Self::OWNER, generation, "Discarding stale binding resolution");
            return;
        };

        if !self.is_live() {
            log_component_event(Self::OWNER, "binding_changed", "suppressed", None);
            return;
        }

        log_component_event(
            Self::OWNER,
            "binding_changed",
            "raised",
            Some(&binding.to_string()),
        );
        self.binding_changed.raise(&BindingChanged {
            solution_name,
            previous,
            current: binding,
        });
    }
}

impl RequiresInitialization for SolutionBindingTracker {
    fn initialization_processor(&self) -> &AsyncInitializer {
        &self.initializer
    }
}

impl Drop for SolutionBindingTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}
