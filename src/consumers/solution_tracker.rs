//! Tracks the solution currently open in the host.

use super::host::{SolutionEvent, SolutionHost};
use super::SubscriptionSlot;
use crate::events::EventSource;
use crate::initialization::{AsyncInitializer, AsyncInitializerFactory, RequiresInitialization};
use crate::logging::log_component_event;
use crate::threading::{ThreadHandling, ThreadHandlingExt};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Outward notification that the active solution changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSolutionChanged {
    pub solution_name: Option<String>,
}

/// Caches the active solution name and re-raises host solution events
pub struct SolutionTracker {
    host: Arc<dyn SolutionHost>,
    initializer: AsyncInitializer,
    active_solution: RwLock<Option<String>>,
    subscription: SubscriptionSlot,
    active_solution_changed: EventSource<ActiveSolutionChanged>,
}

impl SolutionTracker {
    pub const OWNER: &'static str = "SolutionTracker";

    pub fn new(factory: &AsyncInitializerFactory, host: Arc<dyn SolutionHost>) -> Arc<Self> {
        let tracker = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let initializer = factory.create_manual(Self::OWNER, Vec::new(), move |threading| async move {
                match weak.upgrade() {
                    Some(tracker) => tracker.initialize(threading).await,
                    None => Ok(()),
                }
            });

            Self {
                host,
                initializer,
                active_solution: RwLock::new(None),
                subscription: SubscriptionSlot::default(),
                active_solution_changed: EventSource::new("active_solution_changed"),
            }
        });

        // Last constructor step: the Arc exists, so the delegate can upgrade
        tracker.initializer.start();
        tracker
    }

    /// Name of the open solution; `None` until ready, and after disposal
    pub fn active_solution_name(&self) -> Option<String> {
        if !self.is_live() {
            return None;
        }
        self.active_solution.read().clone()
    }

    pub fn active_solution_changed(&self) -> &EventSource<ActiveSolutionChanged> {
        &self.active_solution_changed
    }

    /// Stop reacting to the host. Idempotent.
    pub fn dispose(&self) {
        self.initializer.dispose();
        if let Some(id) = self.subscription.dispose() {
            self.host.unsubscribe_solution_events(id);
            debug!(component = Self::OWNER, subscription = %id, "Unsubscribed from solution events");
        }
    }

    fn is_live(&self) -> bool {
        self.initializer.is_initialized() && !self.subscription.is_disposed()
    }

    async fn initialize(self: Arc<Self>, threading: Arc<dyn ThreadHandling>) -> anyhow::Result<()> {
        let tracker = Arc::clone(&self);
        threading
            .run_on_primary_thread(move || tracker.subscribe_and_refresh())
            .await??;
        Ok(())
    }

    /// Runs on the primary thread. Subscribes before reading so no change
    /// between the read and the subscription is lost.
    fn subscribe_and_refresh(self: &Arc<Self>) -> anyhow::Result<()> {
        let weak = Arc::downgrade(self);
        let id = self.host.subscribe_solution_events(Arc::new(move |event: &SolutionEvent| {
            if let Some(tracker) = weak.upgrade() {
                tracker.on_solution_event(event);
            }
        }));

        if let Some(orphan) = self.subscription.install(id) {
            self.host.unsubscribe_solution_events(orphan);
            return Ok(());
        }

        let name = self.host.current_solution_name()?;
        *self.active_solution.write() = name;
        Ok(())
    }

    fn on_solution_event(&self, event: &SolutionEvent) {
        let name = event.active_solution().map(str::to_owned);
        *self.active_solution.write() = name.clone();

        if !self.is_live() {
            log_component_event(Self::OWNER, event.event_type(), "suppressed", None);
            return;
        }

        log_component_event(Self::OWNER, event.event_type(), "raised", name.as_deref());
        self.active_solution_changed
            .raise(&ActiveSolutionChanged { solution_name: name });
    }
}

impl RequiresInitialization for SolutionTracker {
    fn initialization_processor(&self) -> &AsyncInitializer {
        &self.initializer
    }
}

impl Drop for SolutionTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}
