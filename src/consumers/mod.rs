//! # Consumer Components
//!
//! Components built on the initializer, following one wiring pattern:
//!
//! - the constructor stores collaborators, builds the initializer with the
//!   declared dependencies and a setup delegate, then calls `start()` once
//!   without awaiting it
//! - the delegate hops to the primary thread for host calls, subscribes to
//!   host events, and fills the cached state
//! - public getters return defaults until the component is ready, and again
//!   after it is disposed
//! - outward events fire one-for-one with host events, but only while the
//!   component is ready and not disposed
//! - `dispose()` is idempotent and unsubscribes exactly once, even when it
//!   races the delegate

pub mod binding_tracker;
pub mod feature_flags;
pub mod host;
pub mod solution_tracker;

pub use binding_tracker::{BindingChanged, SolutionBindingTracker};
pub use feature_flags::FeatureFlagService;
pub use host::{BindingConfigProvider, BindingConfiguration, SolutionEvent, SolutionHost};
pub use solution_tracker::{ActiveSolutionChanged, SolutionTracker};

use crate::events::SubscriptionId;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct SlotState {
    id: Option<SubscriptionId>,
    disposed: bool,
}

/// Holds a component's host subscription and its disposed flag under one lock
#[derive(Debug, Default)]
pub(crate) struct SubscriptionSlot {
    state: Mutex<SlotState>,
}

impl SubscriptionSlot {
    /// Store a fresh subscription.
    ///
    /// If the owner was disposed while the subscription was being made, the
    /// id is handed back and the caller must unsubscribe it.
    pub(crate) fn install(&self, id: SubscriptionId) -> Option<SubscriptionId> {
        let mut state = self.state.lock();
        if state.disposed {
            return Some(id);
        }
        state.id = Some(id);
        None
    }

    /// Mark disposed. Yields the stored subscription on the first call only.
    pub(crate) fn dispose(&self) -> Option<SubscriptionId> {
        let mut state = self.state.lock();
        state.disposed = true;
        state.id.take()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}
