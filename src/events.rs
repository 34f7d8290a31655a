//! # Event Sources
//!
//! Observer registry used for both host-raised events and the outward events
//! components expose. Subscription is explicit (`subscribe` returns an id,
//! `unsubscribe` takes it back), so a component can bracket its handlers
//! between its setup delegate and its own dispose path.
//!
//! Handlers run synchronously on the raising thread, in subscription order.
//! The handler list is snapshotted before dispatch, so a handler may
//! unsubscribe itself (or others) while an event is being raised.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Callback registered with an [`EventSource`]
pub type EventHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Token returned by [`EventSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Thread-safe registry of handlers for one event type
pub struct EventSource<T> {
    name: String,
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, EventHandler<T>)>>,
}

impl<T> EventSource<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_handler(Arc::new(handler))
    }

    pub fn subscribe_handler(&self, handler: EventHandler<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, handler));
        trace!(event = %self.name, subscription = %id, "Subscribed");
        id
    }

    /// Remove a handler. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        drop(handlers);

        if removed {
            trace!(event = %self.name, subscription = %id, "Unsubscribed");
        }
        removed
    }

    /// Invoke every registered handler with `payload`; returns how many ran
    pub fn raise(&self, payload: &T) -> usize {
        let snapshot: Vec<EventHandler<T>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl<T> fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_raise_reaches_subscribers_in_order() {
        let source = EventSource::<u32>::new("numbers");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            source.subscribe(move |value: &u32| seen.lock().push(format!("{tag}:{value}")));
        }

        assert_eq!(source.raise(&7), 2);
        assert_eq!(*seen.lock(), vec!["first:7", "second:7"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let source = EventSource::<()>::new("ticks");
        let count = Arc::new(AtomicU64::new(0));
        let id = source.subscribe({
            let count = Arc::clone(&count);
            move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        source.raise(&());
        assert!(source.unsubscribe(id));
        assert!(!source.unsubscribe(id));
        source.raise(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_handler_can_unsubscribe_during_raise() {
        let source = Arc::new(EventSource::<()>::new("self-removing"));
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let id = source.subscribe({
            let source = Arc::downgrade(&source);
            let slot = Arc::clone(&slot);
            move |_| {
                if let (Some(source), Some(id)) = (source.upgrade(), *slot.lock()) {
                    source.unsubscribe(id);
                }
            }
        });
        *slot.lock() = Some(id);

        assert_eq!(source.raise(&()), 1);
        assert_eq!(source.raise(&()), 0);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let source = EventSource::<()>::new("ids");
        let a = source.subscribe(|_| {});
        let b = source.subscribe(|_| {});
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "sub-1");
    }
}
