//! In-process subscriber registry decoupling frame arrival from UI observers.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::event::{EventKind, RealtimeEvent};

type Callback = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Handle identifying one subscriber registration.
///
/// Returned by [`EventBus::on`]; passing it back to [`EventBus::off`] removes
/// exactly that registration. Registering the same closure twice yields two
/// handles and two invocations per event; duplicates are not deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Registry mapping event kinds to ordered subscriber callbacks.
pub struct EventBus {
    subscribers: Mutex<HashMap<EventKind, Vec<(u64, Callback)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a callback to the ordered list for an event kind.
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.lock().expect("subscriber registry poisoned");
        subscribers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription { kind, id }
    }

    /// Remove one registration. Returns whether it was still present.
    pub fn off(&self, subscription: Subscription) -> bool {
        let mut subscribers = self.subscribers.lock().expect("subscriber registry poisoned");
        if let Some(entries) = subscribers.get_mut(&subscription.kind) {
            if let Some(position) = entries.iter().position(|(id, _)| *id == subscription.id) {
                entries.remove(position);
                return true;
            }
        }
        false
    }

    /// Remove every subscriber for an event kind.
    pub fn off_all(&self, kind: EventKind) {
        let mut subscribers = self.subscribers.lock().expect("subscriber registry poisoned");
        subscribers.remove(&kind);
    }

    /// Remove all subscribers; intended for test isolation and teardown.
    pub fn clear(&self) {
        let mut subscribers = self.subscribers.lock().expect("subscriber registry poisoned");
        subscribers.clear();
    }

    /// Number of registrations for an event kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let subscribers = self.subscribers.lock().expect("subscriber registry poisoned");
        subscribers.get(&kind).map_or(0, Vec::len)
    }

    /// Invoke each subscriber for the event's kind, synchronously, in
    /// registration order.
    ///
    /// Callbacks are cloned out of the registry before dispatch so a callback
    /// may subscribe or unsubscribe without deadlocking. A panicking callback
    /// is caught and logged; later subscribers still run.
    pub fn emit(&self, event: &RealtimeEvent) {
        let callbacks: Vec<Callback> = {
            let subscribers = self.subscribers.lock().expect("subscriber registry poisoned");
            subscribers
                .get(&event.kind())
                .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(kind = ?event.kind(), "event subscriber panicked, continuing dispatch");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn disconnected() -> RealtimeEvent {
        RealtimeEvent::Disconnected { reason: None }
    }

    #[test]
    fn removed_subscriber_is_never_invoked() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let subscription = bus.on(EventKind::Disconnected, move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.off(subscription));
        bus.emit(&disconnected());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_registrations_are_invoked_once_each() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls_clone = Arc::clone(&calls);
            bus.on(EventKind::Disconnected, move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(&disconnected());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order_clone = Arc::clone(&order);
            bus.on(EventKind::Disconnected, move |_| {
                order_clone.lock().unwrap().push(label);
            });
        }

        bus.emit(&disconnected());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::Disconnected, |_| panic!("subscriber exploded"));
        let calls_clone = Arc::clone(&calls);
        bus.on(EventKind::Disconnected, move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&disconnected());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_all_clears_only_that_kind() {
        let bus = EventBus::new();
        bus.on(EventKind::Disconnected, |_| {});
        bus.on(EventKind::Connected, |_| {});

        bus.off_all(EventKind::Disconnected);
        assert_eq!(bus.subscriber_count(EventKind::Disconnected), 0);
        assert_eq!(bus.subscriber_count(EventKind::Connected), 1);
    }

    #[test]
    fn off_is_idempotent() {
        let bus = EventBus::new();
        let subscription = bus.on(EventKind::Connected, |_| {});
        assert!(bus.off(subscription));
        assert!(!bus.off(subscription));
    }
}
