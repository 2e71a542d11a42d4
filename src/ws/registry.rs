//! Subscriber registries and the handles that remove entries from them.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use serde_json::Value;

use super::envelope::{Envelope, WILDCARD};

/// Callback receiving an event payload (or, for wildcard subscribers, the whole envelope).
pub type PayloadHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback for connection lifecycle events.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Disposer returned by every `subscribe`/`on_*` call.
///
/// [`Subscription::unsubscribe`] removes exactly the handler it was created
/// for. Dropping the handle without calling it leaves the handler registered
/// for the lifetime of the manager.
#[must_use = "dropping a Subscription keeps the handler registered; call `unsubscribe` to remove it"]
pub struct Subscription {
    id: SubscriberId,
    remove: Box<dyn FnOnce() -> bool + Send + Sync>,
}

impl Subscription {
    fn new<F>(id: SubscriberId, remove: F) -> Self
    where
        F: FnOnce() -> bool + Send + Sync + 'static,
    {
        Self {
            id,
            remove: Box::new(remove),
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the handler. Returns `false` if it was already gone (e.g. the
    /// manager has been dropped).
    #[expect(
        clippy::must_use_candidate,
        reason = "Callers usually dispose without caring whether the handler was still present"
    )]
    pub fn unsubscribe(self) -> bool {
        (self.remove)()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Event-type keyed handler sets, including the reserved [`WILDCARD`] key.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: AtomicU64,
    topics: DashMap<String, Vec<(SubscriberId, PayloadHandler)>>,
}

impl SubscriptionRegistry {
    pub(crate) fn subscribe(self: &Arc<Self>, event_type: &str, handler: PayloadHandler) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics
            .entry(event_type.to_owned())
            .or_default()
            .push((id, handler));

        #[cfg(feature = "tracing")]
        tracing::debug!(event_type, ?id, "Registered realtime subscriber");

        let registry = Arc::downgrade(self);
        let key = event_type.to_owned();
        Subscription::new(id, move || {
            registry
                .upgrade()
                .is_some_and(|registry| registry.remove(&key, id))
        })
    }

    fn remove(&self, event_type: &str, id: SubscriberId) -> bool {
        let removed = self.topics.get_mut(event_type).is_some_and(|mut handlers| {
            let before = handlers.len();
            handlers.retain(|(existing, _)| *existing != id);
            handlers.len() != before
        });
        self.topics
            .remove_if(event_type, |_, handlers| handlers.is_empty());

        #[cfg(feature = "tracing")]
        tracing::debug!(event_type, ?id, removed, "Removed realtime subscriber");

        removed
    }

    /// Number of handlers registered under `event_type`.
    pub(crate) fn count(&self, event_type: &str) -> usize {
        self.topics.get(event_type).map_or(0, |handlers| handlers.len())
    }

    /// Total number of registered handlers across all keys.
    pub(crate) fn total(&self) -> usize {
        self.topics.iter().map(|entry| entry.value().len()).sum()
    }

    fn snapshot(&self, event_type: &str) -> Vec<PayloadHandler> {
        self.topics
            .get(event_type)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Deliver `envelope.payload` to the handlers of its exact type, then
    /// `raw` to the wildcard handlers. Returns the number of handlers invoked.
    ///
    /// Handlers are snapshotted before invocation, so they may subscribe or
    /// unsubscribe from inside a callback.
    pub(crate) fn dispatch(&self, envelope: &Envelope, raw: &Value) -> usize {
        let mut invoked = 0;

        if envelope.event_type != WILDCARD {
            for handler in self.snapshot(&envelope.event_type) {
                invoke(&envelope.event_type, || handler(&envelope.payload));
                invoked += 1;
            }
        }

        for handler in self.snapshot(WILDCARD) {
            invoke(&envelope.event_type, || handler(raw));
            invoked += 1;
        }

        invoked
    }
}

/// Handlers for one connection lifecycle event.
#[derive(Default)]
pub(crate) struct LifecycleRegistry {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriberId, LifecycleHandler)>>,
}

impl LifecycleRegistry {
    pub(crate) fn subscribe(self: &Arc<Self>, handler: LifecycleHandler) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, handler));

        let registry = Arc::downgrade(self);
        Subscription::new(id, move || {
            registry.upgrade().is_some_and(|registry| {
                let mut handlers = registry.lock();
                let before = handlers.len();
                handlers.retain(|(existing, _)| *existing != id);
                handlers.len() != before
            })
        })
    }

    pub(crate) fn notify(&self, event: &str) {
        // Handlers run after the lock is released so they may (un)subscribe.
        let handlers: Vec<LifecycleHandler> =
            self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            invoke(event, || handler());
        }
    }

    #[cfg(test)]
    fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriberId, LifecycleHandler)>> {
        // A Vec of handlers has no intermediate state a panic could leave inconsistent.
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run a subscriber, containing any panic so the socket task keeps running.
fn invoke<F: FnOnce()>(event: &str, call: F) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        #[cfg(feature = "tracing")]
        tracing::error!(event, "Realtime subscriber panicked");
        #[cfg(not(feature = "tracing"))]
        let _: &str = event;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, PayloadHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: PayloadHandler = Arc::new(move |value: &Value| {
            sink.lock().expect("lock").push(value.clone());
        });
        (seen, handler)
    }

    fn envelope(event_type: &str, payload: Value) -> (Envelope, Value) {
        let raw = json!({ "type": event_type, "payload": payload });
        let envelope = Envelope::builder()
            .event_type(event_type)
            .payload(payload)
            .build();
        (envelope, raw)
    }

    #[test]
    fn routes_payload_to_exact_type_and_envelope_to_wildcard() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let (shipped, shipped_handler) = recorder();
        let (created, created_handler) = recorder();
        let (all, all_handler) = recorder();
        let _shipped = registry.subscribe("order:shipped", shipped_handler);
        let _created = registry.subscribe("order:created", created_handler);
        let _all = registry.subscribe(WILDCARD, all_handler);

        let (message, raw) = envelope("order:shipped", json!({ "orderId": "o-1" }));
        let invoked = registry.dispatch(&message, &raw);

        assert_eq!(invoked, 2);
        assert_eq!(*shipped.lock().expect("lock"), vec![json!({ "orderId": "o-1" })]);
        assert!(created.lock().expect("lock").is_empty(), "other types untouched");
        assert_eq!(*all.lock().expect("lock"), vec![raw]);
    }

    #[test]
    fn disposed_handler_receives_nothing_after_resubscribe() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let (first, first_handler) = recorder();
        let (second, second_handler) = recorder();

        let subscription = registry.subscribe("chat:message", first_handler);
        assert!(subscription.unsubscribe(), "handler was registered");
        let _second = registry.subscribe("chat:message", second_handler);

        let (message, raw) = envelope("chat:message", json!({ "content": "hi" }));
        registry.dispatch(&message, &raw);

        assert!(first.lock().expect("lock").is_empty());
        assert_eq!(second.lock().expect("lock").len(), 1);
    }

    #[test]
    fn unsubscribe_removes_only_its_own_handler() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let (_, first) = recorder();
        let (_, second) = recorder();

        let first = registry.subscribe("review:added", first);
        let _second = registry.subscribe("review:added", second);
        assert_eq!(registry.count("review:added"), 2);

        let _removed = first.unsubscribe();

        assert_eq!(registry.count("review:added"), 1);
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut subscriptions = Vec::new();
        for index in 0..5 {
            let order = Arc::clone(&order);
            subscriptions.push(registry.subscribe(
                "product:sold",
                Arc::new(move |_: &Value| order.lock().expect("lock").push(index)),
            ));
        }

        let (message, raw) = envelope("product:sold", json!({}));
        registry.dispatch(&message, &raw);

        assert_eq!(*order.lock().expect("lock"), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let (seen, handler) = recorder();
        let _panics = registry.subscribe(
            "payment:failed",
            Arc::new(|_: &Value| panic!("subscriber bug")),
        );
        let _records = registry.subscribe("payment:failed", handler);

        let (message, raw) = envelope("payment:failed", json!({ "paymentId": "p-1" }));
        let invoked = registry.dispatch(&message, &raw);

        assert_eq!(invoked, 2);
        assert_eq!(seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_dispatch() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let handler_slot = Arc::clone(&slot);
        let handler_calls = Arc::clone(&calls);
        let subscription = registry.subscribe(
            "notification:new",
            Arc::new(move |_: &Value| {
                handler_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(subscription) = handler_slot.lock().expect("lock").take() {
                    let _removed = subscription.unsubscribe();
                }
            }),
        );
        *slot.lock().expect("lock") = Some(subscription);

        let (message, raw) = envelope("notification:new", json!({}));
        registry.dispatch(&message, &raw);
        registry.dispatch(&message, &raw);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count("notification:new"), 0);
    }

    #[test]
    fn unsubscribe_after_registry_dropped_is_harmless() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let (_, handler) = recorder();
        let subscription = registry.subscribe("payout:processed", handler);

        drop(registry);

        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn lifecycle_handlers_follow_the_same_contract() {
        let registry = Arc::new(LifecycleRegistry::default());
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let subscription = registry.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify("connect");
        assert!(subscription.unsubscribe());
        registry.notify("connect");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count(), 0);
    }
}
