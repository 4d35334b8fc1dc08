//! Named-event listener registry with panic isolation.
//!
//! Listeners are plain closures called synchronously on the emitting thread.
//! The registry lock is never held while a listener runs, so listeners may
//! subscribe, unsubscribe or emit re-entrantly. A panicking listener is caught
//! and reported to the emitter's error handler; delivery to the remaining
//! listeners continues.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use thiserror::Error;

use crate::error::{EmitterError, panic_message};

/// A registered event callback.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Receives listener panics.
pub type ErrorHandler = Arc<dyn Fn(&ListenerError) + Send + Sync>;

/// Handle-issued identity of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Remove the subscription after its first delivery.
    pub once: bool,
}

impl SubscribeOptions {
    pub fn once() -> Self {
        Self { once: true }
    }
}

/// A listener panicked while handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("listener {subscription} for '{event}' panicked: {message}")]
pub struct ListenerError {
    pub event: String,
    pub subscription: SubscriptionId,
    pub message: String,
}

/// Snapshot of a registered subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub event: String,
    pub once: bool,
    pub calls: u64,
}

struct Entry<E> {
    id: SubscriptionId,
    listener: Listener<E>,
    once: bool,
    calls: u64,
}

impl<E> Entry<E> {
    fn is_exhausted(&self) -> bool {
        self.once && self.calls > 0
    }
}

struct Registry<E> {
    listeners: HashMap<String, Vec<Entry<E>>>,
    next_id: u64,
    disposed: bool,
    on_error: ErrorHandler,
}

struct Target<E> {
    event: String,
    id: SubscriptionId,
    listener: Listener<E>,
}

trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool;
}

impl<E: 'static> Unsubscribe for Mutex<Registry<E>> {
    fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut registry = self.lock().unwrap_or_else(PoisonError::into_inner);
        if registry.disposed {
            return false;
        }
        registry.remove(event, id)
    }
}

impl<E> Registry<E> {
    fn remove(&mut self, event: &str, id: SubscriptionId) -> bool {
        let Some(list) = self.listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|entry| entry.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(event);
        }
        removed
    }

    fn contains(&self, event: &str, id: SubscriptionId) -> bool {
        self.listeners
            .get(event)
            .is_some_and(|list| list.iter().any(|entry| entry.id == id))
    }

    /// Claim every live subscription under `event` for one delivery.
    fn claim(&mut self, event: &str) -> Vec<Target<E>> {
        let Some(list) = self.listeners.get_mut(event) else {
            return Vec::new();
        };
        list.iter_mut()
            .filter(|entry| !entry.is_exhausted())
            .map(|entry| {
                entry.calls += 1;
                Target {
                    event: event.to_string(),
                    id: entry.id,
                    listener: Arc::clone(&entry.listener),
                }
            })
            .collect()
    }

    /// Move invoked subscriptions to the back of their list and drop spent
    /// `once` subscriptions.
    fn rotate(&mut self, invoked: &[(String, SubscriptionId)]) {
        let mut by_event: HashMap<&str, Vec<SubscriptionId>> = HashMap::new();
        for (event, id) in invoked {
            by_event.entry(event.as_str()).or_default().push(*id);
        }
        for (event, ids) in by_event {
            let Some(list) = self.listeners.get_mut(event) else {
                continue;
            };
            let (mut moved, mut kept): (Vec<_>, Vec<_>) =
                list.drain(..).partition(|entry| ids.contains(&entry.id));
            moved.retain(|entry| !entry.is_exhausted());
            kept.append(&mut moved);
            if kept.is_empty() {
                self.listeners.remove(event);
            } else {
                *list = kept;
            }
        }
    }
}

fn log_listener_error(error: &ListenerError) {
    tracing::error!(
        event = %error.event,
        subscription = %error.subscription,
        "Listener panicked: {}",
        error.message
    );
}

/// Per-name ordered listener lists.
///
/// Clones share the same registry.
pub struct EventEmitter<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> EventEmitter<E> {
    /// Create an emitter that logs listener panics.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                listeners: HashMap::new(),
                next_id: 0,
                disposed: false,
                on_error: Arc::new(log_listener_error),
            })),
        }
    }

    /// Route listener panics to `handler` instead of the log.
    pub fn with_error_handler(
        self,
        handler: impl Fn(&ListenerError) + Send + Sync + 'static,
    ) -> Self {
        self.lock().on_error = Arc::new(handler);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> Result<MutexGuard<'_, Registry<E>>, EmitterError> {
        let registry = self.lock();
        if registry.disposed {
            return Err(EmitterError::Disposed);
        }
        Ok(registry)
    }

    /// Register `listener` for `event`.
    ///
    /// Dropping the returned [`Subscription`] keeps the listener registered;
    /// call [`Subscription::dispose`] to remove it.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&E) + Send + Sync + 'static,
        options: SubscribeOptions,
    ) -> Result<Subscription, EmitterError> {
        let event = event.into();
        let mut registry = self.open()?;
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .listeners
            .entry(event.clone())
            .or_default()
            .push(Entry {
                id,
                listener: Arc::new(listener),
                once: options.once,
                calls: 0,
            });
        drop(registry);

        let weak = Arc::downgrade(&self.registry);
        let registry: Weak<dyn Unsubscribe> = weak;
        Ok(Subscription {
            id,
            event,
            registry,
        })
    }

    /// Deliver `payload` to the listeners of `event`. Returns how many ran.
    pub fn emit(&self, event: &str, payload: &E) -> Result<usize, EmitterError> {
        let (targets, on_error) = {
            let mut registry = self.open()?;
            (registry.claim(event), Arc::clone(&registry.on_error))
        };
        Ok(self.deliver(targets, payload, &on_error))
    }

    /// Deliver `payload` to the listeners of `event`, then remove all of them.
    pub fn fire(&self, event: &str, payload: &E) -> Result<usize, EmitterError> {
        let (targets, on_error) = {
            let mut registry = self.open()?;
            (registry.claim(event), Arc::clone(&registry.on_error))
        };
        let delivered = self.deliver(targets, payload, &on_error);
        let mut registry = self.lock();
        if !registry.disposed {
            registry.listeners.remove(event);
        }
        Ok(delivered)
    }

    /// Deliver `payload` to every listener of every event, in registration order.
    pub fn broadcast(&self, payload: &E) -> Result<usize, EmitterError> {
        let (targets, on_error) = {
            let mut registry = self.open()?;
            let events: Vec<String> = registry.listeners.keys().cloned().collect();
            let mut targets: Vec<Target<E>> = events
                .iter()
                .flat_map(|event| registry.claim(event))
                .collect();
            targets.sort_by_key(|target| target.id);
            (targets, Arc::clone(&registry.on_error))
        };
        Ok(self.deliver(targets, payload, &on_error))
    }

    fn deliver(&self, targets: Vec<Target<E>>, payload: &E, on_error: &ErrorHandler) -> usize {
        let mut invoked = Vec::with_capacity(targets.len());
        for target in targets {
            // Skip subscriptions removed by an earlier listener in this pass.
            if !self.lock().contains(&target.event, target.id) {
                continue;
            }
            let listener = &target.listener;
            if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                on_error(&ListenerError {
                    event: target.event.clone(),
                    subscription: target.id,
                    message: panic_message(cause.as_ref()),
                });
            }
            invoked.push((target.event, target.id));
        }

        let delivered = invoked.len();
        let mut registry = self.lock();
        if !registry.disposed {
            registry.rotate(&invoked);
        }
        delivered
    }

    /// Remove one subscription.
    pub fn remove_listener(&self, event: &str, id: SubscriptionId) -> Result<bool, EmitterError> {
        Ok(self.open()?.remove(event, id))
    }

    /// Remove every subscription for `event`. Returns how many were removed.
    pub fn remove_listeners(&self, event: &str) -> Result<usize, EmitterError> {
        Ok(self
            .open()?
            .listeners
            .remove(event)
            .map_or(0, |list| list.len()))
    }

    pub fn remove_all_listeners(&self) -> Result<(), EmitterError> {
        self.open()?.listeners.clear();
        Ok(())
    }

    /// Live subscriptions for `event`, in delivery order.
    pub fn get_listeners(&self, event: &str) -> Result<Vec<SubscriptionId>, EmitterError> {
        let registry = self.open()?;
        Ok(registry
            .listeners
            .get(event)
            .map(|list| {
                list.iter()
                    .filter(|entry| !entry.is_exhausted())
                    .map(|entry| entry.id)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn get_subscription(
        &self,
        event: &str,
        id: SubscriptionId,
    ) -> Result<Option<SubscriptionInfo>, EmitterError> {
        let registry = self.open()?;
        Ok(registry.listeners.get(event).and_then(|list| {
            list.iter()
                .find(|entry| entry.id == id)
                .map(|entry| SubscriptionInfo {
                    id: entry.id,
                    event: event.to_string(),
                    once: entry.once,
                    calls: entry.calls,
                })
        }))
    }

    pub fn has_listeners(&self, event: &str) -> Result<bool, EmitterError> {
        Ok(self.listener_count(event)? > 0)
    }

    pub fn listener_count(&self, event: &str) -> Result<usize, EmitterError> {
        Ok(self.get_listeners(event)?.len())
    }

    /// Remove every listener and refuse further registry operations.
    pub fn dispose(&self) {
        let mut registry = self.lock();
        registry.disposed = true;
        registry.listeners.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

impl<E: 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventEmitter")
            .field("events", &registry.listeners.len())
            .field("disposed", &registry.disposed)
            .finish()
    }
}

/// Disposer returned by [`EventEmitter::subscribe`].
pub struct Subscription {
    id: SubscriptionId,
    event: String,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the listener. Returns `false` if it was already gone.
    pub fn dispose(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unsubscribe(&self.event, self.id))
    }

    pub fn unsubscribe(&self) -> bool {
        self.dispose()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&u32) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &str| {
                let log = Arc::clone(&log);
                let name = name.to_string();
                Box::new(move |value: &u32| log.lock().unwrap().push(format!("{name}:{value}")))
                    as Box<dyn Fn(&u32) + Send + Sync>
            }
        };
        (log, make)
    }

    #[test]
    fn test_emit_in_registration_order() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();
        emitter.subscribe("tick", make("a"), SubscribeOptions::default()).unwrap();
        emitter.subscribe("tick", make("b"), SubscribeOptions::default()).unwrap();
        emitter.subscribe("tock", make("c"), SubscribeOptions::default()).unwrap();

        assert_eq!(emitter.emit("tick", &1).unwrap(), 2);
        assert_eq!(emitter.emit("missing", &2).unwrap(), 0);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let emitter = EventEmitter::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = emitter
            .subscribe(
                "done",
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                SubscribeOptions::once(),
            )
            .unwrap();

        for n in 0..5 {
            emitter.emit("done", &n).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!emitter.has_listeners("done").unwrap());
        assert_eq!(emitter.get_subscription("done", sub.id()).unwrap(), None);
    }

    #[test]
    fn test_once_listener_is_not_reentered() {
        let emitter = EventEmitter::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = emitter.clone();
        let counter = Arc::clone(&calls);
        emitter
            .subscribe(
                "loop",
                move |n| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    inner.emit("loop", &(n + 1)).unwrap();
                },
                SubscribeOptions::once(),
            )
            .unwrap();

        emitter.emit("loop", &0).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let emitter = EventEmitter::<u32>::new()
            .with_error_handler(move |err: &ListenerError| sink.lock().unwrap().push(err.clone()));
        let (log, make) = recorder();

        let bad = emitter
            .subscribe("job", |_| panic!("listener blew up"), SubscribeOptions::default())
            .unwrap();
        emitter.subscribe("job", make("good"), SubscribeOptions::default()).unwrap();

        assert_eq!(emitter.emit("job", &9).unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["good:9"]);

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, "job");
        assert_eq!(errors[0].subscription, bad.id());
        assert_eq!(errors[0].message, "listener blew up");
    }

    #[test]
    fn test_invoked_listeners_move_to_back() {
        let emitter = EventEmitter::<u32>::new();
        let inner = emitter.clone();
        let added = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&added);
        let first = emitter
            .subscribe(
                "ev",
                move |_| {
                    let mut slot = slot.lock().unwrap();
                    if slot.is_none() {
                        let sub = inner.subscribe("ev", |_| {}, SubscribeOptions::default());
                        *slot = Some(sub.unwrap().id());
                    }
                },
                SubscribeOptions::default(),
            )
            .unwrap();

        emitter.emit("ev", &0).unwrap();
        let late = (*added.lock().unwrap()).expect("listener subscribed during emit");
        assert_eq!(emitter.get_listeners("ev").unwrap(), vec![late, first.id()]);
    }

    #[test]
    fn test_subscription_dispose() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();
        let a = emitter.subscribe("x", make("a"), SubscribeOptions::default()).unwrap();
        let b = emitter.subscribe("x", make("b"), SubscribeOptions::default()).unwrap();
        assert_eq!(a.event(), "x");
        assert_ne!(a.id(), b.id());

        assert!(a.dispose());
        assert!(!a.unsubscribe());
        emitter.emit("x", &3).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b:3"]);

        assert!(emitter.remove_listener("x", b.id()).unwrap());
        assert!(!emitter.remove_listener("x", b.id()).unwrap());
        assert_eq!(emitter.listener_count("x").unwrap(), 0);
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();
        let victim = Arc::new(Mutex::new(None::<Subscription>));
        let target = Arc::clone(&victim);
        emitter
            .subscribe(
                "x",
                move |_| {
                    if let Some(sub) = target.lock().unwrap().as_ref() {
                        sub.dispose();
                    }
                },
                SubscribeOptions::default(),
            )
            .unwrap();
        let sub = emitter
            .subscribe("x", make("victim"), SubscribeOptions::default())
            .unwrap();
        *victim.lock().unwrap() = Some(sub);

        assert_eq!(emitter.emit("x", &1).unwrap(), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fire_is_scoped_and_clears() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();
        emitter.subscribe("a", make("a1"), SubscribeOptions::default()).unwrap();
        emitter.subscribe("a", make("a2"), SubscribeOptions::default()).unwrap();
        emitter.subscribe("b", make("b1"), SubscribeOptions::default()).unwrap();

        assert_eq!(emitter.fire("a", &5).unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a1:5", "a2:5"]);
        assert!(!emitter.has_listeners("a").unwrap());
        assert!(emitter.has_listeners("b").unwrap());
    }

    #[test]
    fn test_broadcast_reaches_every_event() {
        let emitter = EventEmitter::<u32>::new();
        let (log, make) = recorder();
        emitter.subscribe("a", make("a"), SubscribeOptions::default()).unwrap();
        emitter.subscribe("b", make("b"), SubscribeOptions::once()).unwrap();
        emitter.subscribe("c", make("c"), SubscribeOptions::default()).unwrap();

        assert_eq!(emitter.broadcast(&7).unwrap(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a:7", "b:7", "c:7"]);
        assert!(emitter.has_listeners("a").unwrap());
        assert!(!emitter.has_listeners("b").unwrap());
    }

    #[test]
    fn test_disposed_registry_rejects_operations() {
        let emitter = EventEmitter::<u32>::new();
        let sub = emitter.subscribe("x", |_| {}, SubscribeOptions::default()).unwrap();
        emitter.dispose();
        emitter.dispose();
        assert!(emitter.is_disposed());

        assert_eq!(emitter.emit("x", &1), Err(EmitterError::Disposed));
        assert_eq!(emitter.fire("x", &1), Err(EmitterError::Disposed));
        assert_eq!(emitter.broadcast(&1), Err(EmitterError::Disposed));
        assert!(matches!(
            emitter.subscribe("x", |_| {}, SubscribeOptions::default()),
            Err(EmitterError::Disposed)
        ));
        assert_eq!(emitter.has_listeners("x"), Err(EmitterError::Disposed));
        assert_eq!(emitter.remove_listeners("x"), Err(EmitterError::Disposed));
        assert_eq!(emitter.remove_all_listeners(), Err(EmitterError::Disposed));
        assert!(!sub.dispose());
    }
}
