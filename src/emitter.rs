//! Type-keyed publish/subscribe.
//!
//! Every event type names its own key through [`Event::kind`]; listeners
//! subscribe to one key and receive every event emitted under it, in
//! registration order.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An event that can be dispatched through a [`TypedEventEmitter`].
pub trait Event {
    /// The key listeners subscribe to.
    type Kind: Clone + Eq + Hash;

    /// The key this event is dispatched under.
    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`TypedEventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E> {
    id: ListenerId,
    listener: Listener<E>,
    once: bool,
}

struct Registry<E: Event> {
    next_id: u64,
    listeners: HashMap<E::Kind, Vec<Entry<E>>>,
}

/// A keyed event map with per-key, append-ordered listener lists.
pub struct TypedEventEmitter<E: Event> {
    registry: Mutex<Registry<E>>,
}

impl<E: Event> Default for TypedEventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for TypedEventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        let count: usize = registry.listeners.values().map(Vec::len).sum();
        f.debug_struct("TypedEventEmitter")
            .field("listeners", &count)
            .finish()
    }
}

impl<E: Event> TypedEventEmitter<E> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 0,
                listeners: HashMap::new(),
            }),
        }
    }

    // Listeners never run under the lock, so a panicking listener cannot
    // leave the registry half-updated.
    fn lock(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add<F>(&self, kind: E::Kind, listener: F, once: bool) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.entry(kind).or_default().push(Entry {
            id,
            listener: Arc::new(listener),
            once,
        });
        id
    }

    /// Subscribe to every event of `kind`.
    pub fn on<F>(&self, kind: E::Kind, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(kind, listener, false)
    }

    /// Subscribe to the next event of `kind` only.
    pub fn once<F>(&self, kind: E::Kind, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(kind, listener, true)
    }

    /// Remove a listener. Returns whether it was still registered.
    pub fn off(&self, kind: &E::Kind, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let Some(entries) = registry.listeners.get_mut(kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: &E::Kind) -> usize {
        self.lock().listeners.get(kind).map_or(0, Vec::len)
    }

    /// Dispatch `event` to the listeners registered for its kind.
    ///
    /// The listener list is snapshotted first: listeners added while this
    /// dispatch runs are not called by it, and `once` listeners are pruned
    /// before any of them run so re-entrant emits cannot call them twice.
    pub fn emit(&self, event: E) {
        let kind = event.kind();
        let snapshot: Vec<Listener<E>> = {
            let mut registry = self.lock();
            let Some(entries) = registry.listeners.get_mut(&kind) else {
                return;
            };
            let snapshot = entries.iter().map(|e| Arc::clone(&e.listener)).collect();
            entries.retain(|entry| !entry.once);
            snapshot
        };

        for listener in snapshot {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Test,
        Foo,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Test(u32),
        Foo(Vec<String>),
    }

    impl Event for TestEvent {
        type Kind = Kind;

        fn kind(&self) -> Kind {
            match self {
                TestEvent::Test(_) => Kind::Test,
                TestEvent::Foo(_) => Kind::Foo,
            }
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<TestEvent>>>, impl Fn(&TestEvent) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |e: &TestEvent| sink.lock().unwrap().push(e.clone()))
    }

    #[test]
    fn test_on_stores_a_listener() {
        let emitter = TypedEventEmitter::<TestEvent>::new();
        assert_eq!(emitter.listener_count(&Kind::Test), 0);
        emitter.on(Kind::Test, |_| {});
        assert_eq!(emitter.listener_count(&Kind::Test), 1);
        assert_eq!(emitter.listener_count(&Kind::Foo), 0);
    }

    #[test]
    fn test_off_removes_a_listener() {
        let emitter = TypedEventEmitter::<TestEvent>::new();
        let id = emitter.on(Kind::Test, |_| {});
        assert!(emitter.off(&Kind::Test, id));
        assert_eq!(emitter.listener_count(&Kind::Test), 0);
        assert!(!emitter.off(&Kind::Test, id));
    }

    #[test]
    fn test_listener_receives_value() {
        let emitter = TypedEventEmitter::<TestEvent>::new();
        let (seen, listener) = recorder();
        emitter.on(Kind::Test, listener);
        emitter.emit(TestEvent::Test(42));
        emitter.emit(TestEvent::Foo(vec!["ignored".into()]));
        assert_eq!(*seen.lock().unwrap(), vec![TestEvent::Test(42)]);
    }

    #[test]
    fn test_emit_without_listeners() {
        let emitter = TypedEventEmitter::<TestEvent>::new();
        emitter.emit(TestEvent::Test(42));
    }

    #[test]
    fn test_once_listener_is_removed_after_call() {
        let emitter = TypedEventEmitter::<TestEvent>::new();
        let (seen, listener) = recorder();
        emitter.once(Kind::Test, listener);
        emitter.emit(TestEvent::Test(42));
        assert_eq!(emitter.listener_count(&Kind::Test), 0);
        emitter.emit(TestEvent::Test(43));
        assert_eq!(*seen.lock().unwrap(), vec![TestEvent::Test(42)]);
    }

    #[test]
    fn test_listener_called_multiple_times() {
        let emitter = TypedEventEmitter::<TestEvent>::new();
        let (seen, listener) = recorder();
        emitter.on(Kind::Test, listener);
        emitter.emit(TestEvent::Test(42));
        emitter.emit(TestEvent::Test(0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TestEvent::Test(42), TestEvent::Test(0)]
        );
    }

    #[test]
    fn test_registration_order() {
        let emitter = TypedEventEmitter::<TestEvent>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            emitter.on(Kind::Test, move |_| order.lock().unwrap().push(i));
        }
        emitter.emit(TestEvent::Test(1));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_listener_added_during_emit_waits_for_next_dispatch() {
        let emitter = Arc::new(TypedEventEmitter::<TestEvent>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_emitter = Arc::clone(&emitter);
        let inner_calls = Arc::clone(&calls);
        emitter.once(Kind::Test, move |_| {
            let calls = Arc::clone(&inner_calls);
            inner_emitter.on(Kind::Test, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        });

        emitter.emit(TestEvent::Test(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        emitter.emit(TestEvent::Test(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_emit_does_not_repeat_once() {
        let emitter = Arc::new(TypedEventEmitter::<TestEvent>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_emitter = Arc::clone(&emitter);
        let inner_calls = Arc::clone(&calls);
        emitter.once(Kind::Test, move |_| {
            if inner_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                inner_emitter.emit(TestEvent::Test(2));
            }
        });

        emitter.emit(TestEvent::Test(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
