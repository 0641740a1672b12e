//! In-process payload listeners.
//!
//! Server-side code (a page model, an audit hook) subscribes here to be told
//! about payloads without going through a socket. Notification runs on the
//! event-bus executor, separately from wire sends.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::{ConnectionKey, PushPayload};

/// Callback invoked with each matching payload.
pub type ListenerFn = Arc<dyn Fn(&PushPayload) + Send + Sync>;

/// Handle returned by [`ListenerRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Which payloads a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerScope {
    /// Every payload routed to listeners.
    All,
    /// Payloads whose scope includes this key.
    Resource(ConnectionKey),
}

impl ListenerScope {
    /// Returns `true` if `payload` should reach a listener with this scope.
    #[must_use]
    pub fn accepts(&self, payload: &PushPayload) -> bool {
        match self {
            Self::All => true,
            Self::Resource(key) => payload.scope().matches(key),
        }
    }
}

/// Concurrent set of in-process listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: DashMap<ListenerId, (ListenerScope, ListenerFn)>,
}

impl ListenerRegistry {
    /// Creates an empty listener registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener and returns its handle.
    pub fn subscribe<F>(&self, scope: ListenerScope, listener: F) -> ListenerId
    where
        F: Fn(&PushPayload) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, (scope, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Number of subscribed listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invokes every listener whose scope accepts `payload`.
    ///
    /// Listeners run over a snapshot, so they may subscribe or unsubscribe
    /// from inside the callback. A panicking listener is logged and skipped.
    /// Returns the number of listeners that completed.
    pub fn notify(&self, payload: &PushPayload) -> usize {
        let targets: Vec<(ListenerId, ListenerFn)> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().0.accepts(payload))
            .map(|entry| (*entry.key(), Arc::clone(&entry.value().1)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in targets {
            match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::error!(listener = id.0, "payload listener panicked"),
            }
        }
        delivered
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::domain::ScopeFilter;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&PushPayload) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &PushPayload| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn resource_listener_only_sees_matching_scope() {
        let registry = ListenerRegistry::new();
        let page_x = ConnectionKey::new("appA", "sess1", "pageX");
        let (count, listener) = counter();
        registry.subscribe(ListenerScope::Resource(page_x.clone()), listener);

        registry.notify(&PushPayload::new("a", ScopeFilter::session("appA", "sess1")));
        registry.notify(&PushPayload::new("b", ScopeFilter::session("appA", "sess2")));
        registry.notify(&PushPayload::new("c", ScopeFilter::Resource(page_x)));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wildcard_listener_sees_everything() {
        let registry = ListenerRegistry::new();
        let (count, listener) = counter();
        registry.subscribe(ListenerScope::All, listener);
        registry.notify(&PushPayload::new("x", ScopeFilter::Application("z".into())));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = ListenerRegistry::new();
        let (count, listener) = counter();
        let id = registry.subscribe(ListenerScope::All, listener);
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.notify(&PushPayload::new("x", ScopeFilter::All));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        registry.subscribe(ListenerScope::All, |_| panic!("listener bug"));
        let (count, listener) = counter();
        registry.subscribe(ListenerScope::All, listener);

        let delivered = registry.notify(&PushPayload::new("x", ScopeFilter::All));
        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
