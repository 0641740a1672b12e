//! Session-indexed connection registry behind a single lock.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use super::registry::{ConnectionRegistry, RegistryEntry, SharedConnection};
use super::{ConnectionId, ConnectionKey};

type SessionScope = (String, String);

/// Registry grouping connections by `(application, session)`.
///
/// One `std::sync::RwLock` guards the whole index. It is only held for
/// map operations, never across an `.await`, so the lock is brief and
/// session-wide lookups cost O(resources in that session).
#[derive(Debug, Default)]
pub struct SessionIndexedRegistry {
    index: RwLock<Index>,
}

#[derive(Debug, Default)]
struct Index {
    sessions: HashMap<SessionScope, HashMap<String, SharedConnection>>,
    keys_by_id: HashMap<ConnectionId, ConnectionKey>,
}

fn scope_of(key: &ConnectionKey) -> SessionScope {
    (key.application().to_string(), key.session_id().to_string())
}

impl Index {
    fn get(&self, key: &ConnectionKey) -> Option<&SharedConnection> {
        self.sessions
            .get(&scope_of(key))
            .and_then(|resources| resources.get(key.resource_id()))
    }

    /// Removes `key`, optionally only if it maps to `expected`.
    fn take(
        &mut self,
        key: &ConnectionKey,
        expected: Option<ConnectionId>,
    ) -> Option<SharedConnection> {
        let scope = scope_of(key);
        let Entry::Occupied(mut session) = self.sessions.entry(scope) else {
            return None;
        };
        let resources = session.get_mut();
        if let Some(expected) = expected
            && resources.get(key.resource_id()).map(|c| c.id()) != Some(expected)
        {
            return None;
        }
        let removed = resources.remove(key.resource_id())?;
        if resources.is_empty() {
            session.remove();
        }
        if self.keys_by_id.get(&removed.id()) == Some(key) {
            self.keys_by_id.remove(&removed.id());
        }
        Some(removed)
    }

    fn insert(
        &mut self,
        key: ConnectionKey,
        connection: SharedConnection,
    ) -> Option<SharedConnection> {
        let id = connection.id();
        if let Some(previous_key) = self.keys_by_id.insert(id, key.clone())
            && previous_key != key
        {
            self.take(&previous_key, Some(id));
        }

        let replaced = self
            .sessions
            .entry(scope_of(&key))
            .or_default()
            .insert(key.resource_id().to_string(), connection)?;
        if replaced.id() == id {
            return None;
        }
        if self.keys_by_id.get(&replaced.id()) == Some(&key) {
            self.keys_by_id.remove(&replaced.id());
        }
        Some(replaced)
    }

    fn collect_where(&self, pred: impl Fn(&SessionScope) -> bool) -> Vec<RegistryEntry> {
        self.sessions
            .iter()
            .filter(|&(scope, _)| pred(scope))
            .flat_map(|((application, session_id), resources)| {
                resources.iter().map(move |(resource_id, connection)| {
                    (
                        ConnectionKey::new(application, session_id, resource_id),
                        Arc::clone(connection),
                    )
                })
            })
            .collect()
    }
}

impl SessionIndexedRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Index) -> T) -> T {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        f(&index)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Index) -> T) -> T {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut index)
    }
}

impl ConnectionRegistry for SessionIndexedRegistry {
    fn register(
        &self,
        key: ConnectionKey,
        connection: SharedConnection,
    ) -> Option<SharedConnection> {
        self.write(|index| index.insert(key, connection))
    }

    fn remove(&self, key: &ConnectionKey) -> Option<SharedConnection> {
        self.write(|index| index.take(key, None))
    }

    fn remove_connection(&self, key: &ConnectionKey, id: ConnectionId) -> bool {
        self.write(|index| index.take(key, Some(id)).is_some())
    }

    fn get(&self, key: &ConnectionKey) -> Option<SharedConnection> {
        self.read(|index| index.get(key).map(Arc::clone))
    }

    fn session_entries(&self, application: &str, session_id: &str) -> Vec<RegistryEntry> {
        self.read(|index| {
            let scope = (application.to_string(), session_id.to_string());
            index.sessions.get(&scope).map_or_else(Vec::new, |resources| {
                resources
                    .iter()
                    .map(|(resource_id, connection)| {
                        (
                            ConnectionKey::new(application, session_id, resource_id),
                            Arc::clone(connection),
                        )
                    })
                    .collect()
            })
        })
    }

    fn application_entries(&self, application: &str) -> Vec<RegistryEntry> {
        self.read(|index| index.collect_where(|(app, _)| app == application))
    }

    fn entries(&self) -> Vec<RegistryEntry> {
        self.read(|index| index.collect_where(|_| true))
    }

    fn remove_session(&self, application: &str, session_id: &str) -> Vec<SharedConnection> {
        self.write(|index| {
            let scope = (application.to_string(), session_id.to_string());
            let Some(resources) = index.sessions.remove(&scope) else {
                return Vec::new();
            };
            resources
                .into_values()
                .inspect(|connection| {
                    if index
                        .keys_by_id
                        .get(&connection.id())
                        .is_some_and(|key| key.in_session(application, session_id))
                    {
                        index.keys_by_id.remove(&connection.id());
                    }
                })
                .collect()
        })
    }

    fn len(&self) -> usize {
        self.read(|index| index.sessions.values().map(HashMap::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::testing::RecordingConnection;
    use crate::domain::registry::contract;

    #[test]
    fn distinct_keys_never_alias() {
        contract::distinct_keys_never_alias(&SessionIndexedRegistry::new());
    }

    #[test]
    fn reregister_replaces() {
        contract::reregister_replaces(&SessionIndexedRegistry::new());
    }

    #[test]
    fn remove_then_lookup_is_absent() {
        contract::remove_then_lookup_is_absent(&SessionIndexedRegistry::new());
    }

    #[test]
    fn conditional_removal_keeps_newer() {
        contract::conditional_removal_keeps_newer(&SessionIndexedRegistry::new());
    }

    #[test]
    fn moving_connection_drops_old_key() {
        contract::moving_connection_drops_old_key(&SessionIndexedRegistry::new());
    }

    #[test]
    fn stale_entries_are_hidden_and_pruned() {
        contract::stale_entries_are_hidden_and_pruned(&SessionIndexedRegistry::new());
    }

    #[test]
    fn session_removal() {
        contract::session_removal(&SessionIndexedRegistry::new());
    }

    #[test]
    fn select_by_scope() {
        contract::select_by_scope(&SessionIndexedRegistry::new());
    }

    #[test]
    fn register_then_remove_leaves_empty_scope() {
        contract::register_then_remove_leaves_empty_scope(&SessionIndexedRegistry::new());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_of_distinct_keys() {
        let registry = Arc::new(SessionIndexedRegistry::new());
        let mut handles = Vec::new();
        for n in 0..64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let key = ConnectionKey::new("app", format!("s{}", n % 8), format!("r{n}"));
                registry.register(key.clone(), Arc::new(RecordingConnection::new(key.clone())));
                if n % 2 == 0 {
                    registry.remove(&key);
                }
            }));
        }
        for handle in handles {
            assert!(handle.await.is_ok());
        }
        assert_eq!(registry.len(), 32);
        assert_eq!(registry.read(|index| index.keys_by_id.len()), 32);
        for session in 0..8 {
            let expected = if session % 2 == 0 { 0 } else { 8 };
            assert_eq!(
                registry.lookup_by_scope("app", &format!("s{session}")).len(),
                expected
            );
        }
    }

    #[test]
    fn empty_sessions_are_dropped_from_index() {
        let registry = SessionIndexedRegistry::new();
        let key = ConnectionKey::new("a", "s", "r");
        let conn = RecordingConnection::new(key.clone());
        registry.register(key.clone(), Arc::new(conn));
        registry.remove(&key);
        assert!(registry.read(|index| index.sessions.is_empty()));
    }
}
