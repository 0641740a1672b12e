//! Lock-sharded connection registry.
//!
//! [`ShardedRegistry`] keeps connections in a [`DashMap`], so writers on
//! unrelated keys never contend on a global lock. A second map indexes keys
//! by [`ConnectionId`] to keep every connection under at most one key.

use std::sync::Arc;

use dashmap::DashMap;

use super::registry::{ConnectionRegistry, RegistryEntry, SharedConnection};
use super::{ConnectionId, ConnectionKey};

/// Default registry: `DashMap` keyed by [`ConnectionKey`].
///
/// # Concurrency
///
/// - Lookups and writes on different keys proceed in parallel.
/// - Session and application lookups scan all shards, taking each shard's
///   read lock briefly; cost is linear in the number of connections.
/// - No shard guard is held across calls into the other map.
#[derive(Debug, Default)]
pub struct ShardedRegistry {
    connections: DashMap<ConnectionKey, SharedConnection>,
    keys_by_id: DashMap<ConnectionId, ConnectionKey>,
}

impl ShardedRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_where(&self, pred: impl Fn(&ConnectionKey) -> bool) -> Vec<RegistryEntry> {
        self.connections
            .iter()
            .filter(|entry| pred(entry.key()))
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}

impl ConnectionRegistry for ShardedRegistry {
    fn register(
        &self,
        key: ConnectionKey,
        connection: SharedConnection,
    ) -> Option<SharedConnection> {
        let id = connection.id();

        if let Some(previous_key) = self.keys_by_id.insert(id, key.clone())
            && previous_key != key
        {
            self.connections
                .remove_if(&previous_key, |_, current| current.id() == id);
        }

        let replaced = self.connections.insert(key.clone(), connection)?;
        if replaced.id() == id {
            return None;
        }
        self.keys_by_id
            .remove_if(&replaced.id(), |_, mapped| *mapped == key);
        Some(replaced)
    }

    fn remove(&self, key: &ConnectionKey) -> Option<SharedConnection> {
        let (_, connection) = self.connections.remove(key)?;
        self.keys_by_id
            .remove_if(&connection.id(), |_, mapped| mapped == key);
        Some(connection)
    }

    fn remove_connection(&self, key: &ConnectionKey, id: ConnectionId) -> bool {
        if self
            .connections
            .remove_if(key, |_, current| current.id() == id)
            .is_none()
        {
            return false;
        }
        self.keys_by_id.remove_if(&id, |_, mapped| mapped == key);
        true
    }

    fn get(&self, key: &ConnectionKey) -> Option<SharedConnection> {
        self.connections
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn session_entries(&self, application: &str, session_id: &str) -> Vec<RegistryEntry> {
        self.collect_where(|key| key.in_session(application, session_id))
    }

    fn application_entries(&self, application: &str) -> Vec<RegistryEntry> {
        self.collect_where(|key| key.application() == application)
    }

    fn entries(&self) -> Vec<RegistryEntry> {
        self.collect_where(|_| true)
    }

    fn remove_session(&self, application: &str, session_id: &str) -> Vec<SharedConnection> {
        let mut removed = Vec::new();
        self.connections.retain(|key, connection| {
            if key.in_session(application, session_id) {
                removed.push((key.clone(), Arc::clone(connection)));
                false
            } else {
                true
            }
        });
        removed
            .into_iter()
            .map(|(key, connection)| {
                self.keys_by_id
                    .remove_if(&connection.id(), |_, mapped| *mapped == key);
                connection
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.connections.len()
    }
}
