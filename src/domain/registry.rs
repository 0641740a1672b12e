//! Connection registry contract and strategy selection.
//!
//! A [`ConnectionRegistry`] maps each [`ConnectionKey`] to at most one live
//! [`Connection`]. Implementations provide the raw, non-blocking map
//! operations; the trait layers stale-aware lookups on top so that a
//! connection whose transport already closed is reported as absent and
//! pruned instead of being handed to a sender.
//!
//! Two strategies exist, chosen once at startup via [`RegistryKind`]:
//!
//! - [`ShardedRegistry`]: lock-sharded `DashMap`, no global lock; scope
//!   lookups scan the map.
//! - [`SessionIndexedRegistry`]: one `RwLock` over a session index; O(1)
//!   session lookups, every write briefly serialized.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{
    Connection, ConnectionId, ConnectionKey, ScopeFilter, SessionIndexedRegistry, ShardedRegistry,
};

/// Shared handle to a registered connection.
pub type SharedConnection = Arc<dyn Connection>;

/// A registry key together with the connection mapped under it.
pub type RegistryEntry = (ConnectionKey, SharedConnection);

/// Concurrent map from [`ConnectionKey`] to [`Connection`].
///
/// # Concurrency
///
/// Every method is atomic with respect to concurrent callers and never
/// waits on I/O: readers never observe a half-inserted or half-removed
/// entry. Scope lookups return snapshots, so callers can iterate and send
/// without holding any registry lock.
///
/// # Invariants
///
/// - A key maps to at most one connection; `register` replaces.
/// - A connection is mapped under at most one key; registering an
///   already-registered connection under a new key drops the old mapping.
pub trait ConnectionRegistry: Send + Sync + fmt::Debug {
    /// Inserts or replaces the mapping for `key`.
    ///
    /// Returns the connection previously mapped under `key`, if it was a
    /// different one. The replaced connection is not closed; that belongs
    /// to whoever detects it is stale.
    fn register(&self, key: ConnectionKey, connection: SharedConnection)
    -> Option<SharedConnection>;

    /// Removes the mapping for `key` if present.
    fn remove(&self, key: &ConnectionKey) -> Option<SharedConnection>;

    /// Removes the mapping for `key` only if it still points at `id`.
    ///
    /// Transport teardown uses this so a late cleanup of an old connection
    /// cannot evict a newer registration under the same key.
    fn remove_connection(&self, key: &ConnectionKey, id: ConnectionId) -> bool;

    /// Returns the raw mapping for `key`, open or not.
    fn get(&self, key: &ConnectionKey) -> Option<SharedConnection>;

    /// Snapshot of raw entries for one session.
    fn session_entries(&self, application: &str, session_id: &str) -> Vec<RegistryEntry>;

    /// Snapshot of raw entries for one application.
    fn application_entries(&self, application: &str) -> Vec<RegistryEntry>;

    /// Snapshot of all raw entries.
    fn entries(&self) -> Vec<RegistryEntry>;

    /// Removes every entry of a session and returns the removed connections
    /// so the caller can close them.
    fn remove_session(&self, application: &str, session_id: &str) -> Vec<SharedConnection>;

    /// Number of entries, including not yet pruned stale ones.
    fn len(&self) -> usize;

    /// Returns `true` if the registry holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the open connection registered under `key`.
    ///
    /// A mapped but closed connection is treated as not found and its entry
    /// is removed.
    fn lookup(&self, key: &ConnectionKey) -> Option<SharedConnection> {
        let connection = self.get(key)?;
        if connection.is_open() {
            Some(connection)
        } else {
            evict_stale(self, key, connection.id());
            None
        }
    }

    /// Open connections of one session, as a restartable snapshot.
    fn lookup_by_scope(&self, application: &str, session_id: &str) -> Vec<SharedConnection> {
        open_only(self, self.session_entries(application, session_id))
    }

    /// Open connections of one application.
    fn lookup_by_application(&self, application: &str) -> Vec<SharedConnection> {
        open_only(self, self.application_entries(application))
    }

    /// All open connections.
    fn connections(&self) -> Vec<SharedConnection> {
        open_only(self, self.entries())
    }

    /// Open connections selected by `scope`, using the narrowest lookup the
    /// scope allows.
    fn select(&self, scope: &ScopeFilter) -> Vec<SharedConnection> {
        match scope {
            ScopeFilter::All => self.connections(),
            ScopeFilter::Application(application) => self.lookup_by_application(application),
            ScopeFilter::Session {
                application,
                session_id,
            } => self.lookup_by_scope(application, session_id),
            ScopeFilter::Resource(key) => self.lookup(key).into_iter().collect(),
            ScopeFilter::Predicate(_) => {
                let matching = self
                    .entries()
                    .into_iter()
                    .filter(|(key, _)| scope.matches(key))
                    .collect();
                open_only(self, matching)
            }
        }
    }

    /// Removes every entry whose connection is closed. Returns the number
    /// removed.
    fn prune_closed(&self) -> usize {
        self.entries()
            .into_iter()
            .filter(|(_, connection)| !connection.is_open())
            .filter(|(key, connection)| self.remove_connection(key, connection.id()))
            .count()
    }
}

fn evict_stale<R: ConnectionRegistry + ?Sized>(
    registry: &R,
    key: &ConnectionKey,
    id: ConnectionId,
) {
    if registry.remove_connection(key, id) {
        tracing::debug!(%key, connection_id = %id, "evicted stale connection");
    }
}

/// Keeps open connections, evicting the stale ones found along the way.
fn open_only<R: ConnectionRegistry + ?Sized>(
    registry: &R,
    entries: Vec<RegistryEntry>,
) -> Vec<SharedConnection> {
    let mut open = Vec::with_capacity(entries.len());
    for (key, connection) in entries {
        if connection.is_open() {
            open.push(connection);
        } else {
            evict_stale(registry, &key, connection.id());
        }
    }
    open
}

/// Registry strategies selectable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryKind {
    /// [`ShardedRegistry`].
    #[default]
    Sharded,
    /// [`SessionIndexedRegistry`].
    SessionIndexed,
}

impl RegistryKind {
    /// Constructs an empty registry of this kind.
    #[must_use]
    pub fn build(self) -> Arc<dyn ConnectionRegistry> {
        match self {
            Self::Sharded => Arc::new(ShardedRegistry::new()),
            Self::SessionIndexed => Arc::new(SessionIndexedRegistry::new()),
        }
    }
}

impl FromStr for RegistryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sharded" => Ok(Self::Sharded),
            "session_indexed" | "session-indexed" => Ok(Self::SessionIndexed),
            other => Err(format!("unknown connection registry: {other}")),
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sharded => f.write_str("sharded"),
            Self::SessionIndexed => f.write_str("session_indexed"),
        }
    }
}
