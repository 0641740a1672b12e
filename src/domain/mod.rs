//! Domain layer: connection identity, registries, payloads and events.
//!
//! This module contains the push-messaging model: the [`Connection`]
//! abstraction and its [`ConnectionKey`], the concurrent registries that map
//! keys to live connections, scoped payloads, in-process listeners and the
//! event bus that doubles as the failure channel.

pub mod connection;
pub mod connection_key;
pub mod event_bus;
pub mod indexed_registry;
pub mod listeners;
pub mod payload;
pub mod push_event;
pub mod registry;
pub mod scope;
pub mod sharded_registry;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use connection_key::ConnectionKey;
pub use event_bus::{EventBus, FailureSubscription};
pub use indexed_registry::SessionIndexedRegistry;
pub use listeners::{ListenerId, ListenerRegistry, ListenerScope};
pub use payload::{PushMessage, PushPayload};
pub use push_event::PushEvent;
pub use registry::{ConnectionRegistry, RegistryKind, SharedConnection};
pub use scope::ScopeFilter;
pub use sharded_registry::ShardedRegistry;
