//! Live connection abstraction.
//!
//! A [`Connection`] is owned by the transport that created it (the upgraded
//! socket handler). Registries only hold shared handles; closing a
//! connection never touches a registry and removing a registry entry never
//! closes the connection.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ConnectionKey, PushMessage};
use crate::error::PushError;

/// Unique identifier of one physical connection.
///
/// Wraps a UUID v4 generated at upgrade time. Two connections opened under
/// the same [`ConnectionKey`] (a page reload, say) always have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Stable lane hint for executors that shard work by connection.
    #[must_use]
    pub fn affinity(&self) -> u64 {
        let (hi, lo) = self.0.as_u64_pair();
        hi ^ lo
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport is usable.
    Open,
    /// Transport was closed or failed; never reopens.
    Closed,
}

/// One live bidirectional channel to a single client.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Physical identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Key the connection was opened under.
    fn key(&self) -> &ConnectionKey;

    /// Returns `true` until the connection is closed or a send fails.
    fn is_open(&self) -> bool;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState {
        if self.is_open() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Writes one message to the client.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::ConnectionClosed`] if the connection is already
    /// closed, or [`PushError::SendFailed`] if the transport rejects the
    /// message. A failed send leaves the connection closed.
    async fn send(&self, message: PushMessage) -> Result<(), PushError>;

    /// Closes the connection. Idempotent.
    async fn close(&self);
}
