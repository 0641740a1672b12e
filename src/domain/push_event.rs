//! Lifecycle and failure events emitted by the push core.
//!
//! Every registration change and every failure that cannot be returned to
//! its trigger is published as a [`PushEvent`] through the
//! [`super::EventBus`]. The bus is the error channel of the fire-and-forget
//! path.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ConnectionId, ConnectionKey};

/// Event emitted by the registry, dispatcher and executors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PushEvent {
    /// A connection was registered after a successful upgrade.
    ConnectionOpened {
        /// Registry key.
        key: ConnectionKey,
        /// Physical connection id.
        connection_id: ConnectionId,
        /// Registration timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A connection was removed from the registry.
    ConnectionClosed {
        /// Registry key.
        key: ConnectionKey,
        /// Physical connection id.
        connection_id: ConnectionId,
        /// Removal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// All connections of a session were removed.
    SessionInvalidated {
        /// Application scope.
        application: String,
        /// Session identifier.
        session_id: String,
        /// Number of connections removed.
        removed: usize,
        /// Invalidation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A send to one connection failed.
    SendFailed {
        /// Key of the failed connection.
        key: ConnectionKey,
        /// Failure description.
        reason: String,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A fire-and-forget task failed for a reason other than a send.
    TaskFailed {
        /// Task label given at submission.
        label: String,
        /// Failure description.
        reason: String,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A sweep removed closed connections.
    StaleConnectionsPruned {
        /// Number of entries removed.
        removed: usize,
        /// Sweep timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl PushEvent {
    /// Returns the connection key this event concerns, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&ConnectionKey> {
        match self {
            Self::ConnectionOpened { key, .. }
            | Self::ConnectionClosed { key, .. }
            | Self::SendFailed { key, .. } => Some(key),
            Self::SessionInvalidated { .. }
            | Self::TaskFailed { .. }
            | Self::StaleConnectionsPruned { .. } => None,
        }
    }

    /// Returns `true` for failure events.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::SendFailed { .. } | Self::TaskFailed { .. })
    }
}
