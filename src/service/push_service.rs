//! Push dispatcher: resolves targets and hands sends to executors.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    ConnectionKey, ConnectionRegistry, EventBus, ListenerRegistry, PushEvent, PushMessage,
    PushPayload, ScopeFilter, SharedConnection,
};
use crate::error::PushError;
use crate::executor::{Executor, Task, TaskExecutor};

/// Outcome of one [`PushDispatcher::broadcast`] call.
///
/// Counts what was scheduled, not what was delivered: with a pooled
/// executor the sends may still be in flight when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct BroadcastReport {
    /// Connections a send task was submitted for.
    pub targeted: usize,
    /// Whether an in-process listener notification was submitted.
    pub listeners_scheduled: bool,
}

/// Orchestration layer for push messaging.
///
/// Stateless coordinator: owns shared handles to the
/// [`ConnectionRegistry`] for target lookup, the two executors and the
/// in-process [`ListenerRegistry`]. Wire sends go through the push
/// executor; listener notification goes through the event executor so the
/// two audiences can use different concurrency strategies.
#[derive(Debug, Clone)]
pub struct PushDispatcher {
    registry: Arc<dyn ConnectionRegistry>,
    push_executor: Arc<Executor>,
    event_executor: Arc<Executor>,
    listeners: Arc<ListenerRegistry>,
    events: EventBus,
}

impl PushDispatcher {
    /// Creates a new `PushDispatcher`.
    #[must_use]
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        push_executor: Arc<Executor>,
        event_executor: Arc<Executor>,
        listeners: Arc<ListenerRegistry>,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            push_executor,
            event_executor,
            listeners,
            events,
        }
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn ConnectionRegistry> {
        &self.registry
    }

    /// Returns a reference to the inner [`ListenerRegistry`].
    #[must_use]
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Registers a freshly upgraded connection under its own key.
    ///
    /// A different connection previously registered under the same key is
    /// closed: it is no longer reachable through the registry, so nothing
    /// else would ever close or prune it.
    pub async fn register_connection(&self, connection: SharedConnection) {
        let key = connection.key().clone();
        let connection_id = connection.id();
        if let Some(replaced) = self.registry.register(key.clone(), connection) {
            tracing::debug!(%key, replaced = %replaced.id(), "closing replaced connection");
            replaced.close().await;
        }
        let _ = self.events.publish(PushEvent::ConnectionOpened {
            key: key.clone(),
            connection_id,
            timestamp: Utc::now(),
        });
        tracing::info!(%key, %connection_id, "connection registered");
    }

    /// Removes a connection on transport teardown.
    ///
    /// Only removes the entry if it still refers to this connection.
    /// Returns `false` if it had already been removed or replaced.
    pub fn unregister_connection(&self, connection: &SharedConnection) -> bool {
        let key = connection.key();
        let connection_id = connection.id();
        let removed = self.registry.remove_connection(key, connection_id);
        if removed {
            let _ = self.events.publish(PushEvent::ConnectionClosed {
                key: key.clone(),
                connection_id,
                timestamp: Utc::now(),
            });
            tracing::info!(%key, %connection_id, "connection unregistered");
        }
        removed
    }

    /// Removes and closes every connection of a session.
    ///
    /// Returns the number of connections removed.
    pub async fn invalidate_session(&self, application: &str, session_id: &str) -> usize {
        let removed = self.registry.remove_session(application, session_id);
        for connection in &removed {
            connection.close().await;
        }
        let _ = self.events.publish(PushEvent::SessionInvalidated {
            application: application.to_string(),
            session_id: session_id.to_string(),
            removed: removed.len(),
            timestamp: Utc::now(),
        });
        tracing::info!(application, session_id, removed = removed.len(), "session invalidated");
        removed.len()
    }

    /// Delivers `payload` to every matching connection.
    ///
    /// Targets are snapshotted before the first send. Each send is its own
    /// task: a failure is reported to the event bus, the failed connection
    /// is removed from the registry, and the remaining sends continue. No
    /// send failure is returned here.
    pub async fn broadcast(&self, payload: PushPayload) -> BroadcastReport {
        let targets = self.registry.select(payload.scope());
        let targeted = targets.len();

        for connection in targets {
            let task = self.send_task(connection, payload.message().clone());
            self.push_executor.submit(task).await;
        }

        let listeners_scheduled = payload.notify_listeners();
        if listeners_scheduled {
            self.notify_listeners(payload).await;
        }

        tracing::debug!(targeted, listeners_scheduled, "broadcast dispatched");
        BroadcastReport {
            targeted,
            listeners_scheduled,
        }
    }

    /// Hands `payload` to in-process listeners only, through the event
    /// executor. Nothing is written to any connection.
    pub async fn notify_listeners(&self, payload: PushPayload) {
        let listeners = Arc::clone(&self.listeners);
        let task = Task::new("notify_listeners", async move {
            let notified = listeners.notify(&payload);
            tracing::trace!(notified, scope = %payload.scope(), "listeners notified");
            Ok(())
        });
        self.event_executor.submit(task).await;
    }

    /// Routes a frame received from a client to the listeners registered
    /// for that client's key.
    pub async fn deliver_inbound(&self, key: &ConnectionKey, message: PushMessage) {
        self.notify_listeners(PushPayload::new(message, ScopeFilter::Resource(key.clone())))
            .await;
    }

    /// Broadcasts `message` to every connection of `application`.
    pub async fn broadcast_all(
        &self,
        application: &str,
        message: impl Into<PushMessage>,
    ) -> BroadcastReport {
        self.broadcast(PushPayload::new(
            message,
            ScopeFilter::Application(application.to_string()),
        ))
        .await
    }

    /// Sends `message` to one connection and waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::ConnectionNotFound`] if no open connection is
    /// registered under `key`, or the send failure otherwise. A failed
    /// connection is removed from the registry before returning.
    pub async fn send_to(
        &self,
        key: &ConnectionKey,
        message: impl Into<PushMessage>,
    ) -> Result<(), PushError> {
        let connection = self
            .registry
            .lookup(key)
            .ok_or_else(|| PushError::ConnectionNotFound(key.clone()))?;
        let registry = Arc::clone(&self.registry);
        let message = message.into();
        let affinity = connection.id().affinity();
        self.push_executor
            .submit_and_wait(Some(affinity), async move {
                deliver(registry.as_ref(), &connection, message).await
            })
            .await
    }

    /// Removes closed connections missed by push-driven cleanup.
    pub fn sweep(&self) -> usize {
        let removed = self.registry.prune_closed();
        if removed > 0 {
            let _ = self.events.publish(PushEvent::StaleConnectionsPruned {
                removed,
                timestamp: Utc::now(),
            });
            tracing::info!(removed, "pruned stale connections");
        }
        removed
    }

    /// Stops pooled executor workers. Inline executors are unaffected.
    pub fn shutdown(&self) {
        self.push_executor.shutdown();
        self.event_executor.shutdown();
        tracing::info!(
            push = self.push_executor.name(),
            event = self.event_executor.name(),
            "executors shut down"
        );
    }

    fn send_task(&self, connection: SharedConnection, message: PushMessage) -> Task {
        let registry = Arc::clone(&self.registry);
        let affinity = connection.id().affinity();
        Task::new("push_send", async move {
            deliver(registry.as_ref(), &connection, message).await
        })
        .with_affinity(affinity)
    }
}

/// Sends one message; on failure, drops the connection from the registry.
async fn deliver(
    registry: &dyn ConnectionRegistry,
    connection: &SharedConnection,
    message: PushMessage,
) -> Result<(), PushError> {
    let result = connection.send(message).await;
    if result.is_err() && registry.remove_connection(connection.key(), connection.id()) {
        tracing::debug!(key = %connection.key(), "removed connection after failed send");
    }
    result
}
