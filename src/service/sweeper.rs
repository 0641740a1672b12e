//! Periodic removal of closed connections.
//!
//! Cleanup is push-driven: the socket handler unregisters its connection
//! when the socket ends, and a failed send removes its target. The sweeper
//! only catches entries both paths missed, which bounds how long a closed
//! connection can linger in the registry to one interval. Lookups already
//! skip closed entries in the meantime.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::PushDispatcher;

/// Spawns a task calling [`PushDispatcher::sweep`] every `interval` until
/// `shutdown` is cancelled.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
#[must_use]
pub fn spawn_sweeper(
    dispatcher: PushDispatcher,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    dispatcher.sweep();
                }
            }
        }
        tracing::debug!("connection sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::connection::testing::RecordingConnection;
    use crate::domain::{ConnectionKey, EventBus, ListenerRegistry, RegistryKind, SharedConnection};
    use crate::executor::{Executor, ExecutorStrategy, FailureReporter};

    #[tokio::test]
    async fn sweeper_prunes_until_cancelled() {
        let bus = EventBus::new(16);
        let reporter = FailureReporter::new(bus.clone());
        let inline = Arc::new(Executor::from_strategy(ExecutorStrategy::Inline, reporter));
        let dispatcher = PushDispatcher::new(
            RegistryKind::Sharded.build(),
            Arc::clone(&inline),
            inline,
            Arc::new(ListenerRegistry::new()),
            bus,
        );
        let conn = Arc::new(RecordingConnection::new(ConnectionKey::new("a", "s", "r")));
        dispatcher
            .register_connection(Arc::clone(&conn) as SharedConnection)
            .await;
        conn.mark_closed();

        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(
            dispatcher.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        for _ in 0..50 {
            if dispatcher.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dispatcher.registry().is_empty());

        shutdown.cancel();
        assert!(handle.await.is_ok());
    }
}
