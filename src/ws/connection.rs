//! WebSocket-backed [`Connection`] and its socket loop.
//!
//! Sends never touch the socket directly. [`WsConnection::send`] places the
//! frame on a bounded outbound queue drained by a dedicated writer task, so
//! a slow client fills its own queue instead of stalling the executor. A
//! full queue counts as a failed send and closes the connection.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::domain::{Connection, ConnectionId, ConnectionKey, PushMessage, SharedConnection};
use crate::error::PushError;
use crate::service::PushDispatcher;

/// One upgraded WebSocket, as seen by registries and executors.
#[derive(Debug)]
pub struct WsConnection {
    id: ConnectionId,
    key: ConnectionKey,
    outbound: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl WsConnection {
    /// Creates a connection writing into `outbound`.
    ///
    /// Cancelling `closed` (directly or via [`Connection::close`]) tells the
    /// writer to send a close frame and stop.
    #[must_use]
    pub fn new(
        key: ConnectionKey,
        outbound: mpsc::Sender<Message>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            key,
            outbound,
            closed,
        }
    }

    fn fail(&self, reason: &str) -> PushError {
        self.closed.cancel();
        PushError::SendFailed {
            key: self.key.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn key(&self) -> &ConnectionKey {
        &self.key
    }

    fn is_open(&self) -> bool {
        !self.closed.is_cancelled() && !self.outbound.is_closed()
    }

    async fn send(&self, message: PushMessage) -> Result<(), PushError> {
        if !self.is_open() {
            return Err(PushError::ConnectionClosed(self.key.clone()));
        }
        let frame = match message {
            PushMessage::Text(text) => Message::text(text),
            PushMessage::Binary(bytes) => Message::Binary(bytes),
        };
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(self.fail("outbound queue full")),
            Err(TrySendError::Closed(_)) => Err(self.fail("writer stopped")),
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

/// Runs one WebSocket from upgrade to teardown.
///
/// - Registers a [`WsConnection`] for `key`.
/// - Forwards queued pushes to the socket from a writer task.
/// - Routes client frames to in-process listeners.
/// - Unregisters the connection when either side closes.
pub async fn run_connection(
    socket: WebSocket,
    key: ConnectionKey,
    dispatcher: PushDispatcher,
    queue_capacity: usize,
) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(queue_capacity.max(1));
    let closed = CancellationToken::new();

    let connection: SharedConnection =
        Arc::new(WsConnection::new(key.clone(), outbound_tx, closed.clone()));
    dispatcher
        .register_connection(Arc::clone(&connection))
        .await;

    let writer = tokio::spawn(write_loop(ws_tx, outbound_rx, closed.clone()));

    loop {
        tokio::select! {
            () = closed.cancelled() => break,
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher
                            .deliver_inbound(&key, PushMessage::Text(text.as_str().to_owned()))
                            .await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        dispatcher
                            .deliver_inbound(&key, PushMessage::Binary(bytes))
                            .await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%key, error = %e, "websocket read failed");
                        break;
                    }
                    // Pings are answered by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    connection.close().await;
    dispatcher.unregister_connection(&connection);
    if let Err(e) = writer.await {
        tracing::warn!(%key, error = %e, "websocket writer task failed");
    }
    tracing::debug!(%key, "ws connection closed");
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Message>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if ws_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            () = closed.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
    closed.cancel();
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ConnectionState;

    fn connection(capacity: usize) -> (WsConnection, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = WsConnection::new(
            ConnectionKey::new("appA", "sess1", "pageX"),
            tx,
            CancellationToken::new(),
        );
        (conn, rx)
    }

    #[tokio::test]
    async fn send_queues_frames_in_order() {
        let (conn, mut rx) = connection(4);
        assert!(conn.send(PushMessage::from("one")).await.is_ok());
        assert!(
            conn.send(PushMessage::Binary(bytes::Bytes::from_static(b"\x01")))
                .await
                .is_ok()
        );

        let Some(Message::Text(first)) = rx.recv().await else {
            panic!("expected text frame");
        };
        assert_eq!(first.as_str(), "one");
        assert!(matches!(rx.recv().await, Some(Message::Binary(_))));
    }

    #[tokio::test]
    async fn full_queue_fails_and_closes() {
        let (conn, _rx) = connection(1);
        assert!(conn.send(PushMessage::from("fits")).await.is_ok());

        let overflow = conn.send(PushMessage::from("overflow")).await;
        assert!(matches!(overflow, Err(PushError::SendFailed { .. })));
        assert_eq!(conn.state(), ConnectionState::Closed);

        let after = conn.send(PushMessage::from("late")).await;
        assert!(matches!(after, Err(PushError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn dropped_writer_means_closed() {
        let (conn, rx) = connection(4);
        drop(rx);
        assert!(!conn.is_open());
        assert!(matches!(
            conn.send(PushMessage::from("x")).await,
            Err(PushError::ConnectionClosed(_))
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (conn, _rx) = connection(4);
        conn.close().await;
        conn.close().await;
        assert!(!conn.is_open());
    }
}
