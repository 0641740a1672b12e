//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::ConnectionKey;

/// `GET /ws/{application}/{session_id}/{resource_id}` — Upgrade to a push
/// connection registered under the path's key.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((application, session_id, resource_id)): Path<(String, String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let key = ConnectionKey::new(application, session_id, resource_id);
    tracing::debug!(%key, "websocket upgrade requested");
    ws.on_upgrade(move |socket| {
        run_connection(
            socket,
            key,
            state.dispatcher,
            state.outbound_queue_capacity,
        )
    })
}
