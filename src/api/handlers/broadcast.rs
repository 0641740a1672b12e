//! Scoped broadcast handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::BroadcastRequest;
use crate::app_state::AppState;
use crate::domain::PushPayload;
use crate::error::{ErrorResponse, PushError};
use crate::service::BroadcastReport;

/// `POST /broadcast` — Push a message to every connection in a scope.
///
/// Sends are scheduled, not awaited: individual send failures are reported
/// on the event bus and never fail the request.
///
/// # Errors
///
/// Returns [`PushError::InvalidRequest`] on a malformed message body.
#[utoipa::path(
    post,
    path = "/api/v1/broadcast",
    tag = "Push",
    summary = "Broadcast a message",
    description = "Delivers a text, binary or JSON message to every open connection matching `scope`. JSON bodies are wrapped in a push envelope. Optionally notifies in-process listeners.",
    request_body = BroadcastRequest,
    responses(
        (status = 202, description = "Sends scheduled", body = BroadcastReport),
        (status = 400, description = "Invalid message body", body = ErrorResponse),
    )
)]
pub async fn broadcast(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, PushError> {
    let message = req.message.into_message()?;
    let mut payload = PushPayload::new(message, req.scope.into());
    if req.notify_listeners {
        payload = payload.with_listeners();
    }

    let report = state.dispatcher.broadcast(payload).await;
    Ok((StatusCode::ACCEPTED, Json(report)))
}

/// Broadcast routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/broadcast", post(broadcast))
}
