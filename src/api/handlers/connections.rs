//! Connection handlers: targeted send, listing, session invalidation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ConnectionListResponse, ConnectionSummaryDto, ConnectionsQuery, InvalidateSessionResponse,
    SendMessageRequest,
};
use crate::app_state::AppState;
use crate::domain::ConnectionKey;
use crate::error::{ErrorResponse, PushError};

/// `POST /connections/{application}/{session_id}/{resource_id}/messages` —
/// Send to one connection and wait for the outcome.
///
/// # Errors
///
/// Returns [`PushError::ConnectionNotFound`] if nothing open is registered
/// under the key, or the send failure.
#[utoipa::path(
    post,
    path = "/api/v1/connections/{application}/{session_id}/{resource_id}/messages",
    tag = "Connections",
    summary = "Send to one connection",
    description = "Writes a message to the connection registered under the given key and waits for the result. A connection whose send fails is removed.",
    params(
        ("application" = String, Path, description = "Application name"),
        ("session_id" = String, Path, description = "Session identifier"),
        ("resource_id" = String, Path, description = "Resource identifier"),
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 204, description = "Message written"),
        (status = 400, description = "Invalid message body", body = ErrorResponse),
        (status = 404, description = "No open connection for key", body = ErrorResponse),
        (status = 502, description = "Send failed", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Path((application, session_id, resource_id)): Path<(String, String, String)>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, PushError> {
    let key = ConnectionKey::new(application, session_id, resource_id);
    let message = req.message.into_message()?;
    state.dispatcher.send_to(&key, message).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /connections` — List open connections, optionally by scope.
///
/// # Errors
///
/// Returns [`PushError::InvalidRequest`] if `session_id` is given alone.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Connections",
    summary = "List connections",
    description = "Returns open connections, optionally restricted to an application or session.",
    params(ConnectionsQuery),
    responses(
        (status = 200, description = "Connection list", body = ConnectionListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
    Query(query): Query<ConnectionsQuery>,
) -> Result<impl IntoResponse, PushError> {
    let scope = query.scope()?;
    let mut connections: Vec<ConnectionSummaryDto> = state
        .dispatcher
        .registry()
        .select(&scope)
        .iter()
        .map(ConnectionSummaryDto::from)
        .collect();
    connections.sort_by(|a, b| a.key.cmp(&b.key));

    let total = connections.len();
    Ok((
        StatusCode::OK,
        Json(ConnectionListResponse { connections, total }),
    ))
}

/// `DELETE /sessions/{application}/{session_id}` — Close every connection
/// of a session.
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{application}/{session_id}",
    tag = "Connections",
    summary = "Invalidate a session",
    description = "Removes every connection of the session from the registry and closes it. Idempotent.",
    params(
        ("application" = String, Path, description = "Application name"),
        ("session_id" = String, Path, description = "Session identifier"),
    ),
    responses(
        (status = 200, description = "Session invalidated", body = InvalidateSessionResponse),
    )
)]
pub async fn invalidate_session(
    State(state): State<AppState>,
    Path((application, session_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let removed = state
        .dispatcher
        .invalidate_session(&application, &session_id)
        .await;
    (
        StatusCode::OK,
        Json(InvalidateSessionResponse {
            application,
            session_id,
            removed,
        }),
    )
}

/// Connection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/connections", get(list_connections))
        .route(
            "/connections/{application}/{session_id}/{resource_id}/messages",
            post(send_message),
        )
        .route(
            "/sessions/{application}/{session_id}",
            delete(invalidate_session),
        )
}
