//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All push endpoints are mounted under `/api/v1`. The OpenAPI document is
//! served at `/api-docs/openapi.json`, with Swagger UI at `/swagger-ui`
//! when the `swagger-ui` feature is enabled.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "push-gateway",
        description = "Push messages to WebSocket clients addressed by application, session and resource."
    ),
    paths(
        handlers::broadcast::broadcast,
        handlers::connections::send_message,
        handlers::connections::list_connections,
        handlers::connections::invalidate_session,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::BroadcastRequest,
        dto::MessageDto,
        dto::ScopeDto,
        dto::SendMessageRequest,
        dto::ConnectionListResponse,
        dto::ConnectionSummaryDto,
        dto::InvalidateSessionResponse,
        crate::service::BroadcastReport,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Push", description = "Scoped broadcast"),
        (name = "Connections", description = "Targeted sends and connection management"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        axum::routing::get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use tower::ServiceExt;

    use super::*;
    use crate::config::PushConfig;
    use crate::domain::connection::testing::RecordingConnection;
    use crate::domain::{Connection, ConnectionKey, PushMessage, SharedConnection};

    fn state() -> AppState {
        AppState::from_config(&PushConfig::default())
    }

    async fn connect(state: &AppState, conn: RecordingConnection) -> Arc<RecordingConnection> {
        let conn = Arc::new(conn);
        state
            .dispatcher
            .register_connection(Arc::clone(&conn) as SharedConnection)
            .await;
        conn
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<&str>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("invalid request {method} {uri}");
        };
        crate::router(state.clone())
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {})
    }

    async fn json(response: Response) -> serde_json::Value {
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("unreadable body");
        };
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    #[tokio::test]
    async fn health_reports_connection_count() {
        let state = state();
        connect(&state, RecordingConnection::new(ConnectionKey::new("a", "s", "r"))).await;

        let response = call(&state, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 1);
    }

    #[tokio::test]
    async fn broadcast_to_session() {
        let state = state();
        let x = connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "sess1", "pageX"))).await;
        let y = connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "sess1", "pageY"))).await;
        let other = connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "sess2", "pageX"))).await;

        let response = call(
            &state,
            "POST",
            "/api/v1/broadcast",
            Some(r#"{"message":{"text":"hello"},"scope":{"type":"session","application":"appA","session_id":"sess1"}}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json(response).await;
        assert_eq!(body["targeted"], 2);
        assert_eq!(body["listeners_scheduled"], false);
        assert_eq!(x.sent(), vec![PushMessage::from("hello")]);
        assert_eq!(y.sent(), vec![PushMessage::from("hello")]);
        assert!(other.sent().is_empty());
    }

    #[tokio::test]
    async fn broadcast_rejects_empty_message() {
        let state = state();
        let response = call(
            &state,
            "POST",
            "/api/v1/broadcast",
            Some(r#"{"message":{},"scope":{"type":"all"}}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["code"], 1001);
    }

    #[tokio::test]
    async fn targeted_send_statuses() {
        let state = state();
        let ok = connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "s", "ok"))).await;
        connect(&state, RecordingConnection::failing(ConnectionKey::new("appA", "s", "broken"))).await;
        let message = Some(r#"{"message":{"text":"direct"}}"#);

        let sent = call(&state, "POST", "/api/v1/connections/appA/s/ok/messages", message).await;
        assert_eq!(sent.status(), StatusCode::NO_CONTENT);
        assert_eq!(ok.sent(), vec![PushMessage::from("direct")]);

        let failed = call(&state, "POST", "/api/v1/connections/appA/s/broken/messages", message).await;
        assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

        let missing = call(&state, "POST", "/api/v1/connections/appA/s/broken/messages", message).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let body = json(missing).await;
        assert_eq!(body["error"]["code"], 2001);
        assert_eq!(body["error"]["details"], "appA/s/broken");
    }

    #[tokio::test]
    async fn list_connections_by_scope() {
        let state = state();
        connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "s1", "b"))).await;
        connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "s1", "a"))).await;
        connect(&state, RecordingConnection::new(ConnectionKey::new("appB", "s1", "a"))).await;

        let all = json(call(&state, "GET", "/api/v1/connections", None).await).await;
        assert_eq!(all["total"], 3);

        let session = json(
            call(&state, "GET", "/api/v1/connections?application=appA&session_id=s1", None).await,
        )
        .await;
        assert_eq!(session["total"], 2);
        assert_eq!(session["connections"][0]["key"]["resource_id"], "a");
        assert_eq!(session["connections"][0]["state"], "open");

        let orphan = call(&state, "GET", "/api/v1/connections?session_id=s1", None).await;
        assert_eq!(orphan.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_session_closes_connections() {
        let state = state();
        let a = connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "s1", "a"))).await;
        let keep = connect(&state, RecordingConnection::new(ConnectionKey::new("appA", "s2", "a"))).await;

        let response = call(&state, "DELETE", "/api/v1/sessions/appA/s1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["removed"], 1);
        assert!(!a.is_open());
        assert!(keep.is_open());

        let again = json(call(&state, "DELETE", "/api/v1/sessions/appA/s1", None).await).await;
        assert_eq!(again["removed"], 0);
    }

    #[test]
    fn openapi_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/broadcast",
            "/api/v1/connections",
            "/api/v1/connections/{application}/{session_id}/{resource_id}/messages",
            "/api/v1/sessions/{application}/{session_id}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
