//! # push-gateway
//!
//! WebSocket push-messaging gateway. Clients open a WebSocket addressed by
//! `(application, session, resource)`; server-side code pushes messages to
//! one connection, a session, an application or everything, and can notify
//! in-process listeners with the same payload.
//!
//! Which connection registry and which executors run the pushes are chosen
//! at startup from configuration; everything above them is unaware of the
//! choice.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + WsConnection (ws/)
//!     │
//!     ├── PushDispatcher + sweeper (service/)
//!     │
//!     ├── Push / event executors (executor/)
//!     │       └── FailureReporter ──► EventBus
//!     │
//!     └── ConnectionRegistry, ListenerRegistry (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod service;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the full HTTP application: REST API, WebSocket endpoint and
/// middleware, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws/{application}/{session_id}/{resource_id}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
