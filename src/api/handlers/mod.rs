//! REST endpoint handlers organized by resource.

pub mod broadcast;
pub mod connections;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(broadcast::routes())
        .merge(connections::routes())
}
