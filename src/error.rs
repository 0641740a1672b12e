//! Push error types with HTTP status code mapping.
//!
//! [`PushError`] is the central error type for the gateway. The same enum
//! travels through executor tasks, the failure reporter and the REST layer,
//! where each variant maps to a specific HTTP status code and structured
//! JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ConnectionKey;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "connection not found: shop/3F2A/page-7",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`PushError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                     |
/// |-----------|-----------------|---------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request                 |
/// | 2000–2999 | State/Not Found | 404 Not Found / 410 Gone        |
/// | 3000–3999 | Server          | 500 Internal Server Error       |
/// | 5000–5999 | Delivery        | 502 Bad Gateway / 503 Unavailable |
#[derive(Debug, Clone, thiserror::Error)]
pub enum PushError {
    /// No connection is registered under the given key.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionKey),

    /// A connection is registered under the key but its transport is closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionKey),

    /// Writing to a connection failed.
    #[error("send to {key} failed: {reason}")]
    SendFailed {
        /// Key of the connection the send was addressed to.
        key: ConnectionKey,
        /// Transport-level reason.
        reason: String,
    },

    /// A submitted task returned an error that is not a send failure.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// A submitted task panicked.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// A worker lane queue is full and rejected the task.
    #[error("executor lane {lane} is saturated")]
    ExecutorSaturated {
        /// Index of the rejecting lane.
        lane: usize,
    },

    /// The executor's workers have shut down.
    #[error("executor has shut down")]
    ExecutorShutdown,

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PushError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::ConnectionNotFound(_) => 2001,
            Self::ConnectionClosed(_) => 2002,
            Self::Internal(_) => 3000,
            Self::TaskFailed(_) => 3001,
            Self::TaskPanicked(_) => 3002,
            Self::ExecutorShutdown => 3003,
            Self::SendFailed { .. } => 5001,
            Self::ExecutorSaturated { .. } => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionClosed(_) => StatusCode::GONE,
            Self::TaskFailed(_) | Self::TaskPanicked(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::SendFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::ExecutorSaturated { .. } | Self::ExecutorShutdown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Returns the connection key this error concerns, if any.
    #[must_use]
    pub const fn connection_key(&self) -> Option<&ConnectionKey> {
        match self {
            Self::ConnectionNotFound(key)
            | Self::ConnectionClosed(key)
            | Self::SendFailed { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl IntoResponse for PushError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = self.connection_key().map(ToString::to_string);
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
