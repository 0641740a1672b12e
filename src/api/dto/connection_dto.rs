//! Connection listing and session DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ConnectionKey, ConnectionState, ScopeFilter, SharedConnection};
use crate::error::PushError;

/// Query parameters for `GET /api/v1/connections`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConnectionsQuery {
    /// Restrict to one application.
    pub application: Option<String>,
    /// Restrict to one session; requires `application`.
    pub session_id: Option<String>,
}

impl ConnectionsQuery {
    /// Scope selected by the query.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::InvalidRequest`] if `session_id` is given
    /// without `application`.
    pub fn scope(self) -> Result<ScopeFilter, PushError> {
        match (self.application, self.session_id) {
            (None, None) => Ok(ScopeFilter::All),
            (Some(application), None) => Ok(ScopeFilter::Application(application)),
            (Some(application), Some(session_id)) => {
                Ok(ScopeFilter::session(application, session_id))
            }
            (None, Some(_)) => Err(PushError::InvalidRequest(
                "session_id requires application".to_string(),
            )),
        }
    }
}

/// One registered connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionSummaryDto {
    /// Key the connection is registered under.
    pub key: ConnectionKey,
    /// Physical connection id.
    pub connection_id: String,
    /// Lifecycle state at listing time.
    pub state: ConnectionState,
}

impl From<&SharedConnection> for ConnectionSummaryDto {
    fn from(connection: &SharedConnection) -> Self {
        Self {
            key: connection.key().clone(),
            connection_id: connection.id().to_string(),
            state: connection.state(),
        }
    }
}

/// Response body for `GET /api/v1/connections`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionListResponse {
    /// Matching connections, sorted by key.
    pub connections: Vec<ConnectionSummaryDto>,
    /// Number of entries in `connections`.
    pub total: usize,
}

/// Response body for `DELETE /api/v1/sessions/{application}/{session_id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvalidateSessionResponse {
    /// Application name.
    pub application: String,
    /// Session identifier.
    pub session_id: String,
    /// Connections removed and closed.
    pub removed: usize,
}
