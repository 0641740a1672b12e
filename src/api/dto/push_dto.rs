//! Push request DTOs: message bodies and target scopes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{ConnectionKey, PushMessage, ScopeFilter};
use crate::error::PushError;
use crate::ws::PushEnvelope;

/// Message body of a push request. Exactly one field must be set.
///
/// ```json
/// { "text": "hello" }
/// { "binary_base64": "AQID" }
/// { "json": { "count": 3 } }
/// ```
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MessageDto {
    /// Raw text frame.
    #[serde(default)]
    pub text: Option<String>,
    /// Binary frame, base64-encoded.
    #[serde(default)]
    pub binary_base64: Option<String>,
    /// JSON body, delivered wrapped in a push envelope.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub json: Option<serde_json::Value>,
}

impl MessageDto {
    /// Converts the body into a wire message.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::InvalidRequest`] if zero or several body fields
    /// are set or the base64 is malformed.
    pub fn into_message(self) -> Result<PushMessage, PushError> {
        match (self.text, self.binary_base64, self.json) {
            (Some(text), None, None) => Ok(PushMessage::Text(text)),
            (None, Some(encoded), None) => STANDARD
                .decode(encoded.as_bytes())
                .map(|raw| PushMessage::Binary(Bytes::from(raw)))
                .map_err(|e| PushError::InvalidRequest(format!("binary_base64: {e}"))),
            (None, None, Some(json)) => PushEnvelope::new(json)
                .into_message()
                .map_err(|e| PushError::Internal(format!("envelope serialization: {e}"))),
            (None, None, None) => Err(PushError::InvalidRequest(
                "message needs one of text, binary_base64 or json".to_string(),
            )),
            _ => Err(PushError::InvalidRequest(
                "message must set exactly one body field".to_string(),
            )),
        }
    }
}

/// Target scope of a broadcast, tagged by `type`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScopeDto {
    /// Every registered connection.
    All,
    /// Every connection of one application.
    Application {
        /// Application name.
        application: String,
    },
    /// Every connection of one session.
    Session {
        /// Application name.
        application: String,
        /// Session identifier.
        session_id: String,
    },
    /// Exactly one connection.
    Resource {
        /// Application name.
        application: String,
        /// Session identifier.
        session_id: String,
        /// Resource (page) identifier.
        resource_id: String,
    },
}

impl From<ScopeDto> for ScopeFilter {
    fn from(scope: ScopeDto) -> Self {
        match scope {
            ScopeDto::All => Self::All,
            ScopeDto::Application { application } => Self::Application(application),
            ScopeDto::Session {
                application,
                session_id,
            } => Self::session(application, session_id),
            ScopeDto::Resource {
                application,
                session_id,
                resource_id,
            } => Self::Resource(ConnectionKey::new(application, session_id, resource_id)),
        }
    }
}

/// Request body for `POST /api/v1/broadcast`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    /// Message to deliver.
    pub message: MessageDto,
    /// Connections to deliver to.
    pub scope: ScopeDto,
    /// Also hand the message to in-process listeners.
    #[serde(default)]
    pub notify_listeners: bool,
}

/// Request body for a targeted send.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Message to deliver.
    pub message: MessageDto,
}
