//! WebSocket message envelope for structured pushes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::PushMessage;

/// Envelope wrapping a JSON push body before it is written as a text frame.
///
/// Raw text and binary pushes are written as-is; only JSON bodies get an
/// envelope, so clients can tell server pushes apart by `type`.
#[derive(Debug, Clone, Serialize)]
pub struct PushEnvelope {
    /// Server-generated message id.
    pub id: String,
    /// Always `"push"`.
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied body.
    pub payload: serde_json::Value,
}

impl PushEnvelope {
    /// Wraps `payload` in a fresh envelope.
    #[must_use]
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: "push",
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Serializes the envelope into a text message.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; only possible for non-string map keys.
    pub fn into_message(self) -> Result<PushMessage, serde_json::Error> {
        serde_json::to_string(&self).map(PushMessage::Text)
    }
}
