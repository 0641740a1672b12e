//! Push payloads: message body plus target scope.

use bytes::Bytes;

use super::ScopeFilter;

/// Opaque message body written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl PushMessage {
    /// Size of the body in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the text body, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for PushMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for PushMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for PushMessage {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

/// A message together with the connections it is addressed to.
///
/// Immutable once built. `notify_listeners` additionally routes the payload
/// to in-process listeners through the event executor.
#[derive(Debug, Clone)]
pub struct PushPayload {
    message: PushMessage,
    scope: ScopeFilter,
    notify_listeners: bool,
}

impl PushPayload {
    /// Creates a payload for remote clients only.
    #[must_use]
    pub fn new(message: impl Into<PushMessage>, scope: ScopeFilter) -> Self {
        Self {
            message: message.into(),
            scope,
            notify_listeners: false,
        }
    }

    /// Returns a copy that also notifies in-process listeners.
    #[must_use]
    pub fn with_listeners(mut self) -> Self {
        self.notify_listeners = true;
        self
    }

    /// Message body.
    #[must_use]
    pub fn message(&self) -> &PushMessage {
        &self.message
    }

    /// Target scope.
    #[must_use]
    pub fn scope(&self) -> &ScopeFilter {
        &self.scope
    }

    /// Whether in-process listeners are notified.
    #[must_use]
    pub fn notify_listeners(&self) -> bool {
        self.notify_listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_defaults_to_wire_only() {
        let payload = PushPayload::new("hello", ScopeFilter::All);
        assert!(!payload.notify_listeners());
        assert_eq!(payload.message().as_text(), Some("hello"));
        assert!(payload.with_listeners().notify_listeners());
    }

    #[test]
    fn binary_length() {
        let msg = PushMessage::from(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(msg.len(), 3);
        assert!(msg.as_text().is_none());
        assert!(PushMessage::from("").is_empty());
    }
}
