//! Composite connection identity.
//!
//! [`ConnectionKey`] addresses one live connection by application scope,
//! HTTP session and the page or named resource that opened the socket.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identity of a registered connection.
///
/// Immutable once built; equality and hashing cover all three parts. Used
/// as the dictionary key in the connection registries and as the
/// target of resource-scoped broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct ConnectionKey {
    application: String,
    session_id: String,
    resource_id: String,
}

impl ConnectionKey {
    /// Creates a key from its three parts.
    #[must_use]
    pub fn new(
        application: impl Into<String>,
        session_id: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            session_id: session_id.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Application scope the connection belongs to.
    #[must_use]
    pub fn application(&self) -> &str {
        &self.application
    }

    /// HTTP session that opened the connection.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Page id or resource name within the session.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Returns `true` if this key belongs to the given session.
    #[must_use]
    pub fn in_session(&self, application: &str, session_id: &str) -> bool {
        self.application == application && self.session_id == session_id
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.application, self.session_id, self.resource_id
        )
    }
}
