//! Broadcast target selection.

use std::fmt;
use std::sync::Arc;

use super::ConnectionKey;

/// Predicate used by [`ScopeFilter::Predicate`].
pub type KeyPredicate = Arc<dyn Fn(&ConnectionKey) -> bool + Send + Sync>;

/// Selects which registered connections a broadcast targets.
#[derive(Clone)]
pub enum ScopeFilter {
    /// Every registered connection.
    All,
    /// Every connection of one application.
    Application(String),
    /// Every connection of one session.
    Session {
        /// Application scope.
        application: String,
        /// Session identifier.
        session_id: String,
    },
    /// Exactly one connection.
    Resource(ConnectionKey),
    /// Arbitrary predicate, evaluated against a full registry snapshot.
    Predicate(KeyPredicate),
}

impl ScopeFilter {
    /// Session-wide scope.
    #[must_use]
    pub fn session(application: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::Session {
            application: application.into(),
            session_id: session_id.into(),
        }
    }

    /// Predicate scope from a closure.
    #[must_use]
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&ConnectionKey) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Returns `true` if `key` is inside this scope.
    #[must_use]
    pub fn matches(&self, key: &ConnectionKey) -> bool {
        match self {
            Self::All => true,
            Self::Application(application) => key.application() == application,
            Self::Session {
                application,
                session_id,
            } => key.in_session(application, session_id),
            Self::Resource(target) => key == target,
            Self::Predicate(predicate) => predicate(key),
        }
    }
}

impl fmt::Debug for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Application(application) => {
                f.debug_tuple("Application").field(application).finish()
            }
            Self::Session {
                application,
                session_id,
            } => f
                .debug_struct("Session")
                .field("application", application)
                .field("session_id", session_id)
                .finish(),
            Self::Resource(key) => f.debug_tuple("Resource").field(key).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Application(application) => write!(f, "{application}/*"),
            Self::Session {
                application,
                session_id,
            } => write!(f, "{application}/{session_id}/*"),
            Self::Resource(key) => write!(f, "{key}"),
            Self::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}
