//! Error channel for fire-and-forget work.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::domain::{EventBus, PushEvent};
use crate::error::PushError;

/// Records failures of submitted tasks.
///
/// Each report is logged at `warn` and published on the [`EventBus`] as a
/// [`PushEvent::SendFailed`] or [`PushEvent::TaskFailed`]. Cheap to clone;
/// clones share the failure counter.
#[derive(Debug, Clone)]
pub struct FailureReporter {
    events: EventBus,
    failures: Arc<AtomicU64>,
}

impl FailureReporter {
    /// Creates a reporter publishing to `events`.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reports the failure of the task labelled `label`.
    pub fn report(&self, label: &str, error: &PushError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let event = match error {
            PushError::SendFailed { key, reason } => {
                tracing::warn!(%key, task = label, reason = %reason, "push send failed");
                PushEvent::SendFailed {
                    key: key.clone(),
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                }
            }
            PushError::ConnectionClosed(key) => {
                tracing::debug!(%key, task = label, "push target closed before send");
                PushEvent::SendFailed {
                    key: key.clone(),
                    reason: "connection closed".to_string(),
                    timestamp: Utc::now(),
                }
            }
            other => {
                tracing::warn!(task = label, error = %other, "push task failed");
                PushEvent::TaskFailed {
                    label: label.to_string(),
                    reason: other.to_string(),
                    timestamp: Utc::now(),
                }
            }
        };
        let _ = self.events.publish(event);
    }

    /// Total failures reported so far.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
