//! Service layer: push orchestration.
//!
//! [`PushDispatcher`] resolves broadcast targets through the connection
//! registry, submits sends to the push executor and listener notification
//! to the event executor, and records lifecycle changes on the
//! [`super::domain::EventBus`]. The sweeper is the pull-driven backstop for
//! connection cleanup.

pub mod push_service;
pub mod sweeper;

pub use push_service::{BroadcastReport, PushDispatcher};
pub use sweeper::spawn_sweeper;
