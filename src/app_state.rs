//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::PushConfig;
use crate::domain::{EventBus, ListenerRegistry};
use crate::executor::{Executor, FailureReporter};
use crate::service::PushDispatcher;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Push dispatcher; also owns the registry, listeners and event bus.
    pub dispatcher: PushDispatcher,
    /// Outbound frame queue capacity for new WebSocket connections.
    pub outbound_queue_capacity: usize,
}

impl AppState {
    /// Wires the event bus, executors, registry and dispatcher described by
    /// `config`.
    ///
    /// # Panics
    ///
    /// Panics if a pooled executor is configured and this is called outside
    /// a Tokio runtime.
    #[must_use]
    pub fn from_config(config: &PushConfig) -> Self {
        let events = EventBus::new(config.event_bus_capacity);
        let reporter = FailureReporter::new(events.clone());

        let push_executor = Executor::from_strategy(config.push_executor, reporter.clone());
        let event_executor = Executor::from_strategy(config.event_executor, reporter);
        tracing::info!(
            push_executor = push_executor.name(),
            event_executor = event_executor.name(),
            registry = %config.registry,
            "push pipeline configured"
        );

        let dispatcher = PushDispatcher::new(
            config.registry.build(),
            Arc::new(push_executor),
            Arc::new(event_executor),
            Arc::new(ListenerRegistry::new()),
            events,
        );

        Self {
            dispatcher,
            outbound_queue_capacity: config.outbound_queue_capacity,
        }
    }
}
