//! Executor that runs work on the calling task.

use std::future::Future;

use super::{FailureReporter, Task, TaskExecutor, catch_panic};
use crate::error::PushError;

/// Runs every task to completion before `submit` resolves.
///
/// The default strategy. Suited to low-volume push, or to callers that are
/// already off the request path. Submission order is execution order, so
/// per-connection ordering holds trivially.
#[derive(Debug, Clone)]
pub struct InlineExecutor {
    reporter: FailureReporter,
}

impl InlineExecutor {
    /// Creates an inline executor reporting failures to `reporter`.
    #[must_use]
    pub fn new(reporter: FailureReporter) -> Self {
        Self { reporter }
    }
}

impl TaskExecutor for InlineExecutor {
    fn submit(&self, task: Task) -> impl Future<Output = ()> + Send {
        task.run(&self.reporter)
    }

    fn submit_and_wait<T, F>(
        &self,
        _affinity: Option<u64>,
        future: F,
    ) -> impl Future<Output = Result<T, PushError>> + Send
    where
        T: Send + 'static,
        F: Future<Output = Result<T, PushError>> + Send + 'static,
    {
        catch_panic(future)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::domain::{EventBus, PushEvent};

    fn executor() -> (InlineExecutor, EventBus) {
        let bus = EventBus::new(8);
        (InlineExecutor::new(FailureReporter::new(bus.clone())), bus)
    }

    #[test]
    fn submit_runs_before_returning() {
        let (executor, _bus) = executor();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        tokio_test::block_on(executor.submit(Task::new("flag", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })));

        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn submit_reports_instead_of_raising() {
        let (executor, bus) = executor();
        let mut rx = bus.subscribe();

        executor
            .submit(Task::new("failing", async {
                Err(PushError::TaskFailed("nope".to_string()))
            }))
            .await;

        let Ok(PushEvent::TaskFailed { label, .. }) = rx.recv().await else {
            panic!("failure was not reported");
        };
        assert_eq!(label, "failing");
    }

    #[tokio::test]
    async fn submit_and_wait_propagates_failure() {
        let (executor, bus) = executor();
        let mut rx = bus.subscribe();

        let result: Result<(), PushError> = executor
            .submit_and_wait(None, async { Err(PushError::TaskFailed("nope".to_string())) })
            .await;

        assert!(matches!(result, Err(PushError::TaskFailed(_))));
        // Synchronous failures go to the caller, not the error channel.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn submit_and_wait_returns_value() {
        let (executor, _bus) = executor();
        let value = executor.submit_and_wait(None, async { Ok("done") }).await;
        assert!(matches!(value, Ok("done")));
    }

    #[tokio::test]
    async fn submit_survives_panicking_task() {
        let (executor, bus) = executor();
        let mut rx = bus.subscribe();

        executor
            .submit(Task::new("panics", async {
                if true {
                    panic!("task bug");
                }
                Ok(())
            }))
            .await;

        assert!(matches!(rx.recv().await, Ok(PushEvent::TaskFailed { .. })));
    }
}
