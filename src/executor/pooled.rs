//! Executor backed by Tokio worker lanes.
//!
//! Each lane is a bounded [`mpsc`] queue drained by one spawned worker, so
//! tasks on the same lane run one at a time in submission order. Tasks
//! carrying an affinity always land on `affinity % lanes`; the dispatcher
//! uses the connection id as affinity, which keeps sends to one connection
//! ordered while different connections proceed in parallel.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::{FailureReporter, Task, TaskExecutor, catch_panic};
use crate::error::PushError;

/// Worker-lane executor for high-volume push.
///
/// `submit` never waits: a full lane rejects the task and reports
/// [`PushError::ExecutorSaturated`]. `submit_and_wait` waits for queue
/// capacity and then for the result.
#[derive(Debug)]
pub struct PooledExecutor {
    lanes: Vec<mpsc::Sender<Task>>,
    next_lane: AtomicUsize,
    reporter: FailureReporter,
    shutdown: CancellationToken,
}

impl PooledExecutor {
    /// Spawns `lanes` workers, each with a queue of `lane_capacity` tasks.
    ///
    /// Zero values are raised to one.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(lanes: usize, lane_capacity: usize, reporter: FailureReporter) -> Self {
        let shutdown = CancellationToken::new();
        let senders = (0..lanes.max(1))
            .map(|index| {
                let (sender, receiver) = mpsc::channel(lane_capacity.max(1));
                tokio::spawn(run_lane(
                    index,
                    receiver,
                    reporter.clone(),
                    shutdown.child_token(),
                ));
                sender
            })
            .collect();

        Self {
            lanes: senders,
            next_lane: AtomicUsize::new(0),
            reporter,
            shutdown,
        }
    }

    /// Number of worker lanes.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Stops every worker after its current task.
    ///
    /// Tasks still queued never run: each is reported as
    /// [`PushError::ExecutorShutdown`], and waiting `submit_and_wait`
    /// callers get that error back. Later submissions fail the same way.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn lane_for(&self, affinity: Option<u64>) -> usize {
        let count = self.lanes.len();
        match affinity {
            #[allow(clippy::cast_possible_truncation)]
            Some(affinity) => (affinity % count as u64) as usize,
            None => self.next_lane.fetch_add(1, Ordering::Relaxed) % count,
        }
    }
}

impl TaskExecutor for PooledExecutor {
    fn submit(&self, task: Task) -> impl Future<Output = ()> + Send {
        let lane = self.lane_for(task.affinity());
        let outcome = match self.lanes.get(lane) {
            Some(sender) => sender.try_send(task),
            None => Err(TrySendError::Closed(task)),
        };
        match outcome {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                task.abandon(&self.reporter, &PushError::ExecutorSaturated { lane });
            }
            Err(TrySendError::Closed(task)) => {
                task.abandon(&self.reporter, &PushError::ExecutorShutdown);
            }
        }
        std::future::ready(())
    }

    fn submit_and_wait<T, F>(
        &self,
        affinity: Option<u64>,
        future: F,
    ) -> impl Future<Output = Result<T, PushError>> + Send
    where
        T: Send + 'static,
        F: Future<Output = Result<T, PushError>> + Send + 'static,
    {
        let sender = self.lanes.get(self.lane_for(affinity)).cloned();
        async move {
            let sender = sender.ok_or(PushError::ExecutorShutdown)?;
            let (reply, result) = oneshot::channel();
            let task = Task::new("submit_and_wait", async move {
                let _ = reply.send(catch_panic(future).await);
                Ok(())
            })
            .awaited();
            sender
                .send(task)
                .await
                .map_err(|_| PushError::ExecutorShutdown)?;
            result.await.map_err(|_| PushError::ExecutorShutdown)?
        }
    }
}

impl Drop for PooledExecutor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_lane(
    index: usize,
    mut receiver: mpsc::Receiver<Task>,
    reporter: FailureReporter,
    shutdown: CancellationToken,
) {
    tracing::debug!(lane = index, "executor lane started");
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            task = receiver.recv() => match task {
                Some(task) => task.run(&reporter).await,
                None => break,
            },
        }
    }

    receiver.close();
    let mut abandoned = 0_usize;
    while let Ok(task) = receiver.try_recv() {
        task.abandon(&reporter, &PushError::ExecutorShutdown);
        abandoned += 1;
    }
    tracing::debug!(lane = index, abandoned, "executor lane stopped");
}
