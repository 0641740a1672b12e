//! Execution strategies for push work.
//!
//! A [`TaskExecutor`] decides which task performs the I/O of a send once
//! the dispatcher has decided *what* to send. The capability is exactly two
//! operations:
//!
//! - [`TaskExecutor::submit`]: fire-and-forget. Failures go to the
//!   [`FailureReporter`], never back to the caller.
//! - [`TaskExecutor::submit_and_wait`]: run and hand back the result,
//!   failures included.
//!
//! The set of strategies is closed: [`InlineExecutor`] runs work on the
//! calling task, [`PooledExecutor`] hands it to worker lanes. The rest of
//! the crate holds an [`Executor`], which dispatches to the configured one.

pub mod inline;
pub mod pooled;
pub mod reporter;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

pub use inline::InlineExecutor;
pub use pooled::PooledExecutor;
pub use reporter::FailureReporter;

use crate::error::PushError;

/// A unit of fire-and-forget work.
///
/// Carries a label used when reporting its failure and an optional
/// affinity: executors that shard work run tasks with equal affinity in
/// submission order.
pub struct Task {
    label: Cow<'static, str>,
    affinity: Option<u64>,
    awaited: bool,
    future: BoxFuture<'static, Result<(), PushError>>,
}

impl Task {
    /// Wraps a future as a task.
    pub fn new<F>(label: impl Into<Cow<'static, str>>, future: F) -> Self
    where
        F: Future<Output = Result<(), PushError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            affinity: None,
            awaited: false,
            future: Box::pin(future),
        }
    }

    /// Pins this task to the lane selected by `affinity`.
    #[must_use]
    pub fn with_affinity(mut self, affinity: u64) -> Self {
        self.affinity = Some(affinity);
        self
    }

    /// Label used in failure reports.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Lane hint, if any.
    #[must_use]
    pub fn affinity(&self) -> Option<u64> {
        self.affinity
    }

    /// Marks a task whose outcome a caller is waiting for. Dropping such a
    /// task already fails the caller, so it is never reported.
    pub(crate) fn awaited(mut self) -> Self {
        self.awaited = true;
        self
    }

    /// Reports that this task will never run.
    pub(crate) fn abandon(self, reporter: &FailureReporter, error: &PushError) {
        if !self.awaited {
            reporter.report(&self.label, error);
        }
    }

    /// Runs the task to completion and reports a failure, if any.
    pub(crate) async fn run(self, reporter: &FailureReporter) {
        let Self { label, future, .. } = self;
        if let Err(err) = catch_panic(future).await {
            reporter.report(&label, &err);
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.label)
            .field("affinity", &self.affinity)
            .field("awaited", &self.awaited)
            .finish_non_exhaustive()
    }
}

/// Strategy that runs push work.
pub trait TaskExecutor: Send + Sync + fmt::Debug {
    /// Runs `task` at some point; its failure is reported, never returned.
    ///
    /// Ordering relative to other submissions is only guaranteed for tasks
    /// with the same affinity, and only by strategies that document it.
    fn submit(&self, task: Task) -> impl Future<Output = ()> + Send;

    /// Runs `future` and returns its result.
    ///
    /// `affinity` has the same meaning as on [`Task`]: a waited-on future
    /// with the same affinity as earlier submitted tasks runs after them.
    ///
    /// # Errors
    ///
    /// Returns the future's own error, [`PushError::TaskPanicked`] if it
    /// panicked, or [`PushError::ExecutorShutdown`] if the executor could
    /// not run it.
    fn submit_and_wait<T, F>(
        &self,
        affinity: Option<u64>,
        future: F,
    ) -> impl Future<Output = Result<T, PushError>> + Send
    where
        T: Send + 'static,
        F: Future<Output = Result<T, PushError>> + Send + 'static;
}

/// Configured executor: the closed set of strategies behind one type.
#[derive(Debug)]
pub enum Executor {
    /// Runs work on the calling task.
    Inline(InlineExecutor),
    /// Runs work on worker lanes.
    Pooled(PooledExecutor),
}

impl Executor {
    /// Builds the executor described by `strategy`.
    ///
    /// # Panics
    ///
    /// Panics if `strategy` is [`ExecutorStrategy::Pooled`] and this is
    /// called outside a Tokio runtime.
    #[must_use]
    pub fn from_strategy(strategy: ExecutorStrategy, reporter: FailureReporter) -> Self {
        match strategy {
            ExecutorStrategy::Inline => Self::Inline(InlineExecutor::new(reporter)),
            ExecutorStrategy::Pooled {
                lanes,
                lane_capacity,
            } => Self::Pooled(PooledExecutor::new(lanes, lane_capacity, reporter)),
        }
    }

    /// Short strategy name, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Inline(_) => "inline",
            Self::Pooled(_) => "pooled",
        }
    }

    /// Stops worker lanes. No-op for the inline strategy.
    pub fn shutdown(&self) {
        if let Self::Pooled(pooled) = self {
            pooled.shutdown();
        }
    }
}

impl TaskExecutor for Executor {
    fn submit(&self, task: Task) -> impl Future<Output = ()> + Send {
        async move {
            match self {
                Self::Inline(inline) => inline.submit(task).await,
                Self::Pooled(pooled) => pooled.submit(task).await,
            }
        }
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
        async move {
            match self {
                Self::Inline(inline) => inline.submit_and_wait(affinity, future).await,
                Self::Pooled(pooled) => pooled.submit_and_wait(affinity, future).await,
            }
        }
    }
}

/// Executor choice read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorStrategy {
    /// [`InlineExecutor`].
    #[default]
    Inline,
    /// [`PooledExecutor`] with the given lane count and per-lane capacity.
    Pooled {
        /// Number of worker lanes.
        lanes: usize,
        /// Queue capacity of each lane.
        lane_capacity: usize,
    },
}

impl ExecutorStrategy {
    /// Default lane count for the pooled strategy.
    pub const DEFAULT_LANES: usize = 4;
    /// Default per-lane queue capacity for the pooled strategy.
    pub const DEFAULT_LANE_CAPACITY: usize = 1_024;

    /// Parses a strategy name, attaching pool dimensions when pooled.
    ///
    /// # Errors
    ///
    /// Returns a message naming the value if it is not `inline` or `pooled`.
    pub fn parse(name: &str, lanes: usize, lane_capacity: usize) -> Result<Self, String> {
        match name.parse::<Self>()? {
            Self::Inline => Ok(Self::Inline),
            Self::Pooled { .. } => Ok(Self::Pooled {
                lanes,
                lane_capacity,
            }),
        }
    }
}

impl FromStr for ExecutorStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" | "same_thread" => Ok(Self::Inline),
            "pooled" | "pool" => Ok(Self::Pooled {
                lanes: Self::DEFAULT_LANES,
                lane_capacity: Self::DEFAULT_LANE_CAPACITY,
            }),
            other => Err(format!("unknown executor strategy: {other}")),
        }
    }
}

/// Awaits `future`, turning a panic into [`PushError::TaskPanicked`].
pub(crate) async fn catch_panic<T, F>(future: F) -> Result<T, PushError>
where
    F: Future<Output = Result<T, PushError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(PushError::TaskPanicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
