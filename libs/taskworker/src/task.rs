//! Task contract and the two stock task shapes.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A unit of deferred work handed to the executor
#[async_trait]
pub trait Task: Send {
    /// How long the executor waits before running the task
    fn delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Run the task body; consumes the task
    async fn run(self: Box<Self>, token: CancellationToken) -> Result<()>;
}

pub type BoxedTask = Box<dyn Task>;

type TaskFn = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<()>> + Send>;

/// Task built from a closure
pub struct ExecTask {
    func: TaskFn,
    delay: Duration,
}

impl ExecTask {
    pub fn new<F, Fut>(func: F, delay: Duration) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            func: Box::new(move |token| Box::pin(func(token))),
            delay,
        }
    }

    pub fn boxed(self) -> BoxedTask {
        Box::new(self)
    }
}

impl fmt::Debug for ExecTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecTask")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for ExecTask {
    fn delay(&self) -> Duration {
        self.delay
    }

    async fn run(self: Box<Self>, token: CancellationToken) -> Result<()> {
        (self.func)(token).await
    }
}

/// Runs inner tasks one after another, stopping at the first failure.
///
/// Inner delays are honored between steps; cancellation ends the sequence
/// without running the remaining steps.
pub struct SerialTask {
    tasks: Vec<BoxedTask>,
    delay: Duration,
}

impl SerialTask {
    pub fn new(tasks: Vec<BoxedTask>, delay: Duration) -> Self {
        Self { tasks, delay }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn boxed(self) -> BoxedTask {
        Box::new(self)
    }
}

#[async_trait]
impl Task for SerialTask {
    fn delay(&self) -> Duration {
        self.delay
    }

    async fn run(self: Box<Self>, token: CancellationToken) -> Result<()> {
        for task in self.tasks {
            let delay = task.delay();
            if !delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if token.is_cancelled() {
                return Ok(());
            }
            task.run(token.clone()).await?;
        }
        Ok(())
    }
}
