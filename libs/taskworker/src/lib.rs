//! # Task Worker
//!
//! Units of deferred work ("tasks") and the executor that runs them.
//!
//! A producer hands the [`TaskWorker`] an ordered batch of boxed [`Task`]s.
//! Each task may carry a delay; the worker waits out the delay, acquires a
//! concurrency permit and runs the task body. Failures are reported to an
//! error handler supplied by the owner rather than returned, so a single
//! failing task never stalls the batch.
//!
//! ```text
//! producer ──batch──▶ TaskWorker ──spawn──▶ [delay] ─▶ [permit] ─▶ Task::run
//!                                                            │
//!                                              on_error ◀────┘ (Err)
//! ```

pub mod task;
pub mod worker;

pub use task::{BoxedTask, ExecTask, SerialTask, Task};
pub use worker::{ErrorHandler, TaskWorker, WorkerStats};

/// Re-exported so callers do not need a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
