//! Deferred task queues.
//!
//! The reactive scheduler needs exactly one thing from its host: a way to
//! run a closure "on the next tick" of a single-threaded event loop, FIFO
//! ordered and exactly once per post. [`TaskQueue`] captures that
//! contract.
//!
//! Two implementations are provided: [`TokioQueue`] drains posted tasks
//! through a channel on a tokio runtime, and [`ManualQueue`] is a
//! hand-pumped queue for tests and embedders that own their own loop.

mod manual;
mod tokio_queue;

pub use manual::ManualQueue;
pub use tokio_queue::TokioQueue;

use thiserror::Error;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send>;

/// A single-threaded deferred execution queue.
///
/// Implementations must run each posted task exactly once, in FIFO order
/// relative to other tasks posted to the same queue.
pub trait TaskQueue: Send + Sync {
    /// Enqueue `task` to run on a future tick.
    fn post(&self, task: Task);
}

/// Errors from constructing a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No tokio runtime is available on the current thread.
    #[error("no tokio runtime on the current thread")]
    NoRuntime,
}
