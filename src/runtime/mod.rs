//! The thread pool that resumes suspended tasks.
//!
//! Every coroutine in a pipeline runs on a pool worker: a task reaches the
//! pool through [`ThreadPool::schedule`] (awaitable hop onto the pool) or
//! [`ThreadPool::resume`] (enqueue an already-suspended waker), and a fixed
//! set of workers drains the FIFO queue. There is no work stealing; a task
//! may land on a different worker every time it re-enters the pool.

pub(crate) mod context;

mod options;
pub use options::{PoolOptions, ScheduleSpan, SpanFactory};

mod pool;
pub use pool::{PoolHandle, ScheduleOperation, ThreadPool};

#[cfg(test)]
mod tests;

/// Failure surfaced when submitting work to the pool.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The pool is shutting down and rejects new work.
    #[error("thread pool is shut down, unable to schedule new work")]
    ShutdownRejected,
}
