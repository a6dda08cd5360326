//! One-shot, lazily started tasks.
//!
//! A [`Task`] wraps a future but does not run it until it is resumed or
//! awaited. Waking a suspended task polls it inline on the waking thread, so
//! handing a value to a parked peer continues that peer directly instead of
//! bouncing through a scheduler queue.

mod core;
use self::core::{Outcome, TaskCore};

mod sync_wait;
pub use sync_wait::sync_wait;

use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A one-shot coroutine with a typed result.
///
/// The body does not execute until [`resume`](Task::resume) is called or the
/// task is awaited. Completion is observed through [`is_ready`](Task::is_ready)
/// or by awaiting the task, which yields the body's value. A panicking body
/// is caught and rethrown at the awaiter; if the task is never awaited the
/// failure is logged when the task is dropped.
///
/// Dropping a task that has not completed cancels it: the body is dropped at
/// the next safe point and everything it captured is released.
///
/// ```
/// use millrace::task::{sync_wait, Task};
///
/// let task = Task::new(async { 40 + 2 });
/// assert!(!task.is_ready()); // not started yet
/// assert_eq!(sync_wait(task), 42);
/// ```
pub struct Task<T> {
    core: Arc<TaskCore<T>>,
}

impl<T: Send + 'static> Task<T> {
    /// Wrap `body` without starting it.
    pub fn new<F>(body: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            core: Arc::new(TaskCore::new(Box::pin(body))),
        }
    }

    /// Drive the body one step on the calling thread, starting it on the
    /// first call. Does nothing once the task has completed.
    pub fn resume(&self) {
        self.core.drive();
    }

    /// True once the body has run to completion (or the task was cancelled
    /// mid-flight by a concurrent drop).
    pub fn is_ready(&self) -> bool {
        self.core.state.lock().finished
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = T;

    /// Awaiting a fresh task starts it inline; the awaiter becomes its
    /// continuation. Awaiting a completed task returns without suspending.
    ///
    /// # Panics
    ///
    /// Rethrows the body's panic, and panics if the result was already
    /// consumed by an earlier await.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        loop {
            {
                let mut core = self.core.state.lock();
                if core.finished {
                    return match core.outcome.take() {
                        Some(Outcome::Value(value)) => Poll::Ready(value),
                        Some(Outcome::Panicked(payload)) => panic::resume_unwind(payload),
                        Some(Outcome::Cancelled) | None => {
                            panic!("task result already consumed")
                        }
                    };
                }
                core.join_waker = Some(cx.waker().clone());
                if core.started {
                    return Poll::Pending;
                }
            }
            // Lazy start: first await runs the body on this thread.
            self.core.drive();
        }
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        let mut core = self.core.state.lock();
        if core.finished {
            if matches!(core.outcome, Some(Outcome::Panicked(_))) {
                tracing::error!("task failed but its result was never awaited");
            }
            return;
        }
        core.cancelled = true;
        if core.running {
            // The driving thread discards the body when its poll returns.
            return;
        }
        core.finished = true;
        let body = core.body.take();
        core.outcome = Some(Outcome::Cancelled);
        drop(core);
        drop(body);
    }
}
