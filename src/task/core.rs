use futures::task::{self, ArcWake};
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

pub(super) type BoxedBody<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Terminal state of a task body.
pub(super) enum Outcome<T> {
    Value(T),
    Panicked(Box<dyn Any + Send + 'static>),
    Cancelled,
}

pub(super) struct Core<T> {
    /// The suspended body. `None` while a thread is polling it (the polling
    /// thread owns it) and after completion.
    pub(super) body: Option<BoxedBody<T>>,

    /// The body has been polled at least once.
    pub(super) started: bool,

    /// A thread is currently polling the body.
    pub(super) running: bool,

    /// A wake arrived while the body was running; the driving thread must
    /// poll again before it lets go.
    pub(super) rewake: bool,

    /// The owning `Task` was dropped. If the body is mid-poll, the driving
    /// thread discards it once the poll returns.
    pub(super) cancelled: bool,

    /// Terminal: `outcome` has been written (it may since have been consumed
    /// by the awaiter).
    pub(super) finished: bool,

    pub(super) outcome: Option<Outcome<T>>,

    /// Woken when the body reaches an outcome.
    pub(super) join_waker: Option<Waker>,
}

/// Shared state between the owning [`Task`](super::Task) handle and the
/// task's own waker.
///
/// The waker drives the body inline on the waking thread: waking a parked
/// task runs its continuation immediately, the direct-continuation behavior
/// a symmetric transfer requires. The body is taken out of the mutex for the
/// duration of a poll, so no lock is ever held across user code and a wake
/// arriving from inside a poll (even for this same task) can only flip the
/// `rewake` flag.
pub(super) struct TaskCore<T> {
    pub(super) state: Mutex<Core<T>>,
}

impl<T: Send + 'static> TaskCore<T> {
    pub(super) fn new(body: BoxedBody<T>) -> Self {
        Self {
            state: Mutex::new(Core {
                body: Some(body),
                started: false,
                running: false,
                rewake: false,
                cancelled: false,
                finished: false,
                outcome: None,
                join_waker: None,
            }),
        }
    }

    /// Drive the body until it suspends or completes. No-op if the task is
    /// finished; a concurrent drive is folded into the running one.
    pub(super) fn drive(self: &Arc<Self>) {
        loop {
            let mut body = {
                let mut core = self.state.lock();
                if core.finished {
                    return;
                }
                if core.running {
                    core.rewake = true;
                    return;
                }
                let Some(body) = core.body.take() else {
                    return;
                };
                core.running = true;
                core.started = true;
                body
            };

            let waker = task::waker(Arc::clone(self));
            let mut cx = Context::from_waker(&waker);
            let polled = panic::catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut cx)));

            let mut core = self.state.lock();
            core.running = false;
            match polled {
                Ok(Poll::Pending) => {
                    if core.cancelled {
                        core.finished = true;
                        core.outcome = Some(Outcome::Cancelled);
                        drop(core);
                        // Captured state unwinds outside the lock.
                        drop(body);
                        return;
                    }
                    core.body = Some(body);
                    if core.rewake {
                        core.rewake = false;
                        continue;
                    }
                    return;
                }
                Ok(Poll::Ready(value)) => {
                    return self.finish(core, Outcome::Value(value));
                }
                Err(payload) => {
                    return self.finish(core, Outcome::Panicked(payload));
                }
            }
        }
    }

    fn finish(&self, mut core: parking_lot::MutexGuard<'_, Core<T>>, outcome: Outcome<T>) {
        core.finished = true;
        core.outcome = Some(outcome);
        let waker = core.join_waker.take();
        drop(core);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Send + 'static> ArcWake for TaskCore<T> {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.drive();
    }
}
