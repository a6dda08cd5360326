use crate::runtime::context;
use crate::runtime::options::{PoolOptions, ScheduleSpan, ThreadHook};
use crate::runtime::ScheduleError;
use anyhow::{Context as _, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, JoinHandle};

/// Fixed pool of worker threads resuming suspended tasks.
///
/// Workers drain one FIFO queue under a mutex + condvar; each resumed task
/// runs on the dequeuing worker until its next suspension point. The pool
/// must outlive every task it schedules.
///
/// ```
/// use millrace::runtime::{PoolOptions, ThreadPool};
/// use millrace::task::{sync_wait, Task};
///
/// let pool = PoolOptions::new().thread_count(1).build().unwrap();
/// let handle = pool.handle();
///
/// let task = Task::new(async move {
///     handle.schedule().unwrap().await;
///     // now running on a pool worker
///     assert!(ThreadPool::from_current_thread().is_some());
/// });
/// sync_wait(task);
/// pool.shutdown();
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    queue: Mutex<VecDeque<Entry>>,
    cv: Condvar,
    /// Scheduled-but-not-yet-resumed entries; zero iff the pool is quiescent.
    size: AtomicUsize,
    shutdown: AtomicBool,
    span_factory: Option<crate::runtime::SpanFactory>,
}

enum Entry {
    Operation(Arc<OpState>),
    Waker(Waker),
}

impl Entry {
    fn run(self) {
        match self {
            Entry::Operation(op) => {
                let waker = {
                    let mut inner = op.inner.lock();
                    inner.fired = true;
                    inner.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            Entry::Waker(waker) => waker.wake(),
        }
    }
}

#[derive(Default)]
struct OpState {
    inner: Mutex<OpInner>,
}

#[derive(Default)]
struct OpInner {
    /// Set by the worker that dequeued this operation. Completion is gated
    /// on it so a spurious poll of the awaiting task cannot complete the
    /// hop off-pool.
    fired: bool,
    waker: Option<Waker>,
}

impl ThreadPool {
    /// Build a pool with default [`PoolOptions`].
    pub fn new() -> Result<Self> {
        PoolOptions::new().build()
    }

    pub(crate) fn with_options(options: PoolOptions) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            size: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            span_factory: options.span_factory.clone(),
        });

        let thread_count = options.resolved_thread_count();
        let mut workers = Vec::with_capacity(thread_count);
        for idx in 0..thread_count {
            let handle = PoolHandle {
                shared: shared.clone(),
            };
            let on_start = options.on_thread_start.clone();
            let on_stop = options.on_thread_stop.clone();
            let worker = thread::Builder::new()
                .name(format!("{}-{}", options.thread_name, idx))
                .spawn(move || worker_loop(handle, idx, on_start, on_stop))
                .context("failed to spawn pool worker thread")?;
            workers.push(worker);
        }

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// A cheap, clonable handle to this pool; the form tasks capture.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            shared: self.shared.clone(),
        }
    }

    /// The pool the calling worker thread belongs to, or `None` off-pool.
    pub fn from_current_thread() -> Option<PoolHandle> {
        context::current()
    }

    /// Awaitable hop onto the pool. See [`PoolHandle::schedule`].
    pub fn schedule(&self) -> Result<ScheduleOperation, ScheduleError> {
        self.handle().schedule()
    }

    /// Enqueue an already-suspended task's waker. See [`PoolHandle::resume`].
    pub fn resume(&self, waker: Waker) -> Result<(), ScheduleError> {
        self.handle().resume(waker)
    }

    /// Scheduled-but-not-yet-resumed entries.
    pub fn size(&self) -> usize {
        self.shared.size.load(Ordering::Acquire)
    }

    /// Request stop and join every worker. Idempotent; entries still queued
    /// are dropped, not resumed.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            // Taken so no worker can be between its shutdown check and the
            // condvar wait when the notification fires.
            let _queue = self.shared.queue.lock();
            self.shared.cv.notify_all();
        }

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("pool worker thread panicked");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Clonable reference to a [`ThreadPool`]'s queue, held by workers and
/// handed to tasks that need to reschedule themselves.
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Awaitable that parks the current task on the pool queue and resumes
    /// it on a worker thread. Also the explicit yield: a task already on the
    /// pool goes to the back of the queue.
    pub fn schedule(&self) -> Result<ScheduleOperation, ScheduleError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(ScheduleError::ShutdownRejected);
        }
        self.shared.size.fetch_add(1, Ordering::Release);
        Ok(ScheduleOperation {
            shared: self.shared.clone(),
            state: Arc::new(OpState::default()),
            span: None,
            enqueued: false,
        })
    }

    /// Enqueue a suspended task's waker; a worker will wake it.
    pub fn resume(&self, waker: Waker) -> Result<(), ScheduleError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(ScheduleError::ShutdownRejected);
        }
        self.shared.size.fetch_add(1, Ordering::Release);
        self.shared.push(Entry::Waker(waker));
        Ok(())
    }
}

impl Shared {
    fn push(&self, entry: Entry) {
        {
            let mut queue = self.queue.lock();
            queue.push_back(entry);
        }
        self.cv.notify_one();
    }

    /// Block until there is an entry or shutdown is requested. Entries left
    /// in the queue at shutdown are not drained.
    fn next_entry(&self) -> Option<Entry> {
        let mut queue = self.queue.lock();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            if let Some(entry) = queue.pop_front() {
                return Some(entry);
            }
            self.cv.wait(&mut queue);
        }
    }
}

fn worker_loop(
    handle: PoolHandle,
    idx: usize,
    on_start: Option<ThreadHook>,
    on_stop: Option<ThreadHook>,
) {
    if let Some(hook) = &on_start {
        hook(idx);
    }

    let shared = handle.shared.clone();
    {
        let _context = context::enter(handle);
        tracing::debug!(worker = idx, "pool worker started");

        while let Some(entry) = shared.next_entry() {
            if panic::catch_unwind(AssertUnwindSafe(|| entry.run())).is_err() {
                tracing::error!(worker = idx, "resumed task panicked on pool worker");
            }
            shared.size.fetch_sub(1, Ordering::Release);
        }

        tracing::debug!(worker = idx, "pool worker stopped");
    }

    if let Some(hook) = &on_stop {
        hook(idx);
    }
}

/// Awaitable returned by [`PoolHandle::schedule`]. The first poll enqueues
/// the task and opens the configured schedule span; the poll that observes
/// the dequeue closes the span and completes on the worker thread.
pub struct ScheduleOperation {
    shared: Arc<Shared>,
    state: Arc<OpState>,
    span: Option<Box<dyn ScheduleSpan>>,
    enqueued: bool,
}

impl Future for ScheduleOperation {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if !this.enqueued {
            this.span = this
                .shared
                .span_factory
                .as_ref()
                .map(|factory| factory("schedule to thread_pool"));
            this.state.inner.lock().waker = Some(cx.waker().clone());
            this.shared.push(Entry::Operation(this.state.clone()));
            this.enqueued = true;
            return Poll::Pending;
        }

        let mut inner = this.state.inner.lock();
        if !inner.fired {
            inner.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let on_this_pool = context::current()
            .is_some_and(|current| Arc::ptr_eq(&current.shared, &this.shared));
        if on_this_pool {
            drop(inner);
            if let Some(mut span) = this.span.take() {
                span.end();
            }
            return Poll::Ready(());
        }

        // The dequeuing worker fired while this task was still unwinding to
        // its suspend point, so the wake landed back on the origin thread.
        // Go around again: completion must happen on a pool worker.
        inner.fired = false;
        inner.waker = Some(cx.waker().clone());
        drop(inner);
        this.shared.size.fetch_add(1, Ordering::Release);
        this.shared.push(Entry::Operation(this.state.clone()));
        Poll::Pending
    }
}
