use std::sync::Arc;
use std::thread;

/// A span measuring one trip through the pool queue, created by the
/// configured [`SpanFactory`] when a task suspends into
/// [`schedule`](crate::runtime::ThreadPool::schedule) and ended when a
/// worker resumes it.
pub trait ScheduleSpan: Send {
    fn end(&mut self);
}

/// Optional tracing hook. The pool never depends on a concrete tracer; it
/// only calls this factory with the span name and `end()` on the result.
pub type SpanFactory = Arc<dyn Fn(&'static str) -> Box<dyn ScheduleSpan> + Send + Sync>;

pub(crate) type ThreadHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Configuration for a [`ThreadPool`](crate::runtime::ThreadPool).
///
/// ```
/// use millrace::runtime::PoolOptions;
///
/// let pool = PoolOptions::new()
///     .thread_count(2)
///     .thread_name("pipeline-worker")
///     .build()
///     .unwrap();
/// pool.shutdown();
/// ```
pub struct PoolOptions {
    pub(crate) thread_count: Option<u32>,
    pub(crate) thread_name: String,
    pub(crate) on_thread_start: Option<ThreadHook>,
    pub(crate) on_thread_stop: Option<ThreadHook>,
    pub(crate) span_factory: Option<SpanFactory>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self {
            thread_count: None,
            thread_name: "millrace-worker".to_string(),
            on_thread_start: None,
            on_thread_stop: None,
            span_factory: None,
        }
    }

    /// Number of worker threads. Defaults to the machine's available
    /// parallelism.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn thread_count(mut self, count: u32) -> Self {
        assert!(count > 0, "thread_count must be at least 1");
        self.thread_count = Some(count);
        self
    }

    /// Prefix for worker thread names; workers are named `{prefix}-{idx}`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Called on each worker thread as it enters its loop.
    pub fn on_thread_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_thread_start = Some(Arc::new(hook));
        self
    }

    /// Called on each worker thread as it exits its loop.
    pub fn on_thread_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_thread_stop = Some(Arc::new(hook));
        self
    }

    /// Install the scheduler tracing hook.
    pub fn span_factory(mut self, factory: SpanFactory) -> Self {
        self.span_factory = Some(factory);
        self
    }

    /// Spawn the workers and hand back the pool.
    pub fn build(self) -> anyhow::Result<super::ThreadPool> {
        super::ThreadPool::with_options(self)
    }

    pub(crate) fn resolved_thread_count(&self) -> usize {
        match self.thread_count {
            Some(count) => count as usize,
            None => thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}
