use crate::sync::waiter::{self, WaitNode};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// A count-down latch.
///
/// The counter only ever decreases; once it reaches zero the latch is
/// signalled forever. [`count_down`](Latch::count_down) past zero is a no-op
/// (the decrement is clamped), and a latch created with a count of zero is
/// born signalled, so its awaiters never suspend.
///
/// ```
/// use millrace::sync::Latch;
/// use millrace::task::Task;
/// use std::sync::Arc;
///
/// let latch = Arc::new(Latch::new(2));
/// let waiter = {
///     let latch = latch.clone();
///     Task::new(async move { latch.wait().await })
/// };
/// waiter.resume();
/// assert!(!waiter.is_ready());
///
/// latch.count_down(1);
/// latch.count_down(1);
/// assert!(waiter.is_ready());
/// ```
pub struct Latch {
    remaining: AtomicUsize,
    waiters: Mutex<SmallVec<[Arc<WaitNode>; 4]>>,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            waiters: Mutex::new(SmallVec::new()),
        }
    }

    /// Current count. Zero means signalled.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Subtract `min(n, remaining)` from the count, waking every parked
    /// awaiter if the count reaches zero.
    pub fn count_down(&self, n: usize) {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return;
            }
            let next = current.saturating_sub(n);
            match self.remaining.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    current = next;
                    break;
                }
                Err(observed) => current = observed,
            }
        }

        if current == 0 {
            let parked: SmallVec<[Arc<WaitNode>; 4]> = {
                let mut waiters = self.waiters.lock();
                waiters.drain(..).collect()
            };
            for node in parked {
                node.wake();
            }
        }
    }

    pub fn wait(&self) -> LatchWait<'_> {
        LatchWait {
            latch: self,
            node: None,
        }
    }
}

/// Future returned by [`Latch::wait`]. Completes without suspending when the
/// latch is already signalled.
pub struct LatchWait<'a> {
    latch: &'a Latch,
    node: Option<Arc<WaitNode>>,
}

impl Future for LatchWait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.latch.remaining() == 0 {
            return Poll::Ready(());
        }

        let mut waiters = self.latch.waiters.lock();
        // A count-down may have signalled between the fast path and the lock;
        // it drained the list before we could park, so check again.
        if self.latch.remaining() == 0 {
            return Poll::Ready(());
        }
        match &self.node {
            Some(node) => node.update(cx.waker()),
            None => {
                let node = WaitNode::new(cx.waker().clone());
                waiters.push(node.clone());
                self.node = Some(node);
            }
        }
        Poll::Pending
    }
}

impl Drop for LatchWait<'_> {
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            waiter::unpark(&mut self.latch.waiters.lock(), &node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn wait_task(latch: &Arc<Latch>) -> Task<usize> {
        let latch = latch.clone();
        Task::new(async move {
            let workers = latch.remaining();
            latch.wait().await;
            workers
        })
    }

    #[test]
    fn count_0_never_suspends() {
        let latch = Arc::new(Latch::new(0));
        let task = wait_task(&latch);

        task.resume();
        assert!(task.is_ready());
    }

    #[test]
    fn count_1() {
        let latch = Arc::new(Latch::new(1));
        let task = wait_task(&latch);

        task.resume();
        assert!(!task.is_ready());

        latch.count_down(1);
        assert!(task.is_ready());
    }

    #[test]
    fn count_1_down_5_clamps() {
        let latch = Arc::new(Latch::new(1));
        let task = wait_task(&latch);

        task.resume();
        assert!(!task.is_ready());

        latch.count_down(5);
        assert_eq!(latch.remaining(), 0);
        assert!(task.is_ready());
    }

    #[test]
    fn count_5_down_1_x5() {
        let latch = Arc::new(Latch::new(5));
        let task = wait_task(&latch);

        task.resume();
        for _ in 0..4 {
            latch.count_down(1);
            assert!(!task.is_ready());
        }

        latch.count_down(1);
        assert!(task.is_ready());
    }

    #[test]
    fn count_down_past_zero_is_a_noop() {
        let latch = Latch::new(2);
        latch.count_down(2);
        latch.count_down(1);
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn signalled_latch_wakes_every_waiter() {
        let latch = Arc::new(Latch::new(1));
        let tasks: Vec<_> = (0..3).map(|_| wait_task(&latch)).collect();
        for task in &tasks {
            task.resume();
        }

        latch.count_down(1);
        for task in &tasks {
            assert!(task.is_ready());
        }
    }
}
