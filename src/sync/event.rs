use crate::sync::waiter::{self, WaitNode};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// One-shot signal. [`set`](Event::set) is idempotent; once set, every
/// current and future awaiter completes without suspending.
pub struct Event {
    set: AtomicBool,
    waiters: Mutex<SmallVec<[Arc<WaitNode>; 4]>>,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    pub fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            waiters: Mutex::new(SmallVec::new()),
        }
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub fn set(&self) {
        if self.set.swap(true, Ordering::AcqRel) {
            return;
        }
        let parked: SmallVec<[Arc<WaitNode>; 4]> = {
            let mut waiters = self.waiters.lock();
            waiters.drain(..).collect()
        };
        for node in parked {
            node.wake();
        }
    }

    pub fn wait(&self) -> EventWait<'_> {
        EventWait {
            event: self,
            node: None,
        }
    }
}

/// Future returned by [`Event::wait`].
pub struct EventWait<'a> {
    event: &'a Event,
    node: Option<Arc<WaitNode>>,
}

impl Future for EventWait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.event.is_set() {
            return Poll::Ready(());
        }

        let mut waiters = self.event.waiters.lock();
        if self.event.is_set() {
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

impl Drop for EventWait<'_> {
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            waiter::unpark(&mut self.event.waiters.lock(), &node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    #[test]
    fn set_before_wait_never_suspends() {
        let event = Arc::new(Event::new());
        event.set();

        let waiter = {
            let event = event.clone();
            Task::new(async move { event.wait().await })
        };
        waiter.resume();
        assert!(waiter.is_ready());
    }

    #[test]
    fn set_wakes_all_waiters() {
        let event = Arc::new(Event::new());
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let event = event.clone();
                Task::new(async move { event.wait().await })
            })
            .collect();
        for task in &tasks {
            task.resume();
            assert!(!task.is_ready());
        }

        event.set();
        for task in &tasks {
            assert!(task.is_ready());
        }
    }

    #[test]
    fn set_is_idempotent() {
        let event = Event::new();
        event.set();
        event.set();
        assert!(event.is_set());
    }
}
