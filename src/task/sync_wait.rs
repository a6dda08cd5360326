use futures::task::{self, ArcWake};
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Block the current thread until `future` completes and return its output.
///
/// This is the bridge between synchronous code and the task world: the root
/// of a pipeline (or a test) drives its future here while every other task
/// runs as a continuation of whoever wakes it.
///
/// ```
/// use millrace::sync::Latch;
/// use millrace::task::sync_wait;
///
/// let latch = Latch::new(0);
/// sync_wait(latch.wait()); // already signalled, completes without parking
/// ```
pub fn sync_wait<F: Future>(future: F) -> F::Output {
    let parker = Arc::new(Parker::default());
    let waker = task::waker(parker.clone());
    let mut cx = Context::from_waker(&waker);

    let mut future = pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => parker.park(),
        }
    }
}

#[derive(Default)]
struct Parker {
    woken: Mutex<bool>,
    cv: Condvar,
}

impl Parker {
    fn park(&self) {
        let mut woken = self.woken.lock();
        while !*woken {
            self.cv.wait(&mut woken);
        }
        *woken = false;
    }
}

impl ArcWake for Parker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let mut woken = arc_self.woken.lock();
        *woken = true;
        arc_self.cv.notify_one();
    }
}
