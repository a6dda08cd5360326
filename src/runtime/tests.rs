use super::*;
use crate::sync::Latch;
use crate::task::{sync_wait, Task};
use futures::task::noop_waker;
use static_assertions::assert_impl_all;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

assert_impl_all!(ThreadPool: Send, Sync);
assert_impl_all!(PoolHandle: Send, Sync, Clone);

#[test]
fn schedule_moves_task_onto_worker() {
    let pool = PoolOptions::new()
        .thread_count(2)
        .thread_name("millrace-test")
        .build()
        .unwrap();
    let handle = pool.handle();

    let task = Task::new(async move {
        assert!(ThreadPool::from_current_thread().is_none());

        handle.schedule().unwrap().await;

        assert!(ThreadPool::from_current_thread().is_some());
        std::thread::current()
            .name()
            .map(|name| name.to_string())
            .filter(|name| name.starts_with("millrace-test-"))
            .expect("resumed off a pool worker thread")
    });

    let name = sync_wait(task);
    assert!(name.starts_with("millrace-test-"));
    pool.shutdown();
}

#[test]
fn size_returns_to_zero_when_quiescent() {
    let pool = PoolOptions::new().thread_count(1).build().unwrap();
    let handle = pool.handle();

    let task = Task::new(async move {
        handle.schedule().unwrap().await;
    });
    sync_wait(task);

    // The worker decrements after the resumed task runs to completion.
    while pool.size() != 0 {
        std::thread::yield_now();
    }
    pool.shutdown();
}

#[test]
fn schedule_after_shutdown_is_rejected() {
    let pool = PoolOptions::new().thread_count(1).build().unwrap();
    let handle = pool.handle();
    pool.shutdown();

    assert!(matches!(
        handle.schedule().map(|_| ()),
        Err(ScheduleError::ShutdownRejected)
    ));
    assert_eq!(
        handle.resume(noop_waker()),
        Err(ScheduleError::ShutdownRejected)
    );
}

#[test]
fn shutdown_is_idempotent() {
    let pool = PoolOptions::new().thread_count(1).build().unwrap();
    pool.shutdown();
    pool.shutdown();
}

#[test]
fn thread_hooks_run_once_per_worker() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));

    let pool = {
        let started = started.clone();
        let stopped = stopped.clone();
        PoolOptions::new()
            .thread_count(3)
            .on_thread_start(move |_idx| {
                started.fetch_add(1, Ordering::SeqCst);
            })
            .on_thread_stop(move |_idx| {
                stopped.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap()
    };
    pool.shutdown();

    assert_eq!(started.load(Ordering::SeqCst), 3);
    assert_eq!(stopped.load(Ordering::SeqCst), 3);
}

#[test]
fn from_current_thread_is_none_off_pool() {
    assert!(ThreadPool::from_current_thread().is_none());
}

/// Parks once, publishing its waker so the test can resume it via the pool.
struct ParkOnce {
    parked: bool,
    slot: Arc<parking_lot::Mutex<Option<Waker>>>,
}

impl Future for ParkOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.parked {
            Poll::Ready(())
        } else {
            self.parked = true;
            *self.slot.lock() = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[test]
fn resume_runs_a_suspended_task_on_a_worker() {
    let pool = PoolOptions::new().thread_count(1).build().unwrap();
    let slot = Arc::new(parking_lot::Mutex::new(None));
    let latch = Arc::new(Latch::new(1));

    let task = {
        let slot = slot.clone();
        let latch = latch.clone();
        Task::new(async move {
            ParkOnce {
                parked: false,
                slot,
            }
            .await;
            assert!(ThreadPool::from_current_thread().is_some());
            latch.count_down(1);
        })
    };
    task.resume();
    assert!(!task.is_ready());

    let waker = slot.lock().take().expect("task did not park");
    pool.resume(waker).unwrap();

    sync_wait(latch.wait());
    while !task.is_ready() {
        std::thread::yield_now();
    }
    pool.shutdown();
}

struct CountingSpan {
    ended: Arc<AtomicUsize>,
}

impl ScheduleSpan for CountingSpan {
    fn end(&mut self) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn span_hook_opens_and_closes_around_the_hop() {
    let created = Arc::new(AtomicUsize::new(0));
    let ended = Arc::new(AtomicUsize::new(0));

    let factory: SpanFactory = {
        let created = created.clone();
        let ended = ended.clone();
        Arc::new(move |name| {
            assert_eq!(name, "schedule to thread_pool");
            created.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingSpan {
                ended: ended.clone(),
            }) as Box<dyn ScheduleSpan>
        })
    };

    let pool = PoolOptions::new()
        .thread_count(1)
        .span_factory(factory)
        .build()
        .unwrap();
    let handle = pool.handle();

    sync_wait(Task::new(async move {
        handle.schedule().unwrap().await;
    }));

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(ended.load(Ordering::SeqCst), 1);
    pool.shutdown();
}
