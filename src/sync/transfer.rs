use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Single-producer / single-consumer rendezvous buffer holding at most one
/// in-flight value.
///
/// The two parties run in strict alternation: the producer parks until the
/// consumer has taken the previous value, and handing over a value wakes the
/// consumer directly so its continuation runs immediately on the producer's
/// thread. This is the state an [`Output`](crate::ops::Output) shares with
/// its downstream edge.
///
/// Protocol:
///
/// 1. The consumer awaits [`initialize`](SymmetricTransfer::initialize); the
///    producer awaits [`wait_until_initialized`](SymmetricTransfer::wait_until_initialized)
///    and parks until the consumer has arrived.
/// 2. The producer awaits [`send`](SymmetricTransfer::send) for each value.
/// 3. The consumer awaits [`recv`](SymmetricTransfer::recv), which yields
///    `Some(value)` per transfer and `None` once the producer has
///    [`close`](SymmetricTransfer::close)d — a value in transit at close time
///    is delivered before the end-of-stream.
pub struct SymmetricTransfer<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    slot: Option<T>,
    closed: bool,
    initialized: bool,
    producer: Option<Waker>,
    consumer: Option<Waker>,
}

impl<T> Default for SymmetricTransfer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SymmetricTransfer<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slot: None,
                closed: false,
                initialized: false,
                producer: None,
                consumer: None,
            }),
        }
    }

    /// Consumer side: mark this end attached and release a producer parked
    /// in [`wait_until_initialized`](SymmetricTransfer::wait_until_initialized).
    pub fn initialize(&self) -> Initialize<'_, T> {
        Initialize { transfer: self }
    }

    /// Producer side: park until the consumer has initialized.
    pub fn wait_until_initialized(&self) -> WaitInitialized<'_, T> {
        WaitInitialized { transfer: self }
    }

    /// Producer side: hand `value` to the consumer. Completes once the
    /// consumer has taken it out of the slot.
    ///
    /// # Panics
    ///
    /// Panics if the transfer is already closed; the producer owns
    /// [`close`](SymmetricTransfer::close), so sending after it is a
    /// protocol violation.
    pub fn send(&self, value: T) -> SendOp<'_, T> {
        SendOp {
            transfer: self,
            value: Some(value),
        }
    }

    /// Consumer side: take the next value, or `None` after close once the
    /// slot is drained.
    pub fn recv(&self) -> RecvOp<'_, T> {
        RecvOp { transfer: self }
    }

    /// Producer side, idempotent. A parked consumer wakes and observes
    /// end-of-stream.
    pub fn close(&self) {
        let consumer = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.consumer.take()
        };
        if let Some(waker) = consumer {
            waker.wake();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

pub struct Initialize<'a, T> {
    transfer: &'a SymmetricTransfer<T>,
}

impl<T> Future for Initialize<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let producer = {
            let mut inner = self.transfer.inner.lock();
            inner.initialized = true;
            inner.producer.take()
        };
        if let Some(waker) = producer {
            waker.wake();
        }
        Poll::Ready(())
    }
}

pub struct WaitInitialized<'a, T> {
    transfer: &'a SymmetricTransfer<T>,
}

impl<T> Future for WaitInitialized<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut inner = self.transfer.inner.lock();
        if inner.initialized {
            Poll::Ready(())
        } else {
            inner.producer = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

pub struct SendOp<'a, T> {
    transfer: &'a SymmetricTransfer<T>,
    value: Option<T>,
}

impl<T> Unpin for SendOp<'_, T> {}

impl<T> Future for SendOp<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // Option state keeps the future Unpin; safe to take through Pin.
        let this = self.get_mut();
        let mut inner = this.transfer.inner.lock();

        match this.value.take() {
            Some(value) => {
                assert!(!inner.closed, "value sent on a closed transfer");
                debug_assert!(
                    inner.slot.is_none(),
                    "transfer already has a value in flight"
                );
                inner.slot = Some(value);
                // Park before waking: the consumer may take the value and
                // wake us from inside this very call chain.
                inner.producer = Some(cx.waker().clone());
                let consumer = inner.consumer.take();
                drop(inner);
                if let Some(waker) = consumer {
                    waker.wake();
                }
                Poll::Pending
            }
            None => {
                if inner.slot.is_none() {
                    Poll::Ready(())
                } else {
                    inner.producer = Some(cx.waker().clone());
                    Poll::Pending
                }
            }
        }
    }
}

pub struct RecvOp<'a, T> {
    transfer: &'a SymmetricTransfer<T>,
}

impl<T> Future for RecvOp<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut inner = self.transfer.inner.lock();
        if let Some(value) = inner.slot.take() {
            let producer = inner.producer.take();
            drop(inner);
            if let Some(waker) = producer {
                waker.wake();
            }
            return Poll::Ready(Some(value));
        }
        if inner.closed {
            return Poll::Ready(None);
        }
        inner.consumer = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::sync::Arc;

    #[test]
    fn values_transfer_exactly_once() {
        let transfer = Arc::new(SymmetricTransfer::new());

        let consumer = {
            let transfer = transfer.clone();
            Task::new(async move {
                transfer.initialize().await;
                let mut seen = Vec::new();
                while let Some(value) = transfer.recv().await {
                    seen.push(value);
                }
                seen
            })
        };
        let producer = {
            let transfer = transfer.clone();
            Task::new(async move {
                transfer.wait_until_initialized().await;
                for i in 0..3 {
                    transfer.send(i).await;
                }
                transfer.close();
            })
        };

        consumer.resume();
        producer.resume();

        assert!(producer.is_ready());
        assert!(consumer.is_ready());
        assert_eq!(crate::task::sync_wait(consumer), vec![0, 1, 2]);
    }

    #[test]
    fn producer_parks_until_consumer_initializes() {
        let transfer = Arc::new(SymmetricTransfer::<u32>::new());

        let producer = {
            let transfer = transfer.clone();
            Task::new(async move {
                transfer.wait_until_initialized().await;
            })
        };
        producer.resume();
        assert!(!producer.is_ready());

        let consumer = {
            let transfer = transfer.clone();
            Task::new(async move {
                transfer.initialize().await;
            })
        };
        consumer.resume();
        assert!(consumer.is_ready());
        assert!(producer.is_ready());
    }

    #[test]
    fn close_delivers_pending_value_first() {
        let transfer = Arc::new(SymmetricTransfer::new());
        let gate = Arc::new(crate::sync::Event::new());

        let producer = {
            let transfer = transfer.clone();
            Task::new(async move {
                transfer.wait_until_initialized().await;
                transfer.send(42u32).await;
            })
        };
        // The consumer initializes but holds off reading until the gate
        // opens, so the value stays in transit while we close.
        let consumer = {
            let transfer = transfer.clone();
            let gate = gate.clone();
            Task::new(async move {
                transfer.initialize().await;
                gate.wait().await;
                let first = transfer.recv().await;
                let second = transfer.recv().await;
                (first, second)
            })
        };

        consumer.resume();
        producer.resume();
        transfer.close();
        gate.set();

        assert_eq!(crate::task::sync_wait(consumer), (Some(42), None));
    }

    #[test]
    fn close_is_idempotent() {
        let transfer = SymmetricTransfer::<u32>::new();
        transfer.close();
        transfer.close();
        assert!(transfer.is_closed());
    }
}
