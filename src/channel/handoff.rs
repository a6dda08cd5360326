use crate::channel::ChannelError;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Single-slot channel for one writer and one reader.
///
/// [`write`](Handoff::write) parks until the reader has taken the value, so
/// there is never more than one value in flight. [`read`](Handoff::read)
/// yields `Some(value)` per handoff and `None` after
/// [`close`](Handoff::close); a value pending at close time is delivered
/// before the end-of-stream.
pub struct Handoff<T> {
    state: Mutex<State<T>>,
}

struct State<T> {
    slot: Option<T>,
    closed: bool,
    reader: Option<Waker>,
    writer: Option<Waker>,
}

impl<T: Send> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Handoff<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slot: None,
                closed: false,
                reader: None,
                writer: None,
            }),
        }
    }

    /// Offer `value` to the reader; completes once the reader has taken it.
    /// Fails with [`ChannelError::Closed`] if the handoff is already closed.
    pub fn write(&self, value: T) -> HandoffWrite<'_, T> {
        HandoffWrite {
            handoff: self,
            value: Some(value),
        }
    }

    /// Take the next value, or `None` once closed and drained.
    pub fn read(&self) -> HandoffRead<'_, T> {
        HandoffRead { handoff: self }
    }

    /// Idempotent. With no value pending the reader immediately observes
    /// end-of-stream.
    pub fn close(&self) {
        let reader = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.reader.take()
        };
        if let Some(waker) = reader {
            waker.wake();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Future returned by [`Handoff::write`].
pub struct HandoffWrite<'a, T> {
    handoff: &'a Handoff<T>,
    value: Option<T>,
}

impl<T> Unpin for HandoffWrite<'_, T> {}

impl<T: Send> Future for HandoffWrite<'_, T> {
    type Output = Result<(), ChannelError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut state = this.handoff.state.lock();

        match this.value.take() {
            Some(value) => {
                if state.closed {
                    return Poll::Ready(Err(ChannelError::Closed));
                }
                debug_assert!(state.slot.is_none(), "handoff supports one writer at a time");
                state.slot = Some(value);
                state.writer = Some(cx.waker().clone());
                let reader = state.reader.take();
                drop(state);
                if let Some(waker) = reader {
                    waker.wake();
                }
                Poll::Pending
            }
            None => {
                if state.slot.is_none() {
                    Poll::Ready(Ok(()))
                } else {
                    state.writer = Some(cx.waker().clone());
                    Poll::Pending
                }
            }
        }
    }
}

/// Future returned by [`Handoff::read`].
pub struct HandoffRead<'a, T> {
    handoff: &'a Handoff<T>,
}

impl<T: Send> Future for HandoffRead<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut state = self.handoff.state.lock();
        if let Some(value) = state.slot.take() {
            let writer = state.writer.take();
            drop(state);
            if let Some(waker) = writer {
                waker.wake();
            }
            return Poll::Ready(Some(value));
        }
        if state.closed {
            return Poll::Ready(None);
        }
        state.reader = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::sync::Arc;

    #[test]
    fn ten_writes_then_close() {
        let handoff = Arc::new(Handoff::new());

        let sink = {
            let handoff = handoff.clone();
            Task::new(async move {
                let mut reads = 0usize;
                while let Some(value) = handoff.read().await {
                    assert_eq!(value, 42);
                    reads += 1;
                }
                reads
            })
        };
        let src = {
            let handoff = handoff.clone();
            Task::new(async move {
                for _ in 0..10 {
                    handoff.write(42usize).await.expect("handoff closed early");
                }
                handoff.close();
            })
        };

        sink.resume();
        src.resume();

        assert!(src.is_ready());
        assert_eq!(crate::task::sync_wait(sink), 10);
    }

    #[test]
    fn close_with_no_pending_value_ends_stream() {
        let handoff = Arc::new(Handoff::<u32>::new());

        let sink = {
            let handoff = handoff.clone();
            Task::new(async move { handoff.read().await })
        };
        sink.resume();
        assert!(!sink.is_ready());

        handoff.close();
        assert!(sink.is_ready());
        assert_eq!(crate::task::sync_wait(sink), None);
    }

    #[test]
    fn write_after_close_fails() {
        let handoff = Arc::new(Handoff::new());
        handoff.close();

        let src = {
            let handoff = handoff.clone();
            Task::new(async move { handoff.write(1u32).await })
        };
        src.resume();
        assert_eq!(crate::task::sync_wait(src), Err(ChannelError::Closed));
    }

    #[test]
    fn close_is_idempotent() {
        let handoff = Handoff::<u32>::new();
        handoff.close();
        handoff.close();
        assert!(handoff.is_closed());
    }
}
