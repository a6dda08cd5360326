use crate::channel::ChannelError;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Unbuffered rendezvous channel with LIFO parking.
///
/// A write completes when a reader has the value: if a reader is already
/// parked the transfer happens synchronously inside the write's first poll
/// (the writer never suspends), otherwise the writer parks until a reader
/// arrives. Reads mirror this exactly.
///
/// Waiters park on LIFO stacks, so the *most recently arrived* reader is
/// matched first; earlier arrivals keep waiting. This is a contract, not an
/// accident — see `reader_x4_writer_x1` in the module tests.
///
/// [`close`](ImmediateChannel::close) is terminal and idempotent: every
/// parked waiter fails with [`ChannelError::Closed`] (readers in LIFO
/// order), and later writes are refused. No value is ever dropped silently:
/// a written value is either observed by a reader or its write fails.
pub struct ImmediateChannel<T> {
    state: Mutex<State<T>>,
}

struct State<T> {
    closed: bool,
    // At most one of the two stacks is ever non-empty: a waiter only parks
    // after failing to match a peer on the opposite stack.
    parked_writers: SmallVec<[Arc<WriteWaiter<T>>; 4]>,
    parked_readers: SmallVec<[Arc<ReadWaiter<T>>; 4]>,
}

struct ReadWaiter<T> {
    state: Mutex<ReadWaiterState<T>>,
}

struct ReadWaiterState<T> {
    waker: Waker,
    outcome: Option<Result<T, ChannelError>>,
}

struct WriteWaiter<T> {
    state: Mutex<WriteWaiterState<T>>,
}

struct WriteWaiterState<T> {
    waker: Waker,
    /// Taken by the matching reader before the writer is woken.
    value: Option<T>,
    outcome: Option<Result<(), ChannelError>>,
}

impl<T: Send> Default for ImmediateChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ImmediateChannel<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                closed: false,
                parked_writers: SmallVec::new(),
                parked_readers: SmallVec::new(),
            }),
        }
    }

    /// Hand `value` to a reader. Fails with [`ChannelError::Closed`] if the
    /// channel is closed before a reader takes the value.
    pub fn async_write(&self, value: T) -> WriteOp<'_, T> {
        WriteOp {
            channel: self,
            value: Some(value),
            node: None,
        }
    }

    /// Take the next value from a writer, or [`ChannelError::Closed`] once
    /// the channel is closed and no writer is parked.
    pub fn async_read(&self) -> ReadOp<'_, T> {
        ReadOp {
            channel: self,
            node: None,
        }
    }

    /// Close the channel, failing every parked reader and writer. Idempotent.
    pub fn close(&self) {
        let (readers, writers) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let readers: SmallVec<[Arc<ReadWaiter<T>>; 4]> =
                state.parked_readers.drain(..).collect();
            let writers: SmallVec<[Arc<WriteWaiter<T>>; 4]> =
                state.parked_writers.drain(..).collect();
            (readers, writers)
        };

        // Most recent arrivals first, matching the parking discipline.
        let mut wakers: SmallVec<[Waker; 8]> = SmallVec::new();
        for reader in readers.iter().rev() {
            let mut waiter = reader.state.lock();
            waiter.outcome = Some(Err(ChannelError::Closed));
            wakers.push(waiter.waker.clone());
        }
        for writer in writers.iter().rev() {
            let mut waiter = writer.state.lock();
            waiter.value = None;
            waiter.outcome = Some(Err(ChannelError::Closed));
            wakers.push(waiter.waker.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Future returned by [`ImmediateChannel::async_write`].
pub struct WriteOp<'a, T> {
    channel: &'a ImmediateChannel<T>,
    value: Option<T>,
    node: Option<Arc<WriteWaiter<T>>>,
}

impl<T> Unpin for WriteOp<'_, T> {}

impl<T: Send> Future for WriteOp<'_, T> {
    type Output = Result<(), ChannelError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(node) = this.node.take() {
            let mut waiter = node.state.lock();
            if let Some(outcome) = waiter.outcome.take() {
                return Poll::Ready(outcome);
            }
            if !waiter.waker.will_wake(cx.waker()) {
                waiter.waker = cx.waker().clone();
            }
            drop(waiter);
            this.node = Some(node);
            return Poll::Pending;
        }

        let mut state = this.channel.state.lock();
        if state.closed {
            return Poll::Ready(Err(ChannelError::Closed));
        }

        if let Some(reader) = state.parked_readers.pop() {
            // Synchronous transfer: the reader takes the value and resumes;
            // this write completes without suspending.
            let value = this.value.take().expect("write polled twice with no value");
            let waker = {
                let mut waiter = reader.state.lock();
                waiter.outcome = Some(Ok(value));
                waiter.waker.clone()
            };
            drop(state);
            waker.wake();
            return Poll::Ready(Ok(()));
        }

        let node = Arc::new(WriteWaiter {
            state: Mutex::new(WriteWaiterState {
                waker: cx.waker().clone(),
                value: this.value.take(),
                outcome: None,
            }),
        });
        state.parked_writers.push(node.clone());
        this.node = Some(node);
        Poll::Pending
    }
}

impl<T> Drop for WriteOp<'_, T> {
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            let mut state = self.channel.state.lock();
            state
                .parked_writers
                .retain(|parked| !Arc::ptr_eq(parked, &node));
        }
    }
}

/// Future returned by [`ImmediateChannel::async_read`].
pub struct ReadOp<'a, T> {
    channel: &'a ImmediateChannel<T>,
    node: Option<Arc<ReadWaiter<T>>>,
}

impl<T: Send> Future for ReadOp<'_, T> {
    type Output = Result<T, ChannelError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(node) = this.node.take() {
            let mut waiter = node.state.lock();
            if let Some(outcome) = waiter.outcome.take() {
                return Poll::Ready(outcome);
            }
            if !waiter.waker.will_wake(cx.waker()) {
                waiter.waker = cx.waker().clone();
            }
            drop(waiter);
            this.node = Some(node);
            return Poll::Pending;
        }

        let mut state = this.channel.state.lock();

        if let Some(writer) = state.parked_writers.pop() {
            // Take the value first, then release the writer: its resume
            // happens strictly after the value changed hands.
            let (value, waker) = {
                let mut waiter = writer.state.lock();
                let value = waiter.value.take().expect("parked writer with no value");
                waiter.outcome = Some(Ok(()));
                (value, waiter.waker.clone())
            };
            drop(state);
            waker.wake();
            return Poll::Ready(Ok(value));
        }

        if state.closed {
            return Poll::Ready(Err(ChannelError::Closed));
        }

        let node = Arc::new(ReadWaiter {
            state: Mutex::new(ReadWaiterState {
                waker: cx.waker().clone(),
                outcome: None,
            }),
        });
        state.parked_readers.push(node.clone());
        this.node = Some(node);
        Poll::Pending
    }
}

impl<T> Drop for ReadOp<'_, T> {
    fn drop(&mut self) {
        let Some(node) = self.node.take() else {
            return;
        };
        let mut state = self.channel.state.lock();
        state
            .parked_readers
            .retain(|parked| !Arc::ptr_eq(parked, &node));

        // A writer may have matched this read between its last poll and this
        // drop: it already observed a successful write, but the delivered
        // value sits unconsumed in the node. Re-offer that value instead of
        // discarding it with the node.
        let (value, waker) = {
            let mut waiter = node.state.lock();
            match waiter.outcome.take() {
                Some(Ok(value)) => {
                    let waker = waiter.waker.clone();
                    (value, waker)
                }
                _ => return,
            }
        };

        if let Some(reader) = state.parked_readers.pop() {
            let peer = {
                let mut waiter = reader.state.lock();
                waiter.outcome = Some(Ok(value));
                waiter.waker.clone()
            };
            drop(state);
            peer.wake();
        } else {
            // No reader to hand it to: park the value as a pending write so
            // the next reader receives it. The cancelled read's waker is
            // stale, so waking it later is a no-op.
            state.parked_writers.push(Arc::new(WriteWaiter {
                state: Mutex::new(WriteWaiterState {
                    waker,
                    value: Some(value),
                    outcome: None,
                }),
            }));
        }
    }
}
