//! Lazy asynchronous sequences.

use futures::stream::{BoxStream, Fuse, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A lazy, single-consumer sequence of values produced by a coroutine.
///
/// The producer makes no progress until the consumer asks for the next
/// value. The sequence is single-pass: once it ends, [`next`](AsyncGenerator::next)
/// keeps returning `None` — end-of-stream is a sentinel, never an error.
pub struct AsyncGenerator<T> {
    stream: Fuse<BoxStream<'static, T>>,
}

impl<T: Send + 'static> AsyncGenerator<T> {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            stream: stream.boxed().fuse(),
        }
    }

    /// Resume the producer until it yields the next value, or `None` at
    /// end-of-stream.
    pub async fn next(&mut self) -> Option<T> {
        self.stream.next().await
    }
}

impl<T: Send + 'static> Stream for AsyncGenerator<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::sync_wait;

    #[test]
    fn yields_each_value_then_ends() {
        let mut generator = AsyncGenerator::from_stream(futures::stream::iter(0..3));

        sync_wait(async move {
            assert_eq!(generator.next().await, Some(0));
            assert_eq!(generator.next().await, Some(1));
            assert_eq!(generator.next().await, Some(2));
            assert_eq!(generator.next().await, None);
            // Past end-of-stream stays at the sentinel.
            assert_eq!(generator.next().await, None);
        });
    }

    #[test]
    fn production_is_lazy() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let mut generator = AsyncGenerator::from_stream(futures::stream::iter(0..10).map(
            move |value| {
                counter.fetch_add(1, Ordering::SeqCst);
                value
            },
        ));

        assert_eq!(produced.load(Ordering::SeqCst), 0);
        sync_wait(async {
            generator.next().await;
        });
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }
}
