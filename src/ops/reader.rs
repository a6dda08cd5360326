use crate::channel::{Channel, ChannelError, ReadableChannel};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Decides when an operator is ready to run: awaiting
/// [`next`](SchedulingTerm::next) yields the operator's next input datum or
/// [`ChannelError::Closed`] at end-of-stream.
pub trait SchedulingTerm {
    type Item: Send;

    fn next(&self) -> impl Future<Output = Result<Self::Item, ChannelError>> + Send + '_;
}

/// Scheduling term reading from a concrete channel.
///
/// Holds a shared reference to the channel; [`disconnect`](ChannelReader::disconnect)
/// releases it. Awaiting a disconnected reader is a programming error.
pub struct ChannelReader<C: Channel> {
    channel: Option<Arc<C>>,
}

impl<C: Channel> ChannelReader<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    pub fn unconnected() -> Self {
        Self { channel: None }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// # Panics
    ///
    /// Panics if the reader is already connected.
    pub fn connect(&mut self, channel: Arc<C>) {
        assert!(
            self.channel.is_none(),
            "channel reader already connected to a channel"
        );
        self.channel = Some(channel);
    }

    /// Release the held channel reference.
    pub fn disconnect(&mut self) {
        self.channel = None;
    }
}

impl<C: Channel> SchedulingTerm for ChannelReader<C> {
    type Item = C::Item;

    fn next(&self) -> impl Future<Output = Result<C::Item, ChannelError>> + Send + '_ {
        let channel = self
            .channel
            .clone()
            .expect("channel reader awaited while disconnected");
        async move { channel.async_read().await }
    }
}

/// Scheduling term with the channel type erased behind a stored read
/// closure, so operators over `T` need not name their upstream's channel.
pub struct AnyChannelReader<T> {
    read: Option<Box<dyn Fn() -> BoxFuture<'static, Result<T, ChannelError>> + Send + Sync>>,
}

impl<T: Send + 'static> Default for AnyChannelReader<T> {
    fn default() -> Self {
        Self::unconnected()
    }
}

impl<T: Send + 'static> AnyChannelReader<T> {
    pub fn unconnected() -> Self {
        Self { read: None }
    }

    pub fn is_connected(&self) -> bool {
        self.read.is_some()
    }

    /// Connect a concrete channel.
    ///
    /// # Panics
    ///
    /// Panics if the reader is already connected.
    pub fn connect<C>(&mut self, channel: Arc<C>)
    where
        C: Channel<Item = T>,
    {
        self.assert_unconnected();
        self.read = Some(Box::new(move || {
            let channel = channel.clone();
            Box::pin(async move { channel.async_read().await })
        }));
    }

    /// Connect a type-erased read half.
    ///
    /// # Panics
    ///
    /// Panics if the reader is already connected.
    pub fn connect_readable<R>(&mut self, readable: R)
    where
        R: ReadableChannel<T> + 'static,
    {
        self.assert_unconnected();
        let readable = Arc::new(readable);
        self.read = Some(Box::new(move || {
            let readable = readable.clone();
            Box::pin(async move { readable.async_read().await })
        }));
    }

    /// Release the held channel reference.
    pub fn disconnect(&mut self) {
        self.read = None;
    }

    fn assert_unconnected(&self) {
        assert!(
            self.read.is_none(),
            "channel reader already connected to a channel"
        );
    }
}

impl<T: Send + 'static> SchedulingTerm for AnyChannelReader<T> {
    type Item = T;

    fn next(&self) -> impl Future<Output = Result<T, ChannelError>> + Send + '_ {
        (self
            .read
            .as_ref()
            .expect("channel reader awaited while disconnected"))()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelProvider, ImmediateChannel, WritableChannel};
    use crate::task::{sync_wait, Task};

    #[test]
    fn reader_yields_values_then_closed() {
        let channel = Arc::new(ImmediateChannel::<i32>::new());
        let reader = ChannelReader::new(channel.clone());

        let consumer = Task::new(async move {
            let mut seen = Vec::new();
            loop {
                match reader.next().await {
                    Ok(value) => seen.push(value),
                    Err(ChannelError::Closed) => break,
                }
            }
            seen
        });
        consumer.resume();

        let writer = {
            let channel = channel.clone();
            Task::new(async move {
                channel.async_write(5).await.unwrap();
                channel.async_write(6).await.unwrap();
                channel.close();
            })
        };
        writer.resume();

        assert_eq!(sync_wait(consumer), vec![5, 6]);
    }

    #[test]
    fn any_reader_erases_the_channel_type() {
        let provider = ChannelProvider::new(ImmediateChannel::<i32>::new());

        let mut reader = AnyChannelReader::unconnected();
        assert!(!reader.is_connected());
        reader.connect_readable(provider.readable_channel());
        assert!(reader.is_connected());

        let consumer = Task::new(async move {
            let first = reader.next().await;
            let second = reader.next().await;
            (first, second)
        });
        consumer.resume();

        let writable = provider.writable_channel();
        let writer = Task::new(async move {
            writable.async_write(11).await.unwrap();
            writable.close();
        });
        writer.resume();

        assert_eq!(sync_wait(consumer), (Ok(11), Err(ChannelError::Closed)));
    }

    #[test]
    fn disconnect_releases_the_channel() {
        let channel = Arc::new(ImmediateChannel::<i32>::new());
        let mut reader = ChannelReader::new(channel.clone());
        assert!(reader.is_connected());

        reader.disconnect();
        assert!(!reader.is_connected());
        // The reader no longer pins the channel alive.
        assert_eq!(Arc::strong_count(&channel), 1);
    }

    #[test]
    #[should_panic(expected = "awaited while disconnected")]
    fn awaiting_a_disconnected_reader_is_a_programming_error() {
        let reader = AnyChannelReader::<i32>::unconnected();
        let _ = reader.next();
    }
}
