use crate::channel::{ChannelError, Handoff, ImmediateChannel};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Contract of a concrete channel implementation.
///
/// Implementations advertise their element type and provide the three
/// operations every edge needs. The type-erased surface below
/// ([`ReadableChannel`] / [`WritableChannel`]) is built on top of this.
pub trait Channel: Send + Sync + 'static {
    type Item: Send + 'static;

    fn async_read(&self) -> impl Future<Output = Result<Self::Item, ChannelError>> + Send + '_;

    fn async_write(
        &self,
        value: Self::Item,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send + '_;

    fn close(&self);
}

impl<T: Send + 'static> Channel for ImmediateChannel<T> {
    type Item = T;

    fn async_read(&self) -> impl Future<Output = Result<T, ChannelError>> + Send + '_ {
        ImmediateChannel::async_read(self)
    }

    fn async_write(&self, value: T) -> impl Future<Output = Result<(), ChannelError>> + Send + '_ {
        ImmediateChannel::async_write(self, value)
    }

    fn close(&self) {
        ImmediateChannel::close(self);
    }
}

impl<T: Send + 'static> Channel for Handoff<T> {
    type Item = T;

    fn async_read(&self) -> impl Future<Output = Result<T, ChannelError>> + Send + '_ {
        async move { self.read().await.ok_or(ChannelError::Closed) }
    }

    fn async_write(&self, value: T) -> impl Future<Output = Result<(), ChannelError>> + Send + '_ {
        self.write(value)
    }

    fn close(&self) {
        Handoff::close(self);
    }
}

/// Read half of a type-erased channel.
pub trait ReadableChannel<T>: Send + Sync {
    fn async_read(&self) -> BoxFuture<'_, Result<T, ChannelError>>;
}

/// Write half of a type-erased channel. Dropping a writable handle does not
/// close the channel; only [`close`](WritableChannel::close) does.
pub trait WritableChannel<T>: Send + Sync {
    fn async_write(&self, value: T) -> BoxFuture<'_, Result<(), ChannelError>>;

    fn close(&self);
}

/// A channel erased behind three captured closures.
///
/// Wraps any [`Channel`] by capturing its read, write and close operations
/// over a shared handle; the wrapper (and everything holding it) keeps the
/// underlying channel alive.
pub struct GenericChannel<T> {
    read: Box<dyn Fn() -> BoxFuture<'static, Result<T, ChannelError>> + Send + Sync>,
    write: Box<dyn Fn(T) -> BoxFuture<'static, Result<(), ChannelError>> + Send + Sync>,
    close: Box<dyn Fn() + Send + Sync>,
}

impl<T: Send + 'static> GenericChannel<T> {
    pub fn new<C>(channel: Arc<C>) -> Self
    where
        C: Channel<Item = T>,
    {
        let reader = channel.clone();
        let writer = channel.clone();
        let closer = channel;

        Self {
            read: Box::new(move || {
                let channel = reader.clone();
                Box::pin(async move { channel.async_read().await })
            }),
            write: Box::new(move |value| {
                let channel = writer.clone();
                Box::pin(async move { channel.async_write(value).await })
            }),
            close: Box::new(move || closer.close()),
        }
    }
}

impl<T: Send + 'static> Channel for GenericChannel<T> {
    type Item = T;

    fn async_read(&self) -> impl Future<Output = Result<T, ChannelError>> + Send + '_ {
        (self.read)()
    }

    fn async_write(&self, value: T) -> impl Future<Output = Result<(), ChannelError>> + Send + '_ {
        (self.write)(value)
    }

    fn close(&self) {
        (self.close)();
    }
}

impl<T: Send + 'static> ReadableChannel<T> for GenericChannel<T> {
    fn async_read(&self) -> BoxFuture<'_, Result<T, ChannelError>> {
        (self.read)()
    }
}

impl<T: Send + 'static> WritableChannel<T> for GenericChannel<T> {
    fn async_write(&self, value: T) -> BoxFuture<'_, Result<(), ChannelError>> {
        (self.write)(value)
    }

    fn close(&self) {
        (self.close)();
    }
}

/// Takes ownership of a concrete channel and vends shared readable and
/// writable halves. The halves jointly own the channel — it lives as long as
/// the longest-held half — and neither half closes it on drop.
pub struct ChannelProvider<C: Channel> {
    channel: Arc<C>,
}

impl<C: Channel> ChannelProvider<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel: Arc::new(channel),
        }
    }

    pub fn readable_channel(&self) -> ReadableHalf<C> {
        ReadableHalf {
            channel: self.channel.clone(),
        }
    }

    pub fn writable_channel(&self) -> WritableHalf<C> {
        WritableHalf {
            channel: self.channel.clone(),
        }
    }
}

/// Shared read half vended by [`ChannelProvider`].
pub struct ReadableHalf<C: Channel> {
    channel: Arc<C>,
}

impl<C: Channel> Clone for ReadableHalf<C> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<C: Channel> ReadableChannel<C::Item> for ReadableHalf<C> {
    fn async_read(&self) -> BoxFuture<'_, Result<C::Item, ChannelError>> {
        Box::pin(self.channel.async_read())
    }
}

/// Shared write half vended by [`ChannelProvider`].
pub struct WritableHalf<C: Channel> {
    channel: Arc<C>,
}

impl<C: Channel> Clone for WritableHalf<C> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<C: Channel> WritableChannel<C::Item> for WritableHalf<C> {
    fn async_write(&self, value: C::Item) -> BoxFuture<'_, Result<(), ChannelError>> {
        Box::pin(self.channel.async_write(value))
    }

    fn close(&self) {
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::sync_wait;
    use static_assertions::assert_impl_all;

    assert_impl_all!(GenericChannel<u32>: Send, Sync);
    assert_impl_all!(ReadableHalf<ImmediateChannel<u32>>: Send, Sync, Clone);
    assert_impl_all!(WritableHalf<ImmediateChannel<u32>>: Send, Sync, Clone);

    #[test]
    fn provider_halves_share_one_channel() {
        let provider = ChannelProvider::new(ImmediateChannel::<u32>::new());
        let readable = provider.readable_channel();
        let writable = provider.writable_channel();
        drop(provider);

        sync_wait(async move {
            let read = readable.async_read();
            futures::pin_mut!(read);
            assert!(futures::poll!(read.as_mut()).is_pending());

            writable.async_write(7).await.unwrap();
            assert_eq!(read.await, Ok(7));
        });
    }

    #[test]
    fn dropping_writable_half_does_not_close() {
        let provider = ChannelProvider::new(ImmediateChannel::<u32>::new());
        let readable = provider.readable_channel();
        let writable = provider.writable_channel();
        let second_writable = provider.writable_channel();
        drop(writable);

        sync_wait(async move {
            let read = readable.async_read();
            futures::pin_mut!(read);
            // Still pending: only an explicit close ends the stream.
            assert!(futures::poll!(read.as_mut()).is_pending());

            second_writable.async_write(1).await.unwrap();
            assert_eq!(read.await, Ok(1));
        });
    }

    #[test]
    fn generic_channel_routes_to_concrete() {
        let channel = Arc::new(ImmediateChannel::<u32>::new());
        let generic = GenericChannel::new(channel);

        sync_wait(async move {
            let read = ReadableChannel::async_read(&generic);
            futures::pin_mut!(read);
            assert!(futures::poll!(read.as_mut()).is_pending());

            WritableChannel::async_write(&generic, 9).await.unwrap();
            assert_eq!(read.await, Ok(9));
        });

        let closed = Arc::new(ImmediateChannel::<u32>::new());
        let generic = GenericChannel::new(closed.clone());
        WritableChannel::close(&generic);
        assert!(closed.is_closed());
    }
}
