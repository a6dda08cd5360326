use crate::channel::{ChannelError, WritableChannel};
use crate::stream::AsyncGenerator;
use crate::sync::SymmetricTransfer;
use crate::task::Task;
use futures::stream;
use std::future::Future;
use std::sync::Arc;

/// Producer side of an operator edge.
///
/// An output owns a [`SymmetricTransfer`] shared with at most one downstream
/// edge. It starts unconnected; binding a downstream is exclusive and
/// one-shot:
///
/// - [`connect_generator`](Output::connect_generator) — a direct, in-process
///   edge: the downstream operator consumes the returned
///   [`AsyncGenerator`]. Only legal for a single output with no concurrency
///   split, because a generator yields to exactly one consumer.
/// - [`connect_channel`](Output::connect_channel) — a channel edge: the
///   returned writer task forwards every produced value into the supplied
///   writable channel. The producing operator owns and runs that task.
///
/// The producer then awaits [`init`](Output::init) (which parks until the
/// downstream edge has attached), emits values through its
/// [`OutputStream`], and [`finalize`](Output::finalize)s to propagate
/// end-of-stream.
pub struct Output<T> {
    transfer: Arc<SymmetricTransfer<T>>,
    connected: bool,
}

impl<T: Send + 'static> Default for Output<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Output<T> {
    pub fn new() -> Self {
        Self {
            transfer: Arc::new(SymmetricTransfer::new()),
            connected: false,
        }
    }

    /// The handle the operator body emits into.
    pub fn output_stream(&self) -> OutputStream<T> {
        OutputStream {
            transfer: self.transfer.clone(),
        }
    }

    /// True once a downstream edge has been bound.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Park until the downstream edge has attached to the transfer.
    ///
    /// # Panics
    ///
    /// Panics if no downstream edge was connected; initializing an
    /// unconnected output would park forever.
    pub async fn init(&self) {
        assert!(
            self.connected,
            "output initialized before a downstream edge was connected"
        );
        self.transfer.wait_until_initialized().await;
    }

    /// Close the transfer; the downstream edge observes end-of-stream and
    /// completes. Idempotent.
    pub fn finalize(&self) {
        self.transfer.close();
    }

    /// Bind a direct generator edge and hand back the downstream's view of
    /// this output.
    ///
    /// # Panics
    ///
    /// Panics if the output is already connected.
    pub fn connect_generator(&mut self) -> AsyncGenerator<T> {
        self.mark_connected();
        let transfer = self.transfer.clone();
        AsyncGenerator::from_stream(stream::unfold(
            (transfer, false),
            |(transfer, initialized)| async move {
                if !initialized {
                    transfer.initialize().await;
                }
                transfer
                    .recv()
                    .await
                    .map(|value| (value, (transfer, true)))
            },
        ))
    }

    /// Bind a channel edge: the returned writer task forwards every value
    /// into `channel` and completes when this output is finalized. A close
    /// race on the channel surfaces as the task's result.
    ///
    /// # Panics
    ///
    /// Panics if the output is already connected.
    pub fn connect_channel<W>(&mut self, channel: W) -> Task<Result<(), ChannelError>>
    where
        W: WritableChannel<T> + 'static,
    {
        self.mark_connected();
        let transfer = self.transfer.clone();
        Task::new(async move {
            transfer.initialize().await;
            while let Some(value) = transfer.recv().await {
                channel.async_write(value).await?;
            }
            Ok(())
        })
    }

    fn mark_connected(&mut self) {
        assert!(
            !self.connected,
            "output already connected to a downstream edge"
        );
        self.connected = true;
    }
}

/// Producer-side emit handle for one output, backed by the output's
/// transfer. [`emit`](OutputStream::emit) completes once the downstream edge
/// has taken the value.
pub struct OutputStream<T> {
    transfer: Arc<SymmetricTransfer<T>>,
}

impl<T> Clone for OutputStream<T> {
    fn clone(&self) -> Self {
        Self {
            transfer: self.transfer.clone(),
        }
    }
}

impl<T: Send + 'static> OutputStream<T> {
    pub async fn emit(&self, value: T) {
        self.transfer.send(value).await;
    }
}

/// The tuple of data types an operator produces, mapped to its per-output
/// machinery. Implemented for tuples of arity 1 through 4.
pub trait OutputTuple: Sized {
    type Outputs;
    type Streams;

    const ARITY: u32;

    fn make_outputs() -> Self::Outputs;

    fn init(outputs: &Self::Outputs) -> impl Future<Output = Self::Streams> + Send + '_;

    fn finalize(outputs: &Self::Outputs);
}

/// The outputs of a multi-output operator.
///
/// `init` brings up each sub-output in declaration order and returns the
/// tuple of emit handles; `finalize` closes each. Multi-output operators
/// connect through channel edges only — a generator edge would tie the whole
/// operator to a single consumer.
pub struct Outputs<T: OutputTuple> {
    outputs: T::Outputs,
}

impl<T: OutputTuple> Default for Outputs<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: OutputTuple> Outputs<T> {
    pub fn new() -> Self {
        Self {
            outputs: T::make_outputs(),
        }
    }

    pub fn number_of_outputs(&self) -> u32 {
        T::ARITY
    }

    /// Access the per-output machinery, e.g. to connect each sub-output's
    /// edge before `init`.
    pub fn outputs_mut(&mut self) -> &mut T::Outputs {
        &mut self.outputs
    }

    /// Initialize every sub-output in order; completes once each downstream
    /// edge has attached, yielding the emit handles.
    pub async fn init(&self) -> T::Streams {
        T::init(&self.outputs).await
    }

    /// Finalize every sub-output.
    pub fn finalize(&self) {
        T::finalize(&self.outputs);
    }
}

macro_rules! impl_output_tuple {
    ($arity:expr => $(($ty:ident, $idx:tt)),+) => {
        impl<$($ty: Send + 'static,)+> OutputTuple for ($($ty,)+) {
            type Outputs = ($(Output<$ty>,)+);
            type Streams = ($(OutputStream<$ty>,)+);

            const ARITY: u32 = $arity;

            fn make_outputs() -> Self::Outputs {
                ($(Output::<$ty>::new(),)+)
            }

            fn init(outputs: &Self::Outputs) -> impl Future<Output = Self::Streams> + Send + '_ {
                async move {
                    $(outputs.$idx.init().await;)+
                    ($(outputs.$idx.output_stream(),)+)
                }
            }

            fn finalize(outputs: &Self::Outputs) {
                $(outputs.$idx.finalize();)+
            }
        }
    };
}

impl_output_tuple!(1 => (T1, 0));
impl_output_tuple!(2 => (T1, 0), (T2, 1));
impl_output_tuple!(3 => (T1, 0), (T2, 1), (T3, 2));
impl_output_tuple!(4 => (T1, 0), (T2, 1), (T3, 2), (T4, 3));
