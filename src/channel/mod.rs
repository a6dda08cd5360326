//! Typed channels connecting operators.
//!
//! [`ImmediateChannel`] is the unbuffered multi-reader/multi-writer
//! rendezvous channel; [`Handoff`] is its single-slot one-reader/one-writer
//! sibling. [`facade`] erases a concrete channel behind readable/writable
//! halves so an edge can be wired without naming the channel type.

mod facade;
pub use facade::{
    Channel, ChannelProvider, GenericChannel, ReadableChannel, ReadableHalf, WritableChannel,
    WritableHalf,
};

mod handoff;
pub use handoff::Handoff;

mod immediate;
pub use immediate::ImmediateChannel;


/// Failure surfaced by channel endpoints.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel is closed; terminal for this endpoint. Reads observe it
    /// as end-of-stream, writes as a refusal.
    #[error("channel is closed")]
    Closed,
}
