//! Cooperative concurrency substrate for a dataflow pipeline runtime.
//!
//! Operators exchange values through rendezvous channels and are driven as
//! cooperative tasks resumed on a fixed thread pool. This crate provides the
//! pieces that make that possible:
//!
//! - [`task`] — one-shot, lazily started tasks and [`task::sync_wait`].
//! - [`sync`] — [`Latch`](sync::Latch), [`Event`](sync::Event) and the
//!   [`SymmetricTransfer`](sync::SymmetricTransfer) rendezvous buffer.
//! - [`channel`] — the unbuffered [`ImmediateChannel`](channel::ImmediateChannel),
//!   the single-slot [`Handoff`](channel::Handoff), and the type-erased
//!   channel facade.
//! - [`runtime`] — the [`ThreadPool`](runtime::ThreadPool) that resumes
//!   suspended tasks.
//! - [`stream`] — [`AsyncGenerator`](stream::AsyncGenerator), a lazy
//!   single-consumer sequence.
//! - [`ops`] — producer-side [`Output`](ops::Output) edges and the
//!   [`ChannelReader`](ops::ChannelReader) scheduling term.

pub mod channel;

pub mod ops;

pub mod runtime;
pub use runtime::{PoolOptions, ThreadPool};

pub mod stream;

pub mod sync;

pub mod task;
pub use task::{sync_wait, Task};
