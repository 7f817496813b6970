//! In-process coordination primitives for bounded work distribution.
//!
//! The crate provides four building blocks that compose into a backpressured
//! fan-out/fan-in pipeline: a fixed-capacity FIFO [`channel::BoundedChannel`],
//! a one-shot [`concurrency::latch::Latch`] barrier, a scoped
//! [`concurrency::section::CriticalSection`] guard, and a fixed-size
//! [`workers::pool::WorkerPool`] that consumes from a channel with per-item
//! error isolation.

pub mod channel;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod workers;

mod macros;
