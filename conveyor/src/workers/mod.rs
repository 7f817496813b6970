//! Worker pool consuming from a bounded channel.
//!
//! The [`base`] module defines the seams callers plug into: the per-item
//! [`base::TaskHandler`] and the [`base::WorkerLifecycle`] completion
//! observer. The [`pool`] module runs a fixed number of shutdown-aware worker
//! loops over one channel, isolating per-item failures so a single bad item
//! never takes down a worker.

pub mod base;
pub mod pool;
