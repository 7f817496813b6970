//! Coordination primitives shared by producers, workers, and coordinators.
//!
//! This module provides the synchronization building blocks the work-queue
//! system is composed from. The design emphasizes safety, predictable cleanup,
//! and deadlock-free operation.
//!
//! # Coordination Patterns
//!
//! ## Graceful Shutdown
//!
//! The [`shutdown`] module implements a broadcast-based shutdown pattern where:
//! 1. A single shutdown signal can terminate multiple workers simultaneously
//! 2. Workers complete their current item before terminating
//! 3. A signal sent before a worker subscribes is still observed (level-triggered)
//!
//! ## Fan-in Barriers
//!
//! The [`latch`] module provides a one-shot countdown barrier for waiting on a
//! known number of completions, releasing every current and future waiter once
//! the count reaches zero.
//!
//! ## Mutual Exclusion
//!
//! The [`section`] module serializes access to caller-owned shared state. Its
//! guard-based API ties release to scope exit, so every code path that acquires
//! a section releases it, including error and panic paths.
//!
//! # Safety Guarantees
//!
//! All primitives in this module are designed to:
//! - **Avoid deadlocks**: No internal lock is ever held across a suspension point
//! - **Survive cancellation**: A timed-out or cancelled wait leaves no partial state behind
//! - **Maintain visibility**: Releases establish a happens-before edge for every waiter

pub mod latch;
pub mod section;
pub mod shutdown;

pub(crate) mod future;
