//! Scoped mutual exclusion for caller-owned shared state.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

use crate::bail;
use crate::concurrency::future::OptionalDeadline;
use crate::error::{ConveyorResult, ErrorKind};

/// A critical section serializing access to caller-owned shared state.
///
/// At most one holder exists at any instant. Acquisition is guard-based:
/// release happens when the [`SectionGuard`] drops, so every exit path that
/// acquired the section releases it, including early returns and panics.
/// An unbalanced release is unrepresentable.
///
/// Blocked acquirers are admitted in FIFO order (the underlying
/// [`tokio::sync::Mutex`] queues waiters fairly).
///
/// Prefer [`protect`](CriticalSection::protect) for running a whole operation
/// under the section; use [`enter`](CriticalSection::enter) only when the
/// guard must be held across a scope boundary.
#[derive(Debug, Default)]
pub struct CriticalSection {
    /// Diagnostic name included in trace events.
    name: Option<&'static str>,
    inner: Mutex<()>,
}

/// Exclusive access to a [`CriticalSection`], released on drop.
#[derive(Debug)]
pub struct SectionGuard<'a> {
    _inner: MutexGuard<'a, ()>,
}

impl CriticalSection {
    /// Creates a new, unnamed critical section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a critical section with a diagnostic name.
    pub fn named(name: &'static str) -> Self {
        Self {
            name: Some(name),
            inner: Mutex::new(()),
        }
    }

    /// Waits until the section is free and acquires it.
    pub async fn enter(&self) -> SectionGuard<'_> {
        let inner = self.inner.lock().await;
        if let Some(name) = self.name {
            trace!(section = name, "critical section entered");
        }

        SectionGuard { _inner: inner }
    }

    /// Waits until the section is free, up to `timeout`.
    ///
    /// Returns [`ErrorKind::TimedOut`] on expiry without having acquired
    /// the section.
    pub async fn enter_deadline(&self, timeout: Duration) -> ConveyorResult<SectionGuard<'_>> {
        tokio::select! {
            guard = self.enter() => Ok(guard),
            _ = OptionalDeadline::after(timeout) => {
                bail!(
                    ErrorKind::TimedOut,
                    "Critical section acquisition expired"
                )
            }
        }
    }

    /// Acquires the section if it is currently free.
    pub fn try_enter(&self) -> Option<SectionGuard<'_>> {
        self.inner
            .try_lock()
            .ok()
            .map(|inner| SectionGuard { _inner: inner })
    }

    /// Returns whether the section is currently held.
    ///
    /// This is a diagnostic snapshot; the answer may be stale by the time the
    /// caller acts on it.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Runs `op` while holding the section.
    ///
    /// The section is released on every exit path of `op`, including errors
    /// propagated with `?` and panics. This is the canonical usage pattern.
    pub async fn protect<F, Fut, R>(&self, op: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _guard = self.enter().await;
        op().await
    }
}
