//! One-shot countdown barrier for fan-in coordination.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::bail;
use crate::concurrency::future::OptionalDeadline;
use crate::error::{ConveyorResult, ErrorKind};

/// Outcome of a single [`Latch::count_down`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountDown {
    /// The count was decremented and the latch is still armed.
    Pending {
        /// Completions still outstanding after this call.
        remaining: usize,
    },
    /// This call brought the count to zero and released all waiters.
    Released,
    /// The latch was already released; the call had no effect.
    AlreadyReleased,
}

/// A one-shot countdown synchronization barrier.
///
/// [`Latch`] is created with a target count and releases every current and
/// future [`wait`](Latch::wait) caller once [`count_down`](Latch::count_down)
/// has been called that many times. The release is a one-time broadcast: a
/// waiter that subscribes after the final count-down observes the released
/// state immediately, and the latch never re-arms.
///
/// Every count-down that happened before the release is visible to every
/// waiter that unblocks.
#[derive(Debug)]
pub struct Latch {
    /// Completions still outstanding. Monotonically decreasing.
    remaining: AtomicUsize,
    /// Broadcasts the terminal released state to all subscribers.
    released: watch::Sender<bool>,
}

impl Latch {
    /// Creates a latch that releases after `count` completions.
    ///
    /// A latch created with a count of zero starts in the released state.
    pub fn new(count: usize) -> Self {
        let (released, _) = watch::channel(count == 0);

        Self {
            remaining: AtomicUsize::new(count),
            released,
        }
    }

    /// Records one completion.
    ///
    /// Decrements the remaining count if it is still positive. The call that
    /// reaches zero broadcasts the release exactly once; any further calls
    /// report [`CountDown::AlreadyReleased`] and leave the latch untouched.
    pub fn count_down(&self) -> CountDown {
        let mut current = self.remaining.load(Ordering::Acquire);

        loop {
            if current == 0 {
                return CountDown::AlreadyReleased;
            }

            match self.remaining.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if current == 1 {
                        self.released.send_replace(true);
                        return CountDown::Released;
                    }

                    return CountDown::Pending {
                        remaining: current - 1,
                    };
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns the number of completions still outstanding.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Returns whether the latch has released.
    pub fn is_released(&self) -> bool {
        *self.released.borrow()
    }

    /// Waits until the latch releases.
    ///
    /// Returns immediately if the latch has already released.
    pub async fn wait(&self) {
        let mut rx = self.released.subscribe();
        // The transmitter lives inside `self`, which outlives this borrow, so
        // the wait can only end by observing the released state.
        let _ = rx.wait_for(|released| *released).await;
    }

    /// Waits until the latch releases, up to `timeout`.
    ///
    /// Returns [`ErrorKind::TimedOut`] on expiry without altering the latch.
    pub async fn wait_deadline(&self, timeout: Duration) -> ConveyorResult<()> {
        tokio::select! {
            _ = self.wait() => Ok(()),
            _ = OptionalDeadline::after(timeout) => {
                bail!(
                    ErrorKind::TimedOut,
                    "Latch wait expired before the release"
                )
            }
        }
    }
}
