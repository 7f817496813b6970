//! Bounded FIFO channel with capacity-based backpressure.
//!
//! [`BoundedChannel`] is the hand-off point between producers and pool
//! workers: producers block while the channel is at capacity, consumers block
//! while it is empty, and closing the channel drains the remaining items
//! before signaling exhaustion.
//!
//! # Fairness
//!
//! Blocked producers are admitted in arrival order (the vacancy semaphore is
//! fair). Blocked consumers are woken in registration order, but a consumer
//! arriving while a wakeup is in flight may take the item first; acquisition
//! order between a waking and an arriving consumer is unspecified.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Notify, Semaphore, TryAcquireError};
use tracing::debug;

use crate::bail;
use crate::concurrency::future::OptionalDeadline;
use crate::config::ChannelConfig;
use crate::error::{ConveyorResult, ErrorKind};

/// Error returned by [`BoundedChannel::try_put`], handing the rejected item back.
#[derive(Debug, Error)]
pub enum TryPutError<T> {
    /// The channel is at capacity; the put would have blocked.
    #[error("channel is at capacity")]
    Full(T),
    /// The channel is closed and accepts no further items.
    #[error("channel is closed")]
    Closed(T),
}

impl<T> TryPutError<T> {
    /// Returns the item that could not be inserted.
    pub fn into_item(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }

    /// Returns the [`ErrorKind`] equivalent of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Full(_) => ErrorKind::ChannelFull,
            Self::Closed(_) => ErrorKind::ChannelClosed,
        }
    }
}

/// Error returned by [`BoundedChannel::try_take`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TryTakeError {
    /// The channel is empty; the take would have blocked.
    #[error("channel is empty")]
    Empty,
    /// The channel is closed and fully drained.
    #[error("channel is closed and drained")]
    Exhausted,
}

impl TryTakeError {
    /// Returns the [`ErrorKind`] equivalent of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty => ErrorKind::ChannelEmpty,
            Self::Exhausted => ErrorKind::ChannelExhausted,
        }
    }
}

/// A fixed-capacity FIFO channel with blocking put/take.
///
/// The channel is the only internally-synchronized structure in the system:
/// all occupancy changes happen inside its own operations, and items are
/// delivered in insertion order. Items inserted by the same producer preserve
/// their relative order; items from different producers interleave in the
/// order their puts complete.
///
/// Ownership of an item transfers to the channel on a successful put and to
/// the consumer on a successful take. A failed [`try_put`](Self::try_put)
/// hands the item back, and a timed-out put has inserted nothing.
#[derive(Debug)]
pub struct BoundedChannel<T> {
    /// Item store. Guarded by a plain mutex that is never held across an await.
    store: Mutex<VecDeque<T>>,
    /// One permit per free slot. Fair, so blocked producers are admitted in
    /// arrival order. Closed when the channel closes to wake blocked putters.
    vacancies: Semaphore,
    /// Wakes consumers blocked on an empty channel.
    item_ready: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    /// Creates a channel holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`from_config`](Self::from_config)
    /// for the validated, non-panicking construction path.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be greater than zero");

        Self {
            store: Mutex::new(VecDeque::with_capacity(capacity)),
            vacancies: Semaphore::new(capacity),
            item_ready: Notify::new(),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Creates a channel from a validated [`ChannelConfig`].
    pub fn from_config(config: &ChannelConfig) -> ConveyorResult<Self> {
        config.validate()?;

        Ok(Self::new(config.capacity))
    }

    /// Returns the fixed capacity of the channel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of items currently in the channel.
    pub fn occupancy(&self) -> usize {
        self.lock_store().len()
    }

    /// Returns whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Inserts `item` at the tail, waiting while the channel is at capacity.
    ///
    /// Wakes one blocked consumer. Fails with [`ErrorKind::ChannelClosed`] if
    /// the channel is closed, including while waiting for space.
    pub async fn put(&self, item: T) -> ConveyorResult<()> {
        self.put_with_deadline(item, None).await
    }

    /// Inserts `item` at the tail, waiting at most `timeout` for space.
    ///
    /// Returns [`ErrorKind::TimedOut`] on expiry; a timed-out put has
    /// inserted nothing.
    pub async fn put_deadline(&self, item: T, timeout: Duration) -> ConveyorResult<()> {
        self.put_with_deadline(item, Some(timeout)).await
    }

    async fn put_with_deadline(&self, item: T, timeout: Option<Duration>) -> ConveyorResult<()> {
        if self.is_closed() {
            bail!(ErrorKind::ChannelClosed, "Cannot put into a closed channel");
        }

        let permit = tokio::select! {
            acquired = self.vacancies.acquire() => match acquired {
                Ok(permit) => permit,
                Err(_) => bail!(
                    ErrorKind::ChannelClosed,
                    "Channel was closed while waiting for space"
                ),
            },
            _ = OptionalDeadline::new(timeout) => bail!(
                ErrorKind::TimedOut,
                "Channel put expired while waiting for space"
            ),
        };

        // The permit now represents the slot this item occupies; it is
        // returned by the take that removes the item.
        permit.forget();
        self.lock_store().push_back(item);
        self.item_ready.notify_one();

        Ok(())
    }

    /// Removes and returns the head item, waiting while the channel is empty.
    ///
    /// Frees one unit of capacity, waking one blocked producer. On a
    /// closed-and-drained channel returns [`ErrorKind::ChannelExhausted`]
    /// instead of waiting forever.
    pub async fn take(&self) -> ConveyorResult<T> {
        self.take_with_deadline(None).await
    }

    /// Removes and returns the head item, waiting at most `timeout`.
    ///
    /// Returns [`ErrorKind::TimedOut`] on expiry; a timed-out take leaves the
    /// occupancy unchanged.
    pub async fn take_deadline(&self, timeout: Duration) -> ConveyorResult<T> {
        self.take_with_deadline(Some(timeout)).await
    }

    async fn take_with_deadline(&self, timeout: Option<Duration>) -> ConveyorResult<T> {
        let mut deadline = pin!(OptionalDeadline::new(timeout));

        loop {
            // Register interest before inspecting the store so a put landing
            // between the check and the await cannot be missed.
            let notified = self.item_ready.notified();

            if let Some(item) = self.pop_and_forward_wakeup() {
                self.vacancies.add_permits(1);
                return Ok(item);
            }

            if self.is_closed() {
                bail!(
                    ErrorKind::ChannelExhausted,
                    "Channel is closed and fully drained"
                );
            }

            tokio::select! {
                _ = notified => {}
                _ = &mut deadline => bail!(
                    ErrorKind::TimedOut,
                    "Channel take expired while waiting for an item"
                ),
            }
        }
    }

    /// Inserts `item` without waiting.
    ///
    /// Returns the item inside the error when the channel is full or closed.
    pub fn try_put(&self, item: T) -> Result<(), TryPutError<T>> {
        if self.is_closed() {
            return Err(TryPutError::Closed(item));
        }

        match self.vacancies.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.lock_store().push_back(item);
                self.item_ready.notify_one();

                Ok(())
            }
            Err(TryAcquireError::NoPermits) => Err(TryPutError::Full(item)),
            Err(TryAcquireError::Closed) => Err(TryPutError::Closed(item)),
        }
    }

    /// Removes and returns the head item without waiting.
    pub fn try_take(&self) -> Result<T, TryTakeError> {
        if let Some(item) = self.pop_and_forward_wakeup() {
            self.vacancies.add_permits(1);
            return Ok(item);
        }

        if self.is_closed() {
            return Err(TryTakeError::Exhausted);
        }

        Err(TryTakeError::Empty)
    }

    /// Closes the channel. Idempotent.
    ///
    /// Blocked putters fail with [`ErrorKind::ChannelClosed`]; blocked takers
    /// wake and drain the remaining items before observing
    /// [`ErrorKind::ChannelExhausted`]. Items accepted before the close are
    /// still delivered.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.vacancies.close();
        self.item_ready.notify_waiters();

        debug!(
            capacity = self.capacity,
            occupancy = self.occupancy(),
            "channel closed"
        );
    }

    /// Pops the head item and, when items remain, forwards the wakeup to the
    /// next waiting consumer.
    ///
    /// [`Notify`] stores at most one pending permit, so back-to-back puts can
    /// collapse into a single wakeup; the consumer that takes that wakeup must
    /// pass it on while the store is non-empty or a second sleeping consumer
    /// would never learn about the second item.
    fn pop_and_forward_wakeup(&self) -> Option<T> {
        let mut store = self.lock_store();
        let item = store.pop_front();

        if item.is_some() && !store.is_empty() {
            self.item_ready.notify_one();
        }

        item
    }

    fn lock_store(&self) -> MutexGuard<'_, VecDeque<T>> {
        // The store is only touched for push/pop, which cannot panic mid-update,
        // so a poisoned lock still holds a consistent queue.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
