//! Broadcast shutdown channel used to stop workers cooperatively.
//!
//! This replaces interruption-style control flow with an explicit cancellation
//! token: workers and handlers check or await the receiver at their blocking
//! points and wind down at the next safe boundary.

use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
///
/// [`ShutdownTx`] broadcasts a one-way stop signal to every subscribed
/// [`ShutdownRx`]. The signal is sticky: receivers that subscribe after the
/// signal was sent still observe it.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Signals shutdown to all current and future subscribers.
    pub fn shutdown(&self) {
        // Use infallible send to support signaling before any receivers subscribe.
        self.0.send_replace(true);
    }

    /// Creates a new shutdown receiver subscription.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns whether shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until shutdown is signaled.
    ///
    /// Returns immediately if the signal was already sent. A dropped
    /// transmitter counts as shutdown, since no further work can be
    /// coordinated without one.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.0.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Creates a new shutdown coordination channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}
