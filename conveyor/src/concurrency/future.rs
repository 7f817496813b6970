use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::time::{Sleep, sleep};

pin_project! {
    /// Future that resolves once an optional deadline expires.
    ///
    /// This future remains pending indefinitely when no deadline was supplied,
    /// which lets deadline-bounded and unbounded waits share one code path.
    #[derive(Debug)]
    pub(crate) struct OptionalDeadline {
        #[pin]
        sleep: Option<Sleep>,
    }
}

impl OptionalDeadline {
    /// Creates a new [`OptionalDeadline`] from an optional timeout.
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            sleep: timeout.map(sleep),
        }
    }

    /// Creates an [`OptionalDeadline`] that expires after `timeout`.
    pub(crate) fn after(timeout: Duration) -> Self {
        Self::new(Some(timeout))
    }
}

impl Future for OptionalDeadline {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().sleep.as_pin_mut() {
            Some(sleep) => sleep.poll(cx),
            None => Poll::Pending,
        }
    }
}
