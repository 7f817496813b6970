use std::future::Future;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ConveyorError, ConveyorResult};

/// Identifier of a worker within a pool. Stable for the pool's lifetime.
pub type WorkerId = u64;

/// Per-invocation context handed to task handlers.
///
/// Worker identity is a parameter rather than a worker subtype: the same
/// handler serves every worker in the pool and can branch on `worker_id`
/// where per-worker behavior is needed.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Index of the worker running the handler.
    pub worker_id: WorkerId,
    /// Cancellation token for the pool. Long-running handlers should check or
    /// await this instead of blocking indefinitely.
    pub shutdown_rx: ShutdownRx,
}

/// Processes items dequeued by pool workers.
///
/// A returned error is reported to the pool's [`WorkerLifecycle`] and the
/// worker moves on to the next item; it never terminates the worker. The
/// blanket implementation lets a plain async closure serve as a handler:
///
/// ```
/// use conveyor::error::ConveyorResult;
/// use conveyor::workers::base::WorkerContext;
///
/// let handler = |ctx: WorkerContext, item: u32| async move {
///     tracing::debug!(worker_id = ctx.worker_id, item, "processing");
///     ConveyorResult::Ok(())
/// };
/// # let _ = handler;
/// ```
pub trait TaskHandler<T>: Send + Sync {
    /// Processes one item on behalf of the worker identified in `ctx`.
    fn handle(&self, ctx: WorkerContext, item: T) -> impl Future<Output = ConveyorResult<()>> + Send;
}

impl<T, F, Fut> TaskHandler<T> for F
where
    F: Fn(WorkerContext, T) -> Fut + Send + Sync,
    Fut: Future<Output = ConveyorResult<()>> + Send,
{
    fn handle(
        &self,
        ctx: WorkerContext,
        item: T,
    ) -> impl Future<Output = ConveyorResult<()>> + Send {
        self(ctx, item)
    }
}

/// Observes per-item completion within a pool.
///
/// [`WorkerLifecycle`] is the completion callback and error sink in one seam:
/// `on_complete` fires after every successfully handled item (a typical
/// implementation counts down a latch), `on_error` receives every per-item
/// failure. Errors delivered here are isolated to their item and never
/// propagate to the pool.
pub trait WorkerLifecycle: Send + Sync {
    /// Called after a worker successfully handled one item.
    fn on_complete(&self, worker_id: WorkerId) -> impl Future<Output = ()> + Send;

    /// Called after a worker's handler failed for one item.
    fn on_error(&self, worker_id: WorkerId, error: ConveyorError)
    -> impl Future<Output = ()> + Send;
}

/// Lifecycle observer that ignores all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycle;

impl WorkerLifecycle for NoopLifecycle {
    async fn on_complete(&self, _worker_id: WorkerId) {}

    async fn on_error(&self, _worker_id: WorkerId, _error: ConveyorError) {}
}
