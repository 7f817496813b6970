use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::channel::BoundedChannel;
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::config::PoolConfig;
use crate::conveyor_error;
use crate::error::{ConveyorResult, ErrorKind};
use crate::workers::base::{TaskHandler, WorkerContext, WorkerId, WorkerLifecycle};

/// A fixed-size set of workers consuming from one [`BoundedChannel`].
///
/// [`WorkerPool`] spawns exactly `workers` concurrent loops, each repeatedly
/// taking an item from the bound channel, processing it through the supplied
/// [`TaskHandler`], and reporting the outcome to the supplied
/// [`WorkerLifecycle`]. A failing item is reported and skipped; the worker
/// continues with the next item.
///
/// The pool is started once and stopped once. Starting consumes the pool and
/// returns a [`WorkerPoolHandle`]; restarting requires a new pool.
#[derive(Debug)]
pub struct WorkerPool<T, H, L> {
    config: PoolConfig,
    channel: Arc<BoundedChannel<T>>,
    handler: Arc<H>,
    lifecycle: Arc<L>,
    shutdown_tx: ShutdownTx,
}

impl<T, H, L> WorkerPool<T, H, L>
where
    T: Send + 'static,
    H: TaskHandler<T> + 'static,
    L: WorkerLifecycle + 'static,
{
    /// Creates a pool of `config.workers` workers bound to `channel`.
    ///
    /// Fails with [`ErrorKind::ConfigError`] when the configuration is
    /// invalid.
    pub fn new(
        config: PoolConfig,
        channel: Arc<BoundedChannel<T>>,
        handler: H,
        lifecycle: L,
    ) -> ConveyorResult<Self> {
        config.validate()?;

        let (shutdown_tx, _) = create_shutdown_channel();

        Ok(Self {
            config,
            channel,
            handler: Arc::new(handler),
            lifecycle: Arc::new(lifecycle),
            shutdown_tx,
        })
    }

    /// Returns a transmitter for the pool's shutdown channel.
    ///
    /// Useful for wiring the stop signal into a coordinator before the pool
    /// is started.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Spawns the worker loops and returns a handle for stopping and joining.
    pub fn start(self) -> WorkerPoolHandle {
        info!(workers = self.config.workers, "starting worker pool");

        let mut join_set = JoinSet::new();

        for worker_id in 0..self.config.workers as WorkerId {
            let worker_span = tracing::info_span!("pool_worker", worker_id);
            let worker = run_worker(
                worker_id,
                self.channel.clone(),
                self.handler.clone(),
                self.lifecycle.clone(),
                self.shutdown_tx.subscribe(),
            );

            join_set.spawn(
                async move { (worker_id, worker.await) }.instrument(worker_span.or_current()),
            );
        }

        WorkerPoolHandle {
            join_set,
            shutdown_tx: self.shutdown_tx,
        }
    }
}

/// Runs one worker loop until shutdown or channel exhaustion.
///
/// The loop gives the shutdown signal priority over new work, so a stopped
/// worker finishes its in-flight item and exits without dequeuing further
/// items; anything still queued stays in the channel.
async fn run_worker<T, H, L>(
    worker_id: WorkerId,
    channel: Arc<BoundedChannel<T>>,
    handler: Arc<H>,
    lifecycle: Arc<L>,
    shutdown_rx: ShutdownRx,
) -> ConveyorResult<()>
where
    T: Send + 'static,
    H: TaskHandler<T> + 'static,
    L: WorkerLifecycle + 'static,
{
    debug!("worker started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.wait_for_shutdown() => {
                debug!("worker received shutdown signal");
                break;
            }
            taken = channel.take() => {
                match taken {
                    Ok(item) => {
                        let ctx = WorkerContext {
                            worker_id,
                            shutdown_rx: shutdown_rx.clone(),
                        };

                        if let Err(err) = handler.handle(ctx, item).await {
                            warn!(error = %err, "item handler failed, continuing with the next item");
                            lifecycle.on_error(worker_id, err).await;
                        } else {
                            lifecycle.on_complete(worker_id).await;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::ChannelExhausted => {
                        debug!("channel exhausted, worker exiting");
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }

    Ok(())
}

/// Handle for stopping and joining a started [`WorkerPool`].
#[derive(Debug)]
pub struct WorkerPoolHandle {
    /// Owns all spawned worker tasks.
    join_set: JoinSet<(WorkerId, ConveyorResult<()>)>,
    shutdown_tx: ShutdownTx,
}

impl WorkerPoolHandle {
    /// Signals all workers to exit after their current item completes.
    ///
    /// Does not interrupt in-flight processing and does not wait; combine
    /// with [`wait`](Self::wait) or use
    /// [`shutdown_and_wait`](Self::shutdown_and_wait) for join semantics.
    pub fn shutdown(&self) {
        info!("signaling worker pool shutdown");

        self.shutdown_tx.shutdown();
    }

    /// Returns a transmitter for the pool's shutdown channel.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Waits for all workers to exit.
    ///
    /// Workers that panicked are reported as [`ErrorKind::WorkerPanic`]; if
    /// several workers failed, the errors are aggregated.
    pub async fn wait(mut self) -> ConveyorResult<()> {
        let mut errors = Vec::new();

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok((worker_id, Ok(()))) => {
                    debug!(worker_id, "worker exited cleanly");
                }
                Ok((worker_id, Err(err))) => {
                    error!(worker_id, error = %err, "worker exited with an error");
                    errors.push(err);
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        debug!("worker task was cancelled");
                    } else {
                        errors.push(conveyor_error!(
                            ErrorKind::WorkerPanic,
                            "Pool worker panicked",
                            join_err
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Signals shutdown and waits for all workers to exit.
    pub async fn shutdown_and_wait(self) -> ConveyorResult<()> {
        self.shutdown();
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bail;
    use crate::concurrency::latch::Latch;
    use crate::error::ConveyorResult;
    use crate::workers::base::NoopLifecycle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> impl TaskHandler<u32> {
        move |_ctx: WorkerContext, _item: u32| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ConveyorResult::Ok(())
            }
        }
    }

    #[tokio::test]
    async fn processes_every_item_then_drains_on_close() {
        let channel = Arc::new(BoundedChannel::new(4));
        let processed = Arc::new(AtomicUsize::new(0));

        let pool = WorkerPool::new(
            PoolConfig { workers: 2 },
            channel.clone(),
            counting_handler(processed.clone()),
            NoopLifecycle,
        )
        .unwrap();
        let handle = pool.start();

        for item in 0..10 {
            channel.put(item).await.unwrap();
        }
        channel.close();

        handle.wait().await.unwrap();
        assert_eq!(processed.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn handler_failure_is_isolated_to_its_item() {
        let channel = Arc::new(BoundedChannel::new(4));
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let handler = {
            move |_ctx: WorkerContext, item: u32| async move {
                if item == 5 {
                    bail!(ErrorKind::HandlerFailed, "Injected handler failure");
                }

                Ok(())
            }
        };

        let lifecycle = {
            let completed = completed.clone();
            let failed = failed.clone();

            CountingLifecycle { completed, failed }
        };

        let pool = WorkerPool::new(PoolConfig { workers: 2 }, channel.clone(), handler, lifecycle)
            .unwrap();
        let handle = pool.start();

        for item in 0..10 {
            channel.put(item).await.unwrap();
        }
        channel.close();

        // The failed item must not have terminated any worker.
        handle.wait().await.unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 9);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_finishes_in_flight_item_and_leaves_queue_intact() {
        let channel = Arc::new(BoundedChannel::new(4));
        let gate = Arc::new(Latch::new(1));

        let handler = {
            let gate = gate.clone();
            move |_ctx: WorkerContext, _item: u32| {
                let gate = gate.clone();
                async move {
                    gate.wait().await;
                    ConveyorResult::Ok(())
                }
            }
        };

        let pool = WorkerPool::new(
            PoolConfig { workers: 1 },
            channel.clone(),
            handler,
            NoopLifecycle,
        )
        .unwrap();
        let handle = pool.start();

        channel.put(1).await.unwrap();

        // Wait until the single worker has the item in flight.
        while channel.occupancy() > 0 {
            tokio::task::yield_now().await;
        }

        channel.put(2).await.unwrap();
        channel.put(3).await.unwrap();

        handle.shutdown();
        gate.count_down();
        handle.wait().await.unwrap();

        // The in-flight item completed; the queued ones were left behind.
        assert_eq!(channel.occupancy(), 2);
        assert_eq!(channel.try_take().unwrap(), 2);
        assert_eq!(channel.try_take().unwrap(), 3);
    }

    #[tokio::test]
    async fn rejects_zero_worker_configuration() {
        let channel: Arc<BoundedChannel<u32>> = Arc::new(BoundedChannel::new(1));

        let result = WorkerPool::new(
            PoolConfig { workers: 0 },
            channel,
            |_ctx: WorkerContext, _item: u32| async move { ConveyorResult::Ok(()) },
            NoopLifecycle,
        );

        let err = result.err().expect("zero workers must be rejected");
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    struct CountingLifecycle {
        completed: Arc<AtomicUsize>,
        failed: Arc<AtomicUsize>,
    }

    impl WorkerLifecycle for CountingLifecycle {
        async fn on_complete(&self, _worker_id: WorkerId) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_error(&self, _worker_id: WorkerId, _error: crate::error::ConveyorError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
