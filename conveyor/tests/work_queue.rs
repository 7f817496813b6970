mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use conveyor::bail;
use conveyor::channel::BoundedChannel;
use conveyor::concurrency::latch::Latch;
use conveyor::concurrency::section::CriticalSection;
use conveyor::config::PoolConfig;
use conveyor::error::{ConveyorResult, ErrorKind};
use conveyor::workers::base::WorkerContext;
use conveyor::workers::pool::WorkerPool;

use crate::common::{CollectingLifecycle, init_test_tracing};

#[tokio::test]
async fn producer_blocks_at_capacity_and_consumer_drains_in_order() {
    init_test_tracing();

    let channel = Arc::new(BoundedChannel::new(2));
    let produced = Arc::new(AtomicUsize::new(0));

    let producer = {
        let channel = channel.clone();
        let produced = produced.clone();

        tokio::spawn(async move {
            for item in 1..=5u32 {
                channel.put(item).await.unwrap();
                produced.fetch_add(1, Ordering::SeqCst);
            }

            channel.close();
        })
    };

    // Let the producer run until it is wedged on the full channel: two items
    // fit, the third put suspends.
    while channel.occupancy() < 2 {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(produced.load(Ordering::SeqCst), 2);

    let mut consumed = Vec::new();
    loop {
        match channel.take().await {
            Ok(item) => consumed.push(item),
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::ChannelExhausted);
                break;
            }
        }
    }

    producer.await.unwrap();
    assert_eq!(consumed, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn one_failing_item_leaves_the_pool_running() {
    init_test_tracing();

    let channel = Arc::new(BoundedChannel::new(4));
    let lifecycle = CollectingLifecycle::new();

    let handler = |_ctx: WorkerContext, item: u32| async move {
        if item == 5 {
            bail!(
                ErrorKind::HandlerFailed,
                "Injected failure",
                detail = format!("item {item} is poisoned")
            );
        }

        Ok(())
    };

    let pool = WorkerPool::new(
        PoolConfig { workers: 2 },
        channel.clone(),
        handler,
        lifecycle.clone(),
    )
    .unwrap();
    let handle = pool.start();

    for item in 0..10 {
        channel.put(item).await.unwrap();
    }

    // Wait for all ten outcomes, then prove the pool still accepts work.
    while lifecycle.completions() + lifecycle.errors().len() < 10 {
        tokio::task::yield_now().await;
    }

    channel.put(100).await.unwrap();
    while lifecycle.completions() < 10 {
        tokio::task::yield_now().await;
    }

    channel.close();
    handle.wait().await.unwrap();

    assert_eq!(lifecycle.completions(), 10);
    let errors = lifecycle.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1.kind(), ErrorKind::HandlerFailed);
}

#[tokio::test]
async fn latch_releases_coordinator_after_all_items_complete() {
    init_test_tracing();

    let channel = Arc::new(BoundedChannel::new(4));
    let done = Arc::new(Latch::new(3));

    let handler = |_ctx: WorkerContext, _item: &'static str| async move { ConveyorResult::Ok(()) };

    let lifecycle = LatchLifecycle { done: done.clone() };
    let pool = WorkerPool::new(
        PoolConfig { workers: 3 },
        channel.clone(),
        handler,
        lifecycle,
    )
    .unwrap();
    let handle = pool.start();

    for dish in ["pizza", "pasta", "salad"] {
        channel.put(dish).await.unwrap();
    }

    done.wait().await;
    assert!(done.is_released());

    handle.shutdown_and_wait().await.unwrap();
}

#[tokio::test]
async fn critical_section_serializes_worker_updates() {
    init_test_tracing();

    let channel = Arc::new(BoundedChannel::new(8));
    let section = Arc::new(CriticalSection::named("shared_total"));
    let total = Arc::new(AtomicU64::new(0));

    let handler = {
        let section = section.clone();
        let total = total.clone();

        move |_ctx: WorkerContext, amount: u64| {
            let section = section.clone();
            let total = total.clone();

            async move {
                section
                    .protect(|| async {
                        // Unsynchronized read-modify-write: only the section
                        // keeps concurrent workers from losing updates.
                        let current = total.load(Ordering::Relaxed);
                        tokio::task::yield_now().await;
                        total.store(current + amount, Ordering::Relaxed);
                    })
                    .await;

                ConveyorResult::Ok(())
            }
        }
    };

    let lifecycle = CollectingLifecycle::new();
    let pool = WorkerPool::new(
        PoolConfig { workers: 4 },
        channel.clone(),
        handler,
        lifecycle.clone(),
    )
    .unwrap();
    let handle = pool.start();

    for _ in 0..50 {
        channel.put(1).await.unwrap();
    }
    channel.close();

    handle.wait().await.unwrap();
    assert_eq!(total.load(Ordering::Relaxed), 50);
    assert_eq!(lifecycle.completions(), 50);
}

/// Counts every outcome down on a shared latch, success or handled failure.
struct LatchLifecycle {
    done: Arc<Latch>,
}

impl conveyor::workers::base::WorkerLifecycle for LatchLifecycle {
    async fn on_complete(&self, _worker_id: u64) {
        self.done.count_down();
    }

    async fn on_error(&self, _worker_id: u64, _error: conveyor::error::ConveyorError) {
        self.done.count_down();
    }
}
