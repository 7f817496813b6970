use std::sync::{Arc, Mutex, Once};

use conveyor::error::ConveyorError;
use conveyor::workers::base::{WorkerId, WorkerLifecycle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static TRACING: Once = Once::new();

/// Initializes tracing output for tests. Safe to call from every test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "conveyor=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .init();
    });
}

/// Lifecycle observer that records completions and errors for assertions.
#[derive(Clone, Default)]
pub struct CollectingLifecycle {
    inner: Arc<Mutex<Collected>>,
}

#[derive(Default)]
struct Collected {
    completions: Vec<WorkerId>,
    errors: Vec<(WorkerId, ConveyorError)>,
}

impl CollectingLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions(&self) -> usize {
        self.inner.lock().unwrap().completions.len()
    }

    pub fn errors(&self) -> Vec<(WorkerId, ConveyorError)> {
        self.inner.lock().unwrap().errors.clone()
    }
}

impl WorkerLifecycle for CollectingLifecycle {
    async fn on_complete(&self, worker_id: WorkerId) {
        self.inner.lock().unwrap().completions.push(worker_id);
    }

    async fn on_error(&self, worker_id: WorkerId, error: ConveyorError) {
        self.inner.lock().unwrap().errors.push((worker_id, error));
    }
}
