use oc_config::Settings;
use oc_notify::Sink;
use oc_persistence::PersistenceFacade;
use oc_queue::QueueRegistry;
use oc_scheduler::{CancelToken, Scheduler};
use oc_selector::{DistanceOracle, OrderDirectory};
use oc_state::OrderStateManager;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
}

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

pub fn uptime_secs() -> u64 {
    STARTED_AT.get_or_init(Instant::now).elapsed().as_secs()
}

/// Process-wide state shared by every handler: the C1-C3 engines, the
/// external-dependency trait objects C5/C6/C11 call through, and a
/// registry of per-order stream cancel tokens so a client disconnect or
/// the sweeper can cancel exactly one order's background task (spec §5
/// cancellation contract).
pub struct AppState {
    pub states: OrderStateManager,
    pub queues: QueueRegistry,
    pub scheduler: Scheduler,
    pub directory: Arc<dyn OrderDirectory>,
    pub oracle: Arc<dyn DistanceOracle>,
    pub persistence: Arc<dyn PersistenceFacade>,
    pub sink: Arc<dyn Sink>,
    pub settings: Settings,
    pub build: BuildInfo,
    stream_tasks: Mutex<HashMap<String, CancelToken>>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        directory: Arc<dyn OrderDirectory>,
        oracle: Arc<dyn DistanceOracle>,
        persistence: Arc<dyn PersistenceFacade>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        let scheduler = Scheduler::new(settings.max_concurrent_tasks);
        AppState {
            states: OrderStateManager::new(),
            queues: QueueRegistry::new(settings.queue_capacity),
            scheduler,
            directory,
            oracle,
            persistence,
            sink,
            settings,
            build: BuildInfo { version: env!("CARGO_PKG_VERSION") },
            stream_tasks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn register_stream_task(&self, order_id: &str, token: CancelToken) {
        self.stream_tasks.lock().await.insert(order_id.to_string(), token);
    }

    /// Cancels and forgets the per-order stream task, if one is registered.
    /// Used by the sweeper (spec §4.4 step 3); cancelling does not touch
    /// `OrderState` or its queue.
    pub async fn cancel_stream_task(&self, order_id: &str) {
        if let Some(token) = self.stream_tasks.lock().await.remove(order_id) {
            token.cancel();
        }
    }
}
