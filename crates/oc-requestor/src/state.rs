use crate::client::StreamClientConfig;
use crate::tracking::{OrderTracking, SharedOrderTracking};
use oc_notify::Sink;
use oc_persistence::followup_id::FollowUpIdGenerator;
use oc_scheduler::Scheduler;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
}

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

pub fn uptime_secs() -> u64 {
    STARTED_AT.get_or_init(Instant::now).elapsed().as_secs()
}

/// Process-wide state for the requestor daemon: C9/C10's engines plus the
/// HTTP client used to reach the processor and the notification sink used
/// to reach buyers.
pub struct AppState {
    pub tracking: SharedOrderTracking,
    pub scheduler: Scheduler,
    pub http: reqwest::Client,
    pub sink: Arc<dyn Sink>,
    pub settings: oc_config::Settings,
    pub build: BuildInfo,
    /// Order-level FollowUpID minting (ParentID = OrderID, spec §4.10 rule)
    /// for `POST /orders/{id}/followup` before it calls `ProcessFollowUp`.
    pub order_follow_up_ids: FollowUpIdGenerator,
}

impl AppState {
    pub fn new(settings: oc_config::Settings, sink: Arc<dyn Sink>) -> Self {
        let scheduler = Scheduler::new(settings.max_concurrent_tasks);
        AppState {
            tracking: Arc::new(OrderTracking::new()),
            scheduler,
            http: reqwest::Client::new(),
            sink,
            settings,
            build: BuildInfo { version: env!("CARGO_PKG_VERSION") },
            order_follow_up_ids: FollowUpIdGenerator::new(),
        }
    }

    pub fn stream_client_config(&self) -> StreamClientConfig {
        StreamClientConfig {
            processor_base_url: self.settings.processor_stream_base_url.clone(),
            max_retries: self.settings.stream_max_retries,
            reconnect_delay: Duration::from_secs(self.settings.stream_reconnect_delay_secs),
            request_timeout: if self.settings.grpc_request_timeout_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(self.settings.grpc_request_timeout_secs))
            },
        }
    }
}
