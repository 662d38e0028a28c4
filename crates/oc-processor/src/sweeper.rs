//! C4: the expiry sweeper. A long-running background activity owned by the
//! daemon rather than a dedicated crate, polling the order state manager
//! every `sweep_interval` and reaping any order past its deadline (spec
//! §4.4).
//!
//! Each order's cleanup is independent: one failure (persistence call,
//! whatever) is logged and never blocks the rest of the sweep (spec §4.4
//! failure semantics, §8 invariant 4).

use crate::state::AppState;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Spawns the sweeper as a detached task. Returns its `JoinHandle` so
/// `main.rs` can hold it for the lifetime of the process.
pub fn spawn(app: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(app.settings.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            sweep_once(&app).await;
        }
    })
}

/// One sweep pass (spec §4.4 steps 1-4). `now` is threaded as a parameter
/// in [`sweep_expired`] so tests can drive specific instants; this entry
/// point always uses the real clock.
async fn sweep_once(app: &Arc<AppState>) {
    sweep_expired(app, Utc::now()).await;
}

pub async fn sweep_expired(app: &Arc<AppState>, now: chrono::DateTime<Utc>) {
    let expired = app.states.expired_ids(now).await;
    for order_id in expired {
        // Step 1: if a stream is still open for this order, the emit loop
        // itself notices expiry and emits the terminal OrderPaused frame
        // (spec §4.7 step 5) — the sweeper only needs to cancel the task,
        // not synthesize the frame.
        // Step 2: persistence update, best-effort.
        if let Err(e) = app.persistence.order_paused(&order_id).await {
            tracing::warn!(order_id = %order_id, error = %e, "sweeper: order_paused persistence call failed");
        }

        // Step 3: cancel the per-order background task, if any.
        app.cancel_stream_task(&order_id).await;

        // Step 4: tear down state and queue. Independent of steps above —
        // a persistence failure must not leave the order resident forever.
        app.states.remove(&order_id).await;
        app.queues.drop_order(&order_id).await;

        tracing::info!(order_id = %order_id, "sweeper: order expired and removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use oc_config::Settings;
    use oc_notify::Sink;
    use oc_persistence::{error::PersistenceError, PersistenceFacade};
    use oc_schemas::{ContentType, FollowUpContent, FollowUpId, NotificationEnvelope, OrderId as Oid, ProposalStatus};
    use oc_selector::{DistanceOracle, OrderDirectory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDirectory;
    #[async_trait]
    impl OrderDirectory for StubDirectory {
        async fn buyer_location(&self, _: &str) -> anyhow::Result<(f64, f64)> { Ok((0.0, 0.0)) }
        async fn order_industry(&self, _: &str) -> anyhow::Result<String> { Ok(String::new()) }
        async fn sellers_in_industry(&self, _: &str) -> anyhow::Result<Vec<String>> { Ok(vec![]) }
    }
    struct StubOracle;
    #[async_trait]
    impl DistanceOracle for StubOracle {
        async fn distance_km(&self, _: (f64, f64), _: &str) -> anyhow::Result<f64> { Ok(1.0) }
    }
    struct StubSink;
    #[async_trait]
    impl Sink for StubSink {
        async fn publish(&self, _: oc_schemas::Topic, _: oc_schemas::Key, _: &NotificationEnvelope) -> bool { true }
        async fn notify_chat(&self, _: &serde_json::Value) -> bool { true }
    }

    struct CountingPersistence {
        order_paused_calls: AtomicUsize,
    }
    #[async_trait]
    impl PersistenceFacade for CountingPersistence {
        async fn get_proposal_status(&self, _: &Oid, _: &Oid) -> Result<ProposalStatus, PersistenceError> { Ok(ProposalStatus::Submitted) }
        async fn proposal_submissions(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn proposal_update(&self, _: &Oid, _: &Oid, _: &FollowUpContent) -> Result<FollowUpId, PersistenceError> { Ok("F-X-1".into()) }
        async fn proposal_closed(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn order_paused(&self, _: &Oid) -> Result<(), PersistenceError> {
            self.order_paused_calls.fetch_add(1, Ordering::SeqCst);
            Err(PersistenceError::ExternalUnavailable { detail: "down".into() })
        }
        async fn edit_lock(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn proposal_lock(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn user_edits(&self, _: &Oid, _: &Oid, _: &FollowUpId, _: &FollowUpContent) -> Result<chrono::DateTime<Utc>, PersistenceError> { Ok(Utc::now()) }
    }

    #[tokio::test]
    async fn expired_orders_are_removed_even_when_persistence_fails() {
        let persistence = Arc::new(CountingPersistence { order_paused_calls: AtomicUsize::new(0) });
        let app = Arc::new(AppState::new(
            Settings::default(),
            Arc::new(StubDirectory),
            Arc::new(StubOracle),
            persistence.clone(),
            Arc::new(StubSink),
        ));

        app.states.get_or_create("O1", ChronoDuration::seconds(-1), "").await;
        app.queues.get_or_create("O1").await;

        sweep_expired(&app, Utc::now()).await;

        assert!(app.states.get("O1").await.is_none());
        assert!(app.queues.get("O1").await.is_none());
        assert_eq!(persistence.order_paused_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unexpired_orders_are_left_alone() {
        let persistence = Arc::new(CountingPersistence { order_paused_calls: AtomicUsize::new(0) });
        let app = Arc::new(AppState::new(
            Settings::default(),
            Arc::new(StubDirectory),
            Arc::new(StubOracle),
            persistence,
            Arc::new(StubSink),
        ));

        app.states.get_or_create("O1", ChronoDuration::minutes(30), "").await;
        sweep_expired(&app, Utc::now()).await;
        assert!(app.states.get("O1").await.is_some());
    }
}
