//! C8: the processor's unary follow-up handler. Walks an audience of
//! proposal ids sequentially, applying `UserEdits` through C11 to each one
//! not already EDITLOCKed.

use crate::state::AppState;
use chrono::Utc;
use oc_schemas::{FollowUpAudienceResult, FollowUpAudienceStatus, FollowUpContent, FollowUpId, OrderId, ProposalId, ProposalStatus};

/// Processes one `ProcessFollowUp` request. The audience loop is
/// intentionally sequential (spec §4.8): it keeps the error story simple and
/// avoids contention on per-proposal locks that a parallel loop would need.
pub async fn process_follow_up(
    app: &AppState,
    order_id: &OrderId,
    audience: &[ProposalId],
    order_follow_up_id: &FollowUpId,
    content: &FollowUpContent,
) -> Vec<FollowUpAudienceResult> {
    let mut results = Vec::with_capacity(audience.len());

    for proposal_id in audience {
        let status = current_status(app, order_id, proposal_id).await;

        if status == Some(ProposalStatus::EditLock) {
            results.push(FollowUpAudienceResult {
                proposal_id: proposal_id.clone(),
                status: FollowUpAudienceStatus::EditLock,
                added_time: String::new(),
            });
            continue;
        }

        match app
            .persistence
            .user_edits(order_id, proposal_id, order_follow_up_id, content)
            .await
        {
            Ok(added_time) => {
                results.push(FollowUpAudienceResult {
                    proposal_id: proposal_id.clone(),
                    status: FollowUpAudienceStatus::Updated,
                    added_time: added_time.to_rfc3339(),
                });
            }
            Err(e) => {
                tracing::warn!(order_id = %order_id, proposal_id, error = %e, "user_edits persistence call failed");
                oc_notify::notify_proposal_failure(
                    app.sink.as_ref(),
                    order_id,
                    "",
                    serde_json::json!({ "proposal_id": proposal_id, "reason": e.to_string() }),
                )
                .await;
                results.push(FollowUpAudienceResult {
                    proposal_id: proposal_id.clone(),
                    status: FollowUpAudienceStatus::Failed,
                    added_time: String::new(),
                });
            }
        }
    }

    results
}

/// Prefers the in-memory proposal status when this order is already
/// resident; falls back to the persistence facade otherwise, since a
/// follow-up can target an order whose stream isn't currently open.
async fn current_status(app: &AppState, order_id: &OrderId, proposal_id: &ProposalId) -> Option<ProposalStatus> {
    if let Some(handle) = app.states.get(order_id).await {
        if let Some(status) = handle.lock().await.proposal(proposal_id).map(|p| p.status) {
            return Some(status);
        }
    }
    app.persistence.get_proposal_status(order_id, proposal_id).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oc_notify::Sink;
    use oc_persistence::{error::PersistenceError, PersistenceFacade};
    use oc_schemas::{ContentType, NotificationEnvelope, OrderId as Oid, SellerEntry};
    use oc_selector::{DistanceOracle, OrderDirectory};
    use std::sync::Arc;

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
    struct StubPersistence;
    #[async_trait]
    impl PersistenceFacade for StubPersistence {
        async fn get_proposal_status(&self, _: &Oid, _: &Oid) -> Result<ProposalStatus, PersistenceError> { Ok(ProposalStatus::Submitted) }
        async fn proposal_submissions(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn proposal_update(&self, _: &Oid, _: &Oid, _: &FollowUpContent) -> Result<FollowUpId, PersistenceError> { Ok("F-X-1".into()) }
        async fn proposal_closed(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn order_paused(&self, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn edit_lock(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn proposal_lock(&self, _: &Oid, _: &Oid) -> Result<(), PersistenceError> { Ok(()) }
        async fn user_edits(&self, _: &Oid, _: &Oid, _: &FollowUpId, _: &FollowUpContent) -> Result<chrono::DateTime<Utc>, PersistenceError> { Ok(Utc::now()) }
    }

    fn test_app() -> AppState {
        AppState::new(
            oc_config::Settings::default(),
            Arc::new(StubDirectory),
            Arc::new(StubOracle),
            Arc::new(StubPersistence),
            Arc::new(StubSink),
        )
    }

    #[tokio::test]
    async fn editlock_proposal_is_skipped_without_mutation() {
        let app = test_app();
        let handle = app.states.get_or_create("O1", chrono::Duration::minutes(30), "").await;
        {
            let mut s = handle.lock().await;
            s.assign_sellers_once(vec![SellerEntry { seller_id: "S1".into(), distance_km: 1.0 }]);
            s.push_proposal("P1".into(), 10.0, Utc::now());
            s.proposal_mut("P1").unwrap().status = ProposalStatus::EditLock;
        }

        let content = FollowUpContent { content_type: ContentType::Text, body: "hi".into(), urls: vec![] };
        let results = process_follow_up(&app, &"O1".to_string(), &["P1".to_string()], &"F-O1-1".to_string(), &content).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, FollowUpAudienceStatus::EditLock);
        assert!(results[0].added_time.is_empty());
    }

    #[tokio::test]
    async fn non_editlock_proposal_is_updated() {
        let app = test_app();
        let handle = app.states.get_or_create("O1", chrono::Duration::minutes(30), "").await;
        {
            let mut s = handle.lock().await;
            s.push_proposal("P1".into(), 10.0, Utc::now());
        }

        let content = FollowUpContent { content_type: ContentType::Text, body: "hi".into(), urls: vec![] };
        let results = process_follow_up(&app, &"O1".to_string(), &["P1".to_string()], &"F-O1-1".to_string(), &content).await;

        assert_eq!(results[0].status, FollowUpAudienceStatus::Updated);
        assert!(!results[0].added_time.is_empty());
    }
}
