//! C11: the proposal update service. A mode-dispatched facade over a
//! remote persistence service (spec §4.10) — not a direct database
//! connection; per SPEC_FULL §D.3 this core never touches Postgres
//! directly, matching the original's `http_client.py`.

pub mod error;
pub mod followup_id;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error::PersistenceError;
use followup_id::FollowUpIdGenerator;
use oc_schemas::{FollowUpContent, FollowUpId, OrderId, ProposalId, ProposalStatus};
use std::time::Duration;

/// The C11 operation surface. Every mode from spec §4.10's table is a
/// method here; `UserEdits` and `ProposalUpdate` are the two that mint a
/// FollowUpID.
#[async_trait]
pub trait PersistenceFacade: Send + Sync {
    async fn get_proposal_status(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<ProposalStatus, PersistenceError>;

    async fn proposal_submissions(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError>;

    async fn proposal_update(
        &self,
        order_id: &OrderId,
        proposal_id: &ProposalId,
        content: &FollowUpContent,
    ) -> Result<FollowUpId, PersistenceError>;

    async fn proposal_closed(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError>;

    async fn order_paused(&self, order_id: &OrderId) -> Result<(), PersistenceError>;

    async fn edit_lock(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError>;

    async fn proposal_lock(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError>;

    async fn user_edits(
        &self,
        order_id: &OrderId,
        proposal_id: &ProposalId,
        order_follow_up_id: &FollowUpId,
        content: &FollowUpContent,
    ) -> Result<DateTime<Utc>, PersistenceError>;
}

/// `reqwest`-backed facade. FollowUpIDs are minted locally (per-parent
/// unique, spec §9 Open Question 4) rather than trusted from the remote
/// response, since this core is the sole writer of that id shape.
pub struct HttpPersistenceFacade {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    follow_up_ids: FollowUpIdGenerator,
    max_retries: u32,
}

impl HttpPersistenceFacade {
    pub fn new(client: reqwest::Client, base_url: String, bearer_token: Option<String>) -> Self {
        HttpPersistenceFacade {
            client,
            base_url,
            bearer_token,
            follow_up_ids: FollowUpIdGenerator::new(),
            max_retries: 3,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn patch_status(
        &self,
        order_id: &OrderId,
        proposal_id: &ProposalId,
        status: ProposalStatus,
    ) -> Result<(), PersistenceError> {
        let body = serde_json::json!({ "order_id": order_id, "proposal_id": proposal_id, "status": status });
        let op = || async {
            self.request(reqwest::Method::PATCH, &format!("/proposals/{proposal_id}"))
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
        };
        retry::execute_with_retry(op, self.max_retries, Duration::from_millis(100), "patch_status")
            .await
            .map(|_| ())
            .map_err(map_reqwest_err)
    }
}

fn map_reqwest_err(e: reqwest::Error) -> PersistenceError {
    if e.status().map(|s| s.as_u16()) == Some(404) {
        PersistenceError::NotFound { what: e.to_string() }
    } else {
        PersistenceError::ExternalUnavailable { detail: e.to_string() }
    }
}

#[async_trait]
impl PersistenceFacade for HttpPersistenceFacade {
    async fn get_proposal_status(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<ProposalStatus, PersistenceError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/orders/{order_id}/proposals/{proposal_id}"))
            .send()
            .await
            .map_err(map_reqwest_err)?
            .error_for_status()
            .map_err(map_reqwest_err)?;
        let body: serde_json::Value = resp.json().await.map_err(|e| PersistenceError::Internal { detail: e.to_string() })?;
        serde_json::from_value(body["status"].clone()).map_err(|e| PersistenceError::Internal { detail: e.to_string() })
    }

    async fn proposal_submissions(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.patch_status(order_id, proposal_id, ProposalStatus::Submitted).await
    }

    async fn proposal_update(
        &self,
        _order_id: &OrderId,
        proposal_id: &ProposalId,
        content: &FollowUpContent,
    ) -> Result<FollowUpId, PersistenceError> {
        let follow_up_id = self.follow_up_ids.generate(proposal_id);
        let body = serde_json::json!({ "follow_up_id": follow_up_id, "content": content });
        let op = || async {
            self.request(reqwest::Method::POST, &format!("/proposals/{proposal_id}/notes"))
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
        };
        retry::execute_with_retry(op, self.max_retries, Duration::from_millis(100), "proposal_update")
            .await
            .map_err(map_reqwest_err)?;
        Ok(follow_up_id)
    }

    async fn proposal_closed(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.patch_status(order_id, proposal_id, ProposalStatus::Closed).await
    }

    async fn order_paused(&self, order_id: &OrderId) -> Result<(), PersistenceError> {
        let body = serde_json::json!({ "order_id": order_id, "status": ProposalStatus::Paused });
        let op = || async {
            self.request(reqwest::Method::PATCH, &format!("/orders/{order_id}/proposals"))
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
        };
        retry::execute_with_retry(op, self.max_retries, Duration::from_millis(100), "order_paused")
            .await
            .map(|_| ())
            .map_err(map_reqwest_err)
    }

    async fn edit_lock(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.patch_status(order_id, proposal_id, ProposalStatus::EditLock).await
    }

    async fn proposal_lock(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.patch_status(order_id, proposal_id, ProposalStatus::ProposalLock).await
    }

    async fn user_edits(
        &self,
        _order_id: &OrderId,
        proposal_id: &ProposalId,
        order_follow_up_id: &FollowUpId,
        content: &FollowUpContent,
    ) -> Result<DateTime<Utc>, PersistenceError> {
        let added_time = Utc::now();
        let body = serde_json::json!({
            "order_follow_up_id": order_follow_up_id,
            "content": content,
            "added_time": added_time,
        });
        let op = || async {
            self.request(reqwest::Method::POST, &format!("/proposals/{proposal_id}/user-edits"))
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
        };
        retry::execute_with_retry(op, self.max_retries, Duration::from_millis(100), "user_edits")
            .await
            .map(|_| added_time)
            .map_err(map_reqwest_err)
    }
}
