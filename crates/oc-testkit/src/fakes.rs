//! In-memory stand-ins for every external dependency named in spec §4:
//! the persistence facade, the distance oracle, and the notification sink.
//! Production wires the real (HTTP-backed) implementations; tests pass
//! these.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oc_notify::Sink;
use oc_persistence::error::PersistenceError;
use oc_persistence::followup_id::FollowUpIdGenerator;
use oc_persistence::PersistenceFacade;
use oc_schemas::{FollowUpContent, FollowUpId, OrderId, ProposalId, ProposalStatus};
use oc_selector::{DistanceOracle, OrderDirectory};
use std::collections::HashMap;
use std::sync::Mutex;

/// Fixed order/seller topology, configured up front by a test.
#[derive(Default)]
pub struct InMemoryDirectory {
    pub buyer_locations: HashMap<OrderId, (f64, f64)>,
    pub industries: HashMap<OrderId, String>,
    pub sellers_by_industry: HashMap<String, Vec<String>>,
}

#[async_trait]
impl OrderDirectory for InMemoryDirectory {
    async fn buyer_location(&self, order_id: &str) -> anyhow::Result<(f64, f64)> {
        self.buyer_locations
            .get(order_id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown order {order_id}"))
    }

    async fn order_industry(&self, order_id: &str) -> anyhow::Result<String> {
        self.industries
            .get(order_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown order {order_id}"))
    }

    async fn sellers_in_industry(&self, industry: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.sellers_by_industry.get(industry).cloned().unwrap_or_default())
    }
}

/// A distance oracle that either always succeeds with a fixed per-seller
/// distance, or always fails — used to drive scenario S6.
pub struct ScriptedDistanceOracle {
    pub distances: HashMap<String, f64>,
    pub always_fail: bool,
}

impl ScriptedDistanceOracle {
    pub fn failing() -> Self {
        ScriptedDistanceOracle { distances: HashMap::new(), always_fail: true }
    }

    pub fn with_distances(distances: HashMap<String, f64>) -> Self {
        ScriptedDistanceOracle { distances, always_fail: false }
    }
}

#[async_trait]
impl DistanceOracle for ScriptedDistanceOracle {
    async fn distance_km(&self, _from: (f64, f64), seller_id: &str) -> anyhow::Result<f64> {
        if self.always_fail {
            anyhow::bail!("distance oracle unavailable (scripted failure)");
        }
        self.distances
            .get(seller_id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no scripted distance for {seller_id}"))
    }
}

/// Records every publish/chat call. Never fails unless `fail` is set, and
/// even then only returns `false` — it never panics, matching the best-effort
/// contract it stands in for.
#[derive(Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<(String, String, serde_json::Value)>>,
    pub chat_messages: Mutex<Vec<serde_json::Value>>,
    pub fail: bool,
}

#[async_trait]
impl Sink for RecordingSink {
    async fn publish(&self, topic: oc_schemas::Topic, key: oc_schemas::Key, envelope: &oc_schemas::NotificationEnvelope) -> bool {
        self.published.lock().unwrap().push((
            topic.as_str().to_string(),
            key.as_str().to_string(),
            envelope.body.clone(),
        ));
        !self.fail
    }

    async fn notify_chat(&self, body: &serde_json::Value) -> bool {
        self.chat_messages.lock().unwrap().push(body.clone());
        !self.fail
    }
}

struct ProposalRecord {
    status: ProposalStatus,
    notes: Vec<(FollowUpId, FollowUpContent)>,
}

/// In-memory persistence facade. Tracks proposal status transitions and
/// notes the same way the real remote service would, without a network
/// hop — used by scenario tests and by unit tests of the stream/follow-up
/// handlers.
#[derive(Default)]
pub struct InMemoryPersistence {
    proposals: Mutex<HashMap<(OrderId, ProposalId), ProposalRecord>>,
    follow_up_ids: FollowUpIdGenerator,
    pub fail_next: Mutex<bool>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_submitted(&self, order_id: &str, proposal_id: &str) {
        self.proposals.lock().unwrap().insert(
            (order_id.to_string(), proposal_id.to_string()),
            ProposalRecord { status: ProposalStatus::Submitted, notes: Vec::new() },
        );
    }

    fn maybe_fail(&self) -> Result<(), PersistenceError> {
        let mut fail = self.fail_next.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(PersistenceError::ExternalUnavailable { detail: "scripted failure".into() });
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceFacade for InMemoryPersistence {
    async fn get_proposal_status(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<ProposalStatus, PersistenceError> {
        self.proposals
            .lock()
            .unwrap()
            .get(&(order_id.clone(), proposal_id.clone()))
            .map(|r| r.status)
            .ok_or_else(|| PersistenceError::NotFound { what: format!("{order_id}/{proposal_id}") })
    }

    async fn proposal_submissions(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.maybe_fail()?;
        self.proposals
            .lock()
            .unwrap()
            .entry((order_id.clone(), proposal_id.clone()))
            .or_insert(ProposalRecord { status: ProposalStatus::Submitted, notes: Vec::new() })
            .status = ProposalStatus::Submitted;
        Ok(())
    }

    async fn proposal_update(
        &self,
        order_id: &OrderId,
        proposal_id: &ProposalId,
        content: &FollowUpContent,
    ) -> Result<FollowUpId, PersistenceError> {
        self.maybe_fail()?;
        let follow_up_id = self.follow_up_ids.generate(proposal_id);
        let mut guard = self.proposals.lock().unwrap();
        let rec = guard
            .get_mut(&(order_id.clone(), proposal_id.clone()))
            .ok_or_else(|| PersistenceError::NotFound { what: proposal_id.clone() })?;
        rec.notes.push((follow_up_id.clone(), content.clone()));
        Ok(follow_up_id)
    }

    async fn proposal_closed(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.maybe_fail()?;
        let mut guard = self.proposals.lock().unwrap();
        let rec = guard
            .get_mut(&(order_id.clone(), proposal_id.clone()))
            .ok_or_else(|| PersistenceError::NotFound { what: proposal_id.clone() })?;
        rec.status = ProposalStatus::Closed;
        Ok(())
    }

    async fn order_paused(&self, order_id: &OrderId) -> Result<(), PersistenceError> {
        self.maybe_fail()?;
        let mut guard = self.proposals.lock().unwrap();
        for (key, rec) in guard.iter_mut() {
            if key.0 == *order_id {
                rec.status = ProposalStatus::Paused;
            }
        }
        Ok(())
    }

    async fn edit_lock(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.maybe_fail()?;
        let mut guard = self.proposals.lock().unwrap();
        let rec = guard
            .get_mut(&(order_id.clone(), proposal_id.clone()))
            .ok_or_else(|| PersistenceError::NotFound { what: proposal_id.clone() })?;
        rec.status = ProposalStatus::EditLock;
        Ok(())
    }

    async fn proposal_lock(&self, order_id: &OrderId, proposal_id: &ProposalId) -> Result<(), PersistenceError> {
        self.maybe_fail()?;
        let mut guard = self.proposals.lock().unwrap();
        let rec = guard
            .get_mut(&(order_id.clone(), proposal_id.clone()))
            .ok_or_else(|| PersistenceError::NotFound { what: proposal_id.clone() })?;
        rec.status = ProposalStatus::ProposalLock;
        Ok(())
    }

    async fn user_edits(
        &self,
        order_id: &OrderId,
        proposal_id: &ProposalId,
        order_follow_up_id: &FollowUpId,
        content: &FollowUpContent,
    ) -> Result<DateTime<Utc>, PersistenceError> {
        self.maybe_fail()?;
        let mut guard = self.proposals.lock().unwrap();
        let rec = guard
            .get_mut(&(order_id.clone(), proposal_id.clone()))
            .ok_or_else(|| PersistenceError::NotFound { what: proposal_id.clone() })?;
        rec.notes.push((order_follow_up_id.clone(), content.clone()));
        Ok(Utc::now())
    }
}
