//! Scenario harness: composes the library crates the way `oc-processor`
//! does, minus the HTTP/axum transport, so the end-to-end scenarios of
//! spec §8 (S1-S6) can be driven and asserted on directly. One struct
//! wiring multiple engine crates into an offline-runnable loop.

use crate::fakes::{InMemoryDirectory, InMemoryPersistence, RecordingSink, ScriptedDistanceOracle};
use chrono::Duration;
use oc_queue::QueueRegistry;
use oc_schemas::{FollowUpContent, ContentType, QueueMessage};
use oc_state::{OrderStateManager, proposal_fsm};
use oc_schemas::ProposalStatus;

pub struct ScenarioHarness {
    pub states: OrderStateManager,
    pub queues: QueueRegistry,
    pub directory: InMemoryDirectory,
    pub persistence: InMemoryPersistence,
    pub sink: RecordingSink,
    pub queue_capacity: usize,
    pub expiry: Duration,
}

impl ScenarioHarness {
    pub fn new() -> Self {
        ScenarioHarness {
            states: OrderStateManager::new(),
            queues: QueueRegistry::new(1024),
            directory: InMemoryDirectory::default(),
            persistence: InMemoryPersistence::new(),
            sink: RecordingSink::default(),
            queue_capacity: 1024,
            expiry: Duration::minutes(30),
        }
    }

    /// Opens an order's stream-side state (spec §4.7 step 1) and runs C5
    /// seller selection against a scripted oracle.
    pub async fn open_stream(&self, order_id: &str, oracle: &ScriptedDistanceOracle, max_sellers: usize, fallback_km: f64) -> anyhow::Result<()> {
        let handle = self.states.get_or_create(order_id, self.expiry, "").await;
        let sellers = oc_selector::select_sellers(&self.directory, oracle, order_id, max_sellers, fallback_km).await?;
        handle.lock().await.assign_sellers_once(sellers);
        self.queues.get_or_create(order_id).await;
        Ok(())
    }

    /// HTTP `proposal-submissions` (spec §6): appends a proposal, enqueues
    /// `<pid>/New`, updates persistence.
    pub async fn submit_proposal(&self, order_id: &str, proposal_id: &str, price: f64) -> anyhow::Result<()> {
        let handle = self.states.get_or_create(order_id, self.expiry, "").await;
        {
            let mut state = handle.lock().await;
            state.push_proposal(proposal_id.to_string(), price, chrono::Utc::now());
        }
        self.persistence.proposal_submissions(&order_id.to_string(), &proposal_id.to_string()).await?;
        let queue = self.queues.get_or_create(order_id).await;
        queue.enqueue_message(&QueueMessage::New(proposal_id.to_string()));
        Ok(())
    }

    /// HTTP `proposals/{id}/followup` (spec §6).
    pub async fn submit_proposal_followup(&self, order_id: &str, proposal_id: &str, text: &str) -> anyhow::Result<String> {
        let content = FollowUpContent { content_type: ContentType::Text, body: text.to_string(), urls: vec![] };
        let follow_up_id = self.persistence.proposal_update(&order_id.to_string(), &proposal_id.to_string(), &content).await?;
        let queue = self.queues.get_or_create(order_id).await;
        queue.enqueue_message(&QueueMessage::Update(proposal_id.to_string(), follow_up_id.clone()));
        Ok(follow_up_id)
    }

    /// HTTP `proposals/edit-lock` (spec §6).
    pub async fn edit_lock(&self, order_id: &str, proposal_id: &str) -> anyhow::Result<()> {
        self.persistence.edit_lock(&order_id.to_string(), &proposal_id.to_string()).await?;
        let handle = self.states.get_or_create(order_id, self.expiry, "").await;
        if let Some(p) = handle.lock().await.proposal_mut(proposal_id) {
            p.status = proposal_fsm::transition(p.status, proposal_fsm::ProposalEvent::EditLock).unwrap_or(ProposalStatus::EditLock);
        }
        let queue = self.queues.get_or_create(order_id).await;
        queue.enqueue_message(&QueueMessage::EditLock(proposal_id.to_string()));
        Ok(())
    }

    /// Drains the order's queue, mapping each message to a `StreamEvent`,
    /// the way the C7 emit loop does (spec §4.7 step 4) — without the
    /// expiry loop, since tests drain a bounded number of messages.
    pub async fn drain_events(&self, order_id: &str, max: usize) -> Vec<oc_schemas::StreamEvent> {
        let queue = match self.queues.get(order_id).await {
            Some(q) => q,
            None => return vec![],
        };
        let mut out = Vec::new();
        for _ in 0..max {
            match queue.dequeue(std::time::Duration::from_millis(20)).await {
                Some(raw) => {
                    if let Some(parsed) = QueueMessage::parse(&raw) {
                        out.push(oc_schemas::StreamEvent {
                            order_id: order_id.to_string(),
                            status: parsed.status(),
                            proposal_id: parsed.proposal_id().to_string(),
                            follow_up_id: match &parsed {
                                QueueMessage::Update(_, f) => f.clone(),
                                _ => String::new(),
                            },
                        });
                    }
                }
                None => break,
            }
        }
        out
    }
}

impl Default for ScenarioHarness {
    fn default() -> Self {
        Self::new()
    }
}
