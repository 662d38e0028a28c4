//! Shared wire types and closed enumerations for the order-coordination
//! platform: the data model of spec §3, the stream/HTTP payloads of §6, and
//! the default resource bounds of §5.

pub mod defaults;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, globally-unique order identifier. Format is informational; never
/// parsed by this crate.
pub type OrderId = String;
/// Opaque proposal identifier, unique within its parent order.
pub type ProposalId = String;
/// Server-generated canonical follow-up identifier, `F-<ParentID>-<8hex>`.
pub type FollowUpId = String;

/// How the Processor should notify sellers when a stream opens (§4.7 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum NotificationType {
    GChat,
    None,
}

/// Status carried on each streamed event frame (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamStatus {
    NewProposal,
    ProposalClosed,
    ProposalUpdate,
    OrderPaused,
    EditLock,
}

/// One frame of `ProcessOrderStream` (§6). `OrderPaused` is the terminal
/// frame and carries empty `proposal_id`/`follow_up_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub order_id: OrderId,
    pub status: StreamStatus,
    #[serde(default)]
    pub proposal_id: ProposalId,
    #[serde(default)]
    pub follow_up_id: FollowUpId,
}

impl StreamEvent {
    pub fn order_paused(order_id: OrderId) -> Self {
        Self {
            order_id,
            status: StreamStatus::OrderPaused,
            proposal_id: String::new(),
            follow_up_id: String::new(),
        }
    }
}

/// Proposal lifecycle state (§4.7 state diagram, §4.10 modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Submitted,
    Closed,
    Paused,
    EditLock,
    ProposalLock,
}

impl ProposalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProposalStatus::Closed | ProposalStatus::Paused)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A rich-content follow-up body (§3 FollowUp.content).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Html,
    Markdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpContent {
    pub content_type: ContentType,
    pub body: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A note attached to a proposal (result of `ProposalUpdate`/`UserEdits`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub follow_up_id: FollowUpId,
    pub content: FollowUpContent,
    pub added_time: DateTime<Utc>,
}

/// One seller's proposal against an order (§3 OrderState.proposals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: ProposalId,
    pub price: f64,
    pub delivery_date: DateTime<Utc>,
    pub notes: Vec<Note>,
    pub status: ProposalStatus,
}

/// A seller candidate selected by C5 (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerEntry {
    pub seller_id: String,
    pub distance_km: f64,
}

/// Worker-pool priority (§3 PriorityTask, §5). Lower variant value runs
/// first; ties are FIFO on `enqueued_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    High = 0,
    Medium = 1,
    Low = 2,
}

/// Closed set of message-bus topics (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    SellerAcknowledgements,
    SellerNotify,
    SellerFollowup,
    PrpFailures,
    BuyerAcknowledgements,
    BuyerNotify,
    BuyerFollowup,
    ReqFailures,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::SellerAcknowledgements => "SELLER_ACKNOWLEDGEMENTS",
            Topic::SellerNotify => "SELLER_NOTIFY",
            Topic::SellerFollowup => "SELLER_FOLLOWUP",
            Topic::PrpFailures => "PRP_FAILURES",
            Topic::BuyerAcknowledgements => "BUYER_ACKNOWLEDGEMENTS",
            Topic::BuyerNotify => "BUYER_NOTIFY",
            Topic::BuyerFollowup => "BUYER_FOLLOWUP",
            Topic::ReqFailures => "REQ_FAILURES",
        }
    }
}

/// Closed set of message-bus keys (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    OrdSubmission,
    OrdUpdates,
    PrpSubmission,
    PrpUpdates,
    PrpRequest,
}

impl Key {
    pub fn as_str(self) -> &'static str {
        match self {
            Key::OrdSubmission => "ORD_SUBMISSION",
            Key::OrdUpdates => "ORD_UPDATES",
            Key::PrpSubmission => "PRP_SUBMISSION",
            Key::PrpUpdates => "PRP_UPDATES",
            Key::PrpRequest => "PRP_REQUEST",
        }
    }
}

/// A message published through C6. Carries at minimum `order_id`, `session`
/// and `body` per §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub order_id: OrderId,
    #[serde(default)]
    pub session: String,
    pub body: serde_json::Value,
}

/// C11 mode dispatch (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    ProposalSubmissions,
    ProposalUpdate,
    ProposalClosed,
    OrderPaused,
    EditLock,
    ProposalLock,
    UserEdits,
}

/// Per-audience-entry outcome of `ProcessFollowUp` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUpAudienceStatus {
    EditLock,
    Updated,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpAudienceResult {
    pub proposal_id: ProposalId,
    pub status: FollowUpAudienceStatus,
    #[serde(default)]
    pub added_time: String,
}

/// A queue payload, parsed from the C2 wire grammar (§6):
/// `<proposal_id>/New | <proposal_id>/Closed | <proposal_id>/EditLock |
/// <proposal_id>.<follow_up_id>/Update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMessage {
    New(ProposalId),
    Closed(ProposalId),
    EditLock(ProposalId),
    Update(ProposalId, FollowUpId),
}

impl QueueMessage {
    pub fn encode(&self) -> String {
        match self {
            QueueMessage::New(p) => format!("{p}/New"),
            QueueMessage::Closed(p) => format!("{p}/Closed"),
            QueueMessage::EditLock(p) => format!("{p}/EditLock"),
            QueueMessage::Update(p, f) => format!("{p}.{f}/Update"),
        }
    }

    /// Parses the wire grammar. Returns `None` on anything that doesn't fit
    /// one of the four known shapes — callers log and skip (§4.7 step 4).
    pub fn parse(raw: &str) -> Option<Self> {
        let (head, code) = raw.rsplit_once('/')?;
        match code {
            "New" => Some(QueueMessage::New(head.to_string())),
            "Closed" => Some(QueueMessage::Closed(head.to_string())),
            "EditLock" => Some(QueueMessage::EditLock(head.to_string())),
            "Update" => {
                let (proposal_id, follow_up_id) = head.split_once('.')?;
                Some(QueueMessage::Update(
                    proposal_id.to_string(),
                    follow_up_id.to_string(),
                ))
            }
            _ => None,
        }
    }

    pub fn proposal_id(&self) -> &str {
        match self {
            QueueMessage::New(p)
            | QueueMessage::Closed(p)
            | QueueMessage::EditLock(p)
            | QueueMessage::Update(p, _) => p,
        }
    }

    pub fn status(&self) -> StreamStatus {
        match self {
            QueueMessage::New(_) => StreamStatus::NewProposal,
            QueueMessage::Closed(_) => StreamStatus::ProposalClosed,
            QueueMessage::EditLock(_) => StreamStatus::EditLock,
            QueueMessage::Update(_, _) => StreamStatus::ProposalUpdate,
        }
    }
}

// --- HTTP DTOs (§6) ---------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ProposalSubmissionRequest {
    pub order_id: OrderId,
    pub proposal_id: ProposalId,
    pub price: f64,
    pub delivery_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProposalFollowUpRequest {
    pub order_id: OrderId,
    pub content: FollowUpContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditLockRequest {
    pub order_id: OrderId,
    pub proposal_id: ProposalId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateOrderRequest {
    pub order_id: OrderId,
    #[serde(default)]
    pub session: String,
    #[serde(default = "default_notification_type")]
    pub notification_type: NotificationType,
}

fn default_notification_type() -> NotificationType {
    NotificationType::GChat
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderFollowUpRequest {
    pub content: FollowUpContent,
    pub audience: Vec<ProposalId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFollowUpRequest {
    pub order_id: OrderId,
    pub audience: Vec<ProposalId>,
    pub order_follow_up_id: FollowUpId,
    /// The follow-up body, persisted once to each non-EDITLOCK proposal in
    /// `audience` via C11's `UserEdits` mode (§4.8 step 2).
    pub content: FollowUpContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFollowUpResponse {
    pub ns_follow_up_resp: Vec<FollowUpAudienceResult>,
}

/// Structured error body, carried on every non-2xx HTTP response (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub details: String,
    #[serde(rename = "type")]
    pub kind: String,
}
