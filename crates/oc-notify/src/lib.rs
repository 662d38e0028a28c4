//! C6: notification fan-out. Publishes to named message-bus topics/keys and
//! to a chat endpoint. Every call is best-effort: failure is logged and
//! returned as `false`, never propagated as an error to the caller (spec
//! §4.6, §7 propagation policy).

use async_trait::async_trait;
use oc_schemas::{Key, NotificationEnvelope, OrderId, Topic};

/// The fan-out boundary. No example repo in the retrieval pack carries a
/// message-bus client crate, so this is modeled as a trait with an HTTP
/// (`reqwest`) implementation below and an in-memory fixture in
/// `oc-testkit` — the same boundary shape the original's `KafkaClient`
/// wrapper gave `NotificationService`.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Publish a message-bus message. Returns `false` on any failure;
    /// never raises.
    async fn publish(&self, topic: Topic, key: Key, envelope: &NotificationEnvelope) -> bool;

    /// Best-effort chat notification. Returns `false` on any failure.
    async fn notify_chat(&self, body: &serde_json::Value) -> bool;
}

/// `reqwest`-backed implementation: publishes by POSTing to a configured
/// base URL keyed by topic, and posts chat messages to a configured
/// webhook. Both calls swallow every error.
pub struct HttpSink {
    client: reqwest::Client,
    message_bus_base_url: String,
    gchat_webhook_url: Option<String>,
}

impl HttpSink {
    pub fn new(client: reqwest::Client, message_bus_base_url: String, gchat_webhook_url: Option<String>) -> Self {
        HttpSink {
            client,
            message_bus_base_url,
            gchat_webhook_url,
        }
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn publish(&self, topic: Topic, key: Key, envelope: &NotificationEnvelope) -> bool {
        let url = format!("{}/topics/{}", self.message_bus_base_url, topic.as_str());
        let result = self
            .client
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(envelope)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(topic = topic.as_str(), key = key.as_str(), order_id = %envelope.order_id, error = %e, "notification publish failed");
                false
            }
        }
    }

    async fn notify_chat(&self, body: &serde_json::Value) -> bool {
        let Some(webhook) = &self.gchat_webhook_url else {
            tracing::debug!("gchat webhook not configured, skipping chat notification");
            return false;
        };
        let result = self
            .client
            .post(webhook)
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "gchat notification failed");
                false
            }
        }
    }
}

/// Convenience wrappers mirroring `notification_service.py`'s named
/// shortcuts — each pins a topic/key pair so callers don't re-derive them.
pub async fn notify_sellers(sink: &dyn Sink, order_id: &OrderId, session: &str, body: serde_json::Value) -> bool {
    sink.publish(
        Topic::SellerNotify,
        Key::PrpRequest,
        &NotificationEnvelope {
            order_id: order_id.clone(),
            session: session.to_string(),
            body,
        },
    )
    .await
}

pub async fn notify_seller_acknowledgement(sink: &dyn Sink, order_id: &OrderId, session: &str, body: serde_json::Value) -> bool {
    sink.publish(
        Topic::SellerAcknowledgements,
        Key::PrpSubmission,
        &NotificationEnvelope {
            order_id: order_id.clone(),
            session: session.to_string(),
            body,
        },
    )
    .await
}

pub async fn notify_seller_followup(sink: &dyn Sink, order_id: &OrderId, session: &str, body: serde_json::Value) -> bool {
    sink.publish(
        Topic::SellerFollowup,
        Key::PrpUpdates,
        &NotificationEnvelope {
            order_id: order_id.clone(),
            session: session.to_string(),
            body,
        },
    )
    .await
}

pub async fn notify_proposal_failure(sink: &dyn Sink, order_id: &OrderId, session: &str, body: serde_json::Value) -> bool {
    sink.publish(
        Topic::PrpFailures,
        Key::PrpSubmission,
        &NotificationEnvelope {
            order_id: order_id.clone(),
            session: session.to_string(),
            body,
        },
    )
    .await
}

pub async fn notify_buyer(sink: &dyn Sink, order_id: &OrderId, session: &str, body: serde_json::Value) -> bool {
    sink.publish(
        Topic::BuyerNotify,
        Key::OrdUpdates,
        &NotificationEnvelope {
            order_id: order_id.clone(),
            session: session.to_string(),
            body,
        },
    )
    .await
}

pub async fn notify_request_failure(sink: &dyn Sink, order_id: &OrderId, session: &str, body: serde_json::Value) -> bool {
    sink.publish(
        Topic::ReqFailures,
        Key::OrdSubmission,
        &NotificationEnvelope {
            order_id: order_id.clone(),
            session: session.to_string(),
            body,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingSink {
        publishes: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn publish(&self, _topic: Topic, _key: Key, _envelope: &NotificationEnvelope) -> bool {
            self.publishes.fetch_add(1, Ordering::SeqCst);
            !self.fail
        }
        async fn notify_chat(&self, _body: &serde_json::Value) -> bool {
            !self.fail
        }
    }

    #[tokio::test]
    async fn failure_is_boolean_not_panic_or_error() {
        let sink = RecordingSink { publishes: Arc::new(AtomicUsize::new(0)), fail: true };
        let ok = notify_sellers(&sink, &"O1".to_string(), "", serde_json::json!({})).await;
        assert!(!ok);
        assert_eq!(sink.publishes.load(Ordering::SeqCst), 1);
    }
}
