//! C9: the requestor stream client. Opens `GET /stream/{order_id}` against
//! the processor, consumes its SSE frames, maps each to a buyer-facing
//! notification (spec §4.9 table) and publishes it via C6. Retries
//! transport errors up to `max_retries` with `reconnect_delay` between
//! attempts; a clean EOF marks the order's stream inactive without
//! retrying (spec §4.9; §9 Open Question 3 notes chat acks are never
//! awaited either, which is the buyer-side analogue of this at-most-once
//! delivery).
//!
//! No example repo in the retrieval pack depends on an SSE client crate
//! (e.g. `reqwest-eventsource`), so the wire is parsed by hand over
//! `reqwest::Response::bytes_stream()` — a minimal `data: <json>\n\n`
//! reader matching what the processor's `axum::response::sse::Event`
//! actually puts on the wire.

use crate::tracking::SharedOrderTracking;
use futures_util::StreamExt;
use oc_notify::Sink;
use oc_schemas::{OrderId, StreamEvent, StreamStatus};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct StreamClientConfig {
    pub processor_base_url: String,
    pub max_retries: u32,
    pub reconnect_delay: Duration,
    /// `None` means held open indefinitely (spec §4.9).
    pub request_timeout: Option<Duration>,
}

/// Runs C9 for one order to completion: retries on transport error, stops
/// retrying on a clean EOF or once `max_retries` is exhausted. Intended to
/// run as a scheduled task (spec §4.9: "via C3 with priority High").
pub async fn run_stream_consumer(
    client: reqwest::Client,
    config: StreamClientConfig,
    tracking: SharedOrderTracking,
    sink: Arc<dyn Sink>,
    order_id: OrderId,
    session: String,
) {
    tracking.mark_stream_active(&order_id, &session).await;

    let mut attempt = 0;
    loop {
        match consume_once(&client, &config, &order_id, &session, sink.as_ref(), &tracking).await {
            Ok(()) => {
                tracing::info!(order_id = %order_id, "processor stream ended cleanly");
                break;
            }
            Err(e) => {
                attempt += 1;
                if attempt > config.max_retries {
                    tracing::warn!(order_id = %order_id, attempt, error = %e, "giving up on processor stream after max retries");
                    break;
                }
                tracing::warn!(order_id = %order_id, attempt, error = %e, "processor stream transport error, reconnecting");
                tokio::time::sleep(config.reconnect_delay).await;
            }
        }
    }

    tracking.mark_stream_inactive(&order_id).await;
}

/// Consumes the stream to completion (EOF) or the first transport error.
/// Each parsed frame is mapped and published before the loop continues, so
/// a transport error mid-stream still leaves already-seen events delivered.
async fn consume_once(
    client: &reqwest::Client,
    config: &StreamClientConfig,
    order_id: &str,
    session: &str,
    sink: &dyn Sink,
    tracking: &SharedOrderTracking,
) -> anyhow::Result<()> {
    let url = format!("{}/stream/{order_id}", config.processor_base_url);
    let mut req = client.get(&url);
    if let Some(timeout) = config.request_timeout {
        req = req.timeout(timeout);
    }
    let resp = req.send().await?.error_for_status()?;

    let mut body = resp.bytes_stream();
    let mut buf = String::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        buf.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buf.find("\n\n") {
            let frame = buf[..pos].to_string();
            buf.drain(..pos + 2);
            if let Some(event) = parse_sse_frame(&frame) {
                notify_stream_event(sink, &event.order_id, session, &event).await;
                if event.status == StreamStatus::OrderPaused {
                    tracking.append_note(order_id, buyer_message(&event)).await;
                }
            }
        }
    }

    Ok(())
}

fn parse_sse_frame(frame: &str) -> Option<StreamEvent> {
    for line in frame.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            return serde_json::from_str(data.trim()).ok();
        }
    }
    None
}

/// Spec §4.9's event -> buyer-message mapping table, published on
/// `BUYER_NOTIFY` / `ORD_UPDATES`.
pub fn buyer_message(event: &StreamEvent) -> String {
    match event.status {
        StreamStatus::NewProposal => "New Proposal received".to_string(),
        StreamStatus::ProposalClosed => format!("Proposal closed {}", event.proposal_id),
        StreamStatus::ProposalUpdate => format!("Proposal updates {}", event.proposal_id),
        StreamStatus::OrderPaused => format!("Choose one proposal {}", event.proposal_id),
        StreamStatus::EditLock => format!("Proposal updates in progress {}", event.proposal_id),
    }
}

pub async fn notify_stream_event(sink: &dyn Sink, order_id: &OrderId, session: &str, event: &StreamEvent) {
    oc_notify::notify_buyer(sink, order_id, session, serde_json::json!({ "message": buyer_message(event) })).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_status_to_its_table_row() {
        let mk = |status| StreamEvent { order_id: "O1".into(), status, proposal_id: "P1".into(), follow_up_id: String::new() };
        assert_eq!(buyer_message(&mk(StreamStatus::NewProposal)), "New Proposal received");
        assert_eq!(buyer_message(&mk(StreamStatus::ProposalClosed)), "Proposal closed P1");
        assert_eq!(buyer_message(&mk(StreamStatus::ProposalUpdate)), "Proposal updates P1");
        assert_eq!(buyer_message(&mk(StreamStatus::OrderPaused)), "Choose one proposal P1");
        assert_eq!(buyer_message(&mk(StreamStatus::EditLock)), "Proposal updates in progress P1");
    }

    #[test]
    fn parses_sse_data_line() {
        let frame = "event: new_proposal\ndata: {\"order_id\":\"O1\",\"status\":\"NewProposal\",\"proposal_id\":\"P1\",\"follow_up_id\":\"\"}";
        let event = parse_sse_frame(frame).unwrap();
        assert_eq!(event.order_id, "O1");
        assert_eq!(event.status, StreamStatus::NewProposal);
    }
}
