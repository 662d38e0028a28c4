//! C7: the processor stream handler — the heart of this service. Binds
//! order state, runs C5 seller selection, fans out the opening
//! notification, then drains the order's queue into a sequence of
//! `StreamEvent`s until the order expires or the client disconnects.

use crate::state::AppState;
use chrono::Utc;
use oc_schemas::{NotificationType, OrderId, QueueMessage, StreamEvent};
use oc_scheduler::{CancelToken, TaskId};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;

/// Raised only by step 2 (seller selection); every other failure in this
/// handler is logged and folded into the event stream or persistence retry,
/// per spec §4.7's failure semantics.
#[derive(Debug)]
pub enum StreamOpenError {
    SellerSelectionFailed(anyhow::Error),
}

impl std::fmt::Display for StreamOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamOpenError::SellerSelectionFailed(e) => write!(f, "seller selection failed: {e}"),
        }
    }
}

impl std::error::Error for StreamOpenError {}

/// Runs steps 1-3 synchronously (so a seller-selection failure can abort the
/// RPC before any SSE response is sent), then submits the emit loop as a
/// scheduled task and returns the receiving end of its event channel.
pub async fn open_stream(
    app: Arc<AppState>,
    order_id: OrderId,
    notification_type: NotificationType,
) -> Result<mpsc::Receiver<StreamEvent>, StreamOpenError> {
    let expiry = chrono::Duration::minutes(app.settings.order_expiry_minutes);
    let handle = app.states.get_or_create(&order_id, expiry, "").await;

    if !handle.lock().await.sellers_assigned() {
        let sellers = oc_selector::select_sellers(
            app.directory.as_ref(),
            app.oracle.as_ref(),
            &order_id,
            app.settings.find_max_sel,
            app.settings.fallback_distance_km,
        )
        .await
        .map_err(StreamOpenError::SellerSelectionFailed)?;
        handle.lock().await.assign_sellers_once(sellers);
    }

    notify_sellers_opening(&app, &order_id, notification_type).await;

    let (tx, rx) = mpsc::channel(64);
    let (_task_id, token): (TaskId, CancelToken) = app
        .scheduler
        .submit(
            oc_schemas::TaskPriority::Medium,
            order_id.clone(),
            Box::new({
                let app = app.clone();
                let order_id = order_id.clone();
                move |token| Box::pin(run_emit_loop(app, order_id, tx, token))
            }),
        )
        .await;
    app.register_stream_task(&order_id, token).await;

    Ok(rx)
}

async fn notify_sellers_opening(app: &Arc<AppState>, order_id: &OrderId, notification_type: NotificationType) {
    let sellers = match app.states.get(order_id).await {
        Some(h) => h.lock().await.sellers.clone(),
        None => Vec::new(),
    };

    if notification_type == NotificationType::GChat {
        let body = serde_json::json!({
            "order_id": order_id,
            "sellers": sellers.iter().map(|s| &s.seller_id).collect::<Vec<_>>(),
        });
        app.sink.notify_chat(&body).await;
    }

    oc_notify::notify_sellers(
        app.sink.as_ref(),
        order_id,
        "",
        serde_json::json!({ "sellers": sellers }),
    )
    .await;
}

/// Step 4-6. Owned by a scheduled task so the processor never runs more
/// concurrent stream loops than `max_concurrent_tasks` (spec §5).
async fn run_emit_loop(
    app: Arc<AppState>,
    order_id: OrderId,
    tx: mpsc::Sender<StreamEvent>,
    token: CancelToken,
) -> Result<(), String> {
    let queue = app.queues.get_or_create(&order_id).await;

    loop {
        if token.is_cancelled() {
            return Ok(());
        }

        let Some(handle) = app.states.get(&order_id).await else {
            return Ok(());
        };
        let expired = {
            let state = handle.lock().await;
            state.is_expired(Utc::now())
        };
        if expired {
            break;
        }

        let raw = match queue.dequeue(StdDuration::from_secs(1)).await {
            Some(raw) => raw,
            None => continue,
        };

        let Some(parsed) = QueueMessage::parse(&raw) else {
            tracing::warn!(order_id = %order_id, raw, "unparseable queue message, skipping");
            continue;
        };

        let known = {
            let state = handle.lock().await;
            state.proposal(parsed.proposal_id()).is_some()
        };
        if !known {
            tracing::warn!(order_id = %order_id, proposal_id = parsed.proposal_id(), "queue message for unknown proposal, skipping");
            continue;
        }

        let event = StreamEvent {
            order_id: order_id.clone(),
            status: parsed.status(),
            proposal_id: parsed.proposal_id().to_string(),
            follow_up_id: match &parsed {
                QueueMessage::Update(_, f) => f.clone(),
                _ => String::new(),
            },
        };

        if tx.send(event).await.is_err() {
            // client disconnected: stop emitting, leave order state and
            // queue alone for C4 to reap on expiry.
            return Ok(());
        }
    }

    if let Err(e) = app.persistence.order_paused(&order_id).await {
        tracing::warn!(order_id = %order_id, error = %e, "order_paused persistence call failed at expiry");
    }
    let _ = tx.send(StreamEvent::order_paused(order_id)).await;
    Ok(())
}
