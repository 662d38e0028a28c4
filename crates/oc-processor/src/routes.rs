//! Axum router and HTTP handlers for the processor daemon (spec §6 ingress,
//! plus `GET /stream/{order_id}` as the axum-SSE realization of
//! `ProcessOrderStream` — see SPEC_FULL §D.1). `build_router` is the single
//! entry point; `main.rs` attaches tracing/CORS middleware after this call
//! so tests can use the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use oc_schemas::{
    ApiError, EditLockRequest, NotificationType, ProcessFollowUpRequest,
    ProcessFollowUpResponse, ProposalFollowUpRequest, ProposalSubmissionRequest, QueueMessage,
};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    api_types::{HealthResponse, StreamQuery},
    followup_handler, state::AppState, state::uptime_secs, stream_handler,
};

pub fn build_router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stream/:order_id", get(stream))
        .route("/process-follow-up", post(process_follow_up))
        .route("/proposals/proposal-submissions", post(proposal_submission))
        .route("/proposals/:proposal_id/followup", post(proposal_followup))
        .route("/proposals/edit-lock", post(edit_lock))
        .with_state(app)
}

async fn health(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = app.scheduler.stats().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: "oc-processor",
            version: app.build.version,
            uptime_secs: uptime_secs(),
            scheduler: stats.into(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /stream/:order_id  — C7 server-streaming RPC (axum SSE transport)
// ---------------------------------------------------------------------------

async fn stream(
    State(app): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let notification_type = query.notification_type.unwrap_or(NotificationType::None);
    match stream_handler::open_stream(app, order_id, notification_type).await {
        Ok(rx) => {
            let events = receiver_to_sse(rx);
            Sse::new(events).keep_alive(KeepAlive::new()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "seller selection failed, aborting stream");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    message: "seller selection failed".to_string(),
                    details: e.to_string(),
                    kind: "Internal".to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn receiver_to_sse(
    rx: tokio::sync::mpsc::Receiver<oc_schemas::StreamEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(rx).map(|event| {
        let event_name = match event.status {
            oc_schemas::StreamStatus::NewProposal => "new_proposal",
            oc_schemas::StreamStatus::ProposalClosed => "proposal_closed",
            oc_schemas::StreamStatus::ProposalUpdate => "proposal_update",
            oc_schemas::StreamStatus::OrderPaused => "order_paused",
            oc_schemas::StreamStatus::EditLock => "edit_lock",
        };
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event_name).data(data))
    })
}

// ---------------------------------------------------------------------------
// POST /process-follow-up  — C8 unary RPC
// ---------------------------------------------------------------------------

async fn process_follow_up(
    State(app): State<Arc<AppState>>,
    Json(req): Json<ProcessFollowUpRequest>,
) -> impl IntoResponse {
    let results = followup_handler::process_follow_up(
        &app,
        &req.order_id,
        &req.audience,
        &req.order_follow_up_id,
        &req.content,
    )
    .await;
    (StatusCode::OK, Json(ProcessFollowUpResponse { ns_follow_up_resp: results }))
}

// ---------------------------------------------------------------------------
// POST /proposals/proposal-submissions
// ---------------------------------------------------------------------------

async fn proposal_submission(
    State(app): State<Arc<AppState>>,
    Json(req): Json<ProposalSubmissionRequest>,
) -> Response {
    let handle = app
        .states
        .get_or_create(&req.order_id, chrono::Duration::minutes(app.settings.order_expiry_minutes), "")
        .await;
    {
        let mut state = handle.lock().await;
        if state.proposal(&req.proposal_id).is_some() {
            return api_error(
                StatusCode::CONFLICT,
                "duplicate proposal_id",
                &req.proposal_id,
                "Conflict",
            );
        }
        state.push_proposal(req.proposal_id.clone(), req.price, req.delivery_date);
    }

    if let Err(e) = app.persistence.proposal_submissions(&req.order_id, &req.proposal_id).await {
        tracing::warn!(order_id = %req.order_id, proposal_id = %req.proposal_id, error = %e, "proposal_submissions persistence call failed");
        oc_notify::notify_proposal_failure(
            app.sink.as_ref(),
            &req.order_id,
            "",
            serde_json::json!({ "proposal_id": req.proposal_id, "reason": e.to_string() }),
        )
        .await;
        return api_error(StatusCode::SERVICE_UNAVAILABLE, "persistence unavailable", &e.to_string(), "ExternalUnavailable");
    }

    let queue = app.queues.get_or_create(&req.order_id).await;
    queue.enqueue_message(&QueueMessage::New(req.proposal_id.clone()));

    oc_notify::notify_seller_acknowledgement(
        app.sink.as_ref(),
        &req.order_id,
        "",
        serde_json::json!({ "proposal_id": req.proposal_id, "price": req.price }),
    )
    .await;

    StatusCode::OK.into_response()
}

// ---------------------------------------------------------------------------
// POST /proposals/:proposal_id/followup
// ---------------------------------------------------------------------------

async fn proposal_followup(
    State(app): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
    Json(req): Json<ProposalFollowUpRequest>,
) -> Response {
    let follow_up_id = match app.persistence.proposal_update(&req.order_id, &proposal_id, &req.content).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(order_id = %req.order_id, proposal_id, error = %e, "proposal_update persistence call failed");
            oc_notify::notify_proposal_failure(
                app.sink.as_ref(),
                &req.order_id,
                "",
                serde_json::json!({ "proposal_id": proposal_id, "reason": e.to_string() }),
            )
            .await;
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "persistence unavailable", &e.to_string(), "ExternalUnavailable");
        }
    };

    if let Some(handle) = app.states.get(&req.order_id).await {
        if let Some(p) = handle.lock().await.proposal_mut(&proposal_id) {
            p.notes.push(oc_schemas::Note {
                follow_up_id: follow_up_id.clone(),
                content: req.content.clone(),
                added_time: chrono::Utc::now(),
            });
        }
    }

    let queue = app.queues.get_or_create(&req.order_id).await;
    queue.enqueue_message(&QueueMessage::Update(proposal_id, follow_up_id));

    StatusCode::OK.into_response()
}

// ---------------------------------------------------------------------------
// POST /proposals/edit-lock
// ---------------------------------------------------------------------------

async fn edit_lock(State(app): State<Arc<AppState>>, Json(req): Json<EditLockRequest>) -> Response {
    if let Err(e) = app.persistence.edit_lock(&req.order_id, &req.proposal_id).await {
        tracing::warn!(order_id = %req.order_id, proposal_id = %req.proposal_id, error = %e, "edit_lock persistence call failed");
        oc_notify::notify_proposal_failure(
            app.sink.as_ref(),
            &req.order_id,
            "",
            serde_json::json!({ "proposal_id": req.proposal_id, "reason": e.to_string() }),
        )
        .await;
        return api_error(StatusCode::SERVICE_UNAVAILABLE, "persistence unavailable", &e.to_string(), "ExternalUnavailable");
    }

    if let Some(handle) = app.states.get(&req.order_id).await {
        if let Some(p) = handle.lock().await.proposal_mut(&req.proposal_id) {
            if let Ok(next) = oc_state::proposal_fsm::transition(p.status, oc_state::proposal_fsm::ProposalEvent::EditLock) {
                p.status = next;
            }
        }
    }

    let queue = app.queues.get_or_create(&req.order_id).await;
    queue.enqueue_message(&QueueMessage::EditLock(req.proposal_id.clone()));

    StatusCode::OK.into_response()
}

fn api_error(status: StatusCode, message: &str, details: &str, kind: &str) -> Response {
    (
        status,
        Json(ApiError {
            message: message.to_string(),
            details: details.to_string(),
            kind: kind.to_string(),
        }),
    )
        .into_response()
}
