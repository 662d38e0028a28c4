//! Axum router and HTTP handlers for the requestor daemon (spec §6
//! ingress). `build_router` is the single entry point; `main.rs` attaches
//! tracing middleware after this call.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use oc_schemas::{
    ApiError, InitiateOrderRequest, OrderFollowUpRequest, ProcessFollowUpRequest,
    ProcessFollowUpResponse,
};
use oc_schemas::TaskPriority;

use crate::{
    api_types::{HealthResponse, InitiateOrderResponse, OrderStatusResponse},
    client, state::AppState, state::uptime_secs,
};

pub fn build_router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders/initiate", post(initiate_order))
        .route("/orders/:order_id/followup", post(order_followup))
        .route("/orders/finalize/:order_id", put(finalize_order))
        .route("/orders/pause/:order_id", put(pause_order))
        .with_state(app)
}

async fn health(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        service: "oc-requestor",
        version: app.build.version,
        uptime_secs: uptime_secs(),
    })
}

// ---------------------------------------------------------------------------
// POST /orders/initiate — idempotent per order_req_id (spec §6, §8 property 7)
// ---------------------------------------------------------------------------

async fn initiate_order(
    State(app): State<Arc<AppState>>,
    Json(req): Json<InitiateOrderRequest>,
) -> impl IntoResponse {
    if app.tracking.is_stream_active(&req.order_id).await {
        tracing::info!(order_id = %req.order_id, "initiate short-circuited: stream already active");
        return (
            StatusCode::OK,
            Json(InitiateOrderResponse { order_id: req.order_id, started_new_stream: false }),
        );
    }

    // Marked active synchronously, before the consumer task is even
    // scheduled: the task's own `mark_stream_active` call is then a no-op
    // repeat, so two back-to-back initiate calls can't both observe
    // stream_active=false and both submit a consumer (spec §8 property 7).
    app.tracking.mark_stream_active(&req.order_id, &req.session).await;

    let config = app.stream_client_config();
    let tracking = app.tracking.clone();
    let sink = app.sink.clone();
    let http = app.http.clone();
    let order_id = req.order_id.clone();
    let session = req.session.clone();

    // Opened with priority High (spec §4.9: "via C3 with priority High").
    app.scheduler
        .submit(
            TaskPriority::High,
            order_id.clone(),
            Box::new(move |_token| {
                Box::pin(async move {
                    client::run_stream_consumer(http, config, tracking, sink, order_id, session).await;
                    Ok(())
                })
            }),
        )
        .await;

    (
        StatusCode::OK,
        Json(InitiateOrderResponse { order_id: req.order_id, started_new_stream: true }),
    )
}

// ---------------------------------------------------------------------------
// POST /orders/:order_id/followup — persist, then invoke ProcessFollowUp
// ---------------------------------------------------------------------------

async fn order_followup(
    State(app): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Json(req): Json<OrderFollowUpRequest>,
) -> impl IntoResponse {
    if req.audience.is_empty() {
        // spec §8 boundary: empty audience returns empty response, not error.
        return (StatusCode::OK, Json(ProcessFollowUpResponse { ns_follow_up_resp: vec![] })).into_response();
    }

    let order_follow_up_id = app.order_follow_up_ids.generate(&order_id);
    app.tracking.append_note(&order_id, req.content.body.clone()).await;

    let body = ProcessFollowUpRequest {
        order_id: order_id.clone(),
        audience: req.audience.clone(),
        order_follow_up_id,
        content: req.content.clone(),
    };

    let url = format!("{}/process-follow-up", app.settings.processor_stream_base_url);
    match app.http.post(&url).json(&body).send().await {
        Ok(resp) => match resp.error_for_status() {
            Ok(resp) => match resp.json::<ProcessFollowUpResponse>().await {
                Ok(parsed) => (StatusCode::OK, Json(parsed)).into_response(),
                Err(e) => service_unavailable(&e.to_string()),
            },
            Err(e) => service_unavailable(&e.to_string()),
        },
        Err(e) => service_unavailable(&e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// PUT /orders/finalize/:id  / PUT /orders/pause/:id — status transitions
// ---------------------------------------------------------------------------

async fn finalize_order(State(app): State<Arc<AppState>>, Path(order_id): Path<String>) -> impl IntoResponse {
    app.tracking.mark_stream_inactive(&order_id).await;
    (StatusCode::OK, Json(OrderStatusResponse { ok: true }))
}

async fn pause_order(State(app): State<Arc<AppState>>, Path(order_id): Path<String>) -> impl IntoResponse {
    app.tracking.mark_stream_inactive(&order_id).await;
    (StatusCode::OK, Json(OrderStatusResponse { ok: true }))
}

fn service_unavailable(detail: &str) -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError {
            message: "processor unreachable".to_string(),
            details: detail.to_string(),
            kind: "ExternalUnavailable".to_string(),
        }),
    )
        .into_response()
}
