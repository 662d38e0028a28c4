//! Router-level integration tests for the requestor daemon's HTTP ingress
//! (spec §6), driven with `tower::ServiceExt::oneshot`. Cases that would
//! need a live processor (non-empty-audience follow-up forwarding) are left
//! to the scenario harness in `oc-testkit`; what's tested here needs only
//! the requestor's own router and C10 tracking.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use oc_requestor::{routes, state::AppState};
use oc_testkit::RecordingSink;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> Arc<AppState> {
    Arc::new(AppState::new(oc_config::Settings::default(), Arc::new(RecordingSink::default())))
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let router = routes::build_router(test_app());
    let resp = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["service"], json!("oc-requestor"));
}

#[tokio::test]
async fn second_initiate_short_circuits_without_opening_a_new_stream() {
    let router = routes::build_router(test_app());

    let initiate = || {
        Request::builder()
            .method("POST")
            .uri("/orders/initiate")
            .header("content-type", "application/json")
            .body(Body::from(json!({"order_id": "O1", "notification_type": "None"}).to_string()))
            .unwrap()
    };

    let resp = router.clone().oneshot(initiate()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first = body_json(resp).await;
    assert_eq!(first["started_new_stream"], json!(true));

    // No sleep needed: the handler marks the order active synchronously,
    // before the consumer task is even scheduled (spec §8 property 7).
    let resp = router.oneshot(initiate()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let second = body_json(resp).await;
    assert_eq!(second["started_new_stream"], json!(false));
}

#[tokio::test]
async fn empty_audience_followup_returns_empty_response_not_error() {
    let router = routes::build_router(test_app());
    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orders/O1/followup")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"content": {"content_type": "text", "body": "hi", "urls": []}, "audience": []}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ns_follow_up_resp"], json!([]));
}
