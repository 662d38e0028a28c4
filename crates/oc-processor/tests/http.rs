//! Router-level integration tests for the processor daemon's HTTP ingress
//! (spec §6), driven with `tower::ServiceExt::oneshot` against the real
//! `oc-processor` router wired to `oc-testkit`'s in-memory fakes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use oc_processor::{routes, state::AppState};
use oc_testkit::{InMemoryDirectory, InMemoryPersistence, RecordingSink, ScriptedDistanceOracle};
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::ServiceExt;

fn test_app() -> Arc<AppState> {
    let mut directory = InMemoryDirectory::default();
    directory.buyer_locations.insert("O1".to_string(), (1.0, 2.0));
    directory.industries.insert("O1".to_string(), "widgets".to_string());
    directory
        .sellers_by_industry
        .insert("widgets".to_string(), vec!["S1".to_string()]);

    let oracle = ScriptedDistanceOracle::with_distances(HashMap::from([("S1".to_string(), 3.0)]));

    Arc::new(AppState::new(
        oc_config::Settings::default(),
        Arc::new(directory),
        Arc::new(oracle),
        Arc::new(InMemoryPersistence::new()),
        Arc::new(RecordingSink::default()),
    ))
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok_and_scheduler_stats() {
    let router = routes::build_router(test_app());
    let resp = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["service"], json!("oc-processor"));
}

#[tokio::test]
async fn proposal_submission_then_duplicate_is_conflict() {
    let router = routes::build_router(test_app());

    let submit = |proposal_id: &str| {
        Request::builder()
            .method("POST")
            .uri("/proposals/proposal-submissions")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "order_id": "O1",
                    "proposal_id": proposal_id,
                    "price": 100.0,
                    "delivery_date": "2026-08-01T00:00:00Z",
                })
                .to_string(),
            ))
            .unwrap()
    };

    let resp = router.clone().oneshot(submit("P1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router.oneshot(submit("P1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_json(resp).await;
    assert_eq!(body["type"], json!("Conflict"));
}

#[tokio::test]
async fn process_follow_up_editlock_short_circuits_without_mutation() {
    let app = test_app();
    let router = routes::build_router(app.clone());

    let submit = Request::builder()
        .method("POST")
        .uri("/proposals/proposal-submissions")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "order_id": "O1",
                "proposal_id": "P1",
                "price": 50.0,
                "delivery_date": "2026-08-01T00:00:00Z",
            })
            .to_string(),
        ))
        .unwrap();
    let resp = router.clone().oneshot(submit).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let lock = Request::builder()
        .method("POST")
        .uri("/proposals/edit-lock")
        .header("content-type", "application/json")
        .body(Body::from(json!({"order_id": "O1", "proposal_id": "P1"}).to_string()))
        .unwrap();
    let resp = router.clone().oneshot(lock).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let follow_up = Request::builder()
        .method("POST")
        .uri("/process-follow-up")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "order_id": "O1",
                "audience": ["P1"],
                "order_follow_up_id": "F-O1-deadbeef",
                "content": {"content_type": "text", "body": "hi", "urls": []},
            })
            .to_string(),
        ))
        .unwrap();
    let resp = router.oneshot(follow_up).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ns_follow_up_resp"][0]["status"], json!("EditLock"));
    assert_eq!(body["ns_follow_up_resp"][0]["added_time"], json!(""));
}
