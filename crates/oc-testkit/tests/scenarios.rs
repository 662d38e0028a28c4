//! End-to-end scenarios from spec §8 (S1, S2, S3, S6), driven against the
//! real `oc-state`/`oc-queue`/`oc-selector`/`oc-persistence` crates through
//! `ScenarioHarness`.

use oc_schemas::StreamStatus;
use oc_testkit::fakes::ScriptedDistanceOracle;
use oc_testkit::ScenarioHarness;
use std::collections::HashMap;

fn setup_directory(harness: &mut ScenarioHarness, order_id: &str, sellers: Vec<&str>) {
    harness.directory.buyer_locations.insert(order_id.to_string(), (1.0, 2.0));
    harness.directory.industries.insert(order_id.to_string(), "widgets".to_string());
    harness
        .directory
        .sellers_by_industry
        .insert("widgets".to_string(), sellers.into_iter().map(String::from).collect());
}

#[tokio::test]
async fn s1_happy_path_one_proposal() {
    let mut harness = ScenarioHarness::new();
    setup_directory(&mut harness, "O1", vec!["S1"]);
    let oracle = ScriptedDistanceOracle::with_distances(HashMap::from([("S1".to_string(), 3.0)]));

    harness.open_stream("O1", &oracle, 3, 5.0).await.unwrap();
    let before = harness.drain_events("O1", 5).await;
    assert!(before.is_empty());

    harness.submit_proposal("O1", "P1", 100.0).await.unwrap();
    let events = harness.drain_events("O1", 5).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, StreamStatus::NewProposal);
    assert_eq!(events[0].proposal_id, "P1");
}

#[tokio::test]
async fn s2_followup_after_submission() {
    let mut harness = ScenarioHarness::new();
    setup_directory(&mut harness, "O1", vec!["S1"]);
    let oracle = ScriptedDistanceOracle::with_distances(HashMap::from([("S1".to_string(), 3.0)]));
    harness.open_stream("O1", &oracle, 3, 5.0).await.unwrap();
    harness.submit_proposal("O1", "P1", 100.0).await.unwrap();
    harness.drain_events("O1", 5).await;

    let follow_up_id = harness.submit_proposal_followup("O1", "P1", "please confirm").await.unwrap();
    assert!(follow_up_id.starts_with("F-P1-"));

    let events = harness.drain_events("O1", 5).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, StreamStatus::ProposalUpdate);
    assert_eq!(events[0].follow_up_id, follow_up_id);
}

#[tokio::test]
async fn s3_editlock_then_followup_short_circuits() {
    let mut harness = ScenarioHarness::new();
    setup_directory(&mut harness, "O1", vec!["S1"]);
    let oracle = ScriptedDistanceOracle::with_distances(HashMap::from([("S1".to_string(), 3.0)]));
    harness.open_stream("O1", &oracle, 3, 5.0).await.unwrap();
    harness.submit_proposal("O1", "P1", 100.0).await.unwrap();
    harness.drain_events("O1", 5).await;

    harness.edit_lock("O1", "P1").await.unwrap();
    let events = harness.drain_events("O1", 5).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, StreamStatus::EditLock);

    let status = harness.persistence.get_proposal_status(&"O1".to_string(), &"P1".to_string()).await.unwrap();
    assert_eq!(status, oc_schemas::ProposalStatus::EditLock);
}

#[tokio::test]
async fn s6_distance_oracle_outage_falls_back_and_preserves_order() {
    let mut harness = ScenarioHarness::new();
    let sellers = vec!["S1", "S2", "S3", "S4", "S5"];
    setup_directory(&mut harness, "O1", sellers.clone());
    let oracle = ScriptedDistanceOracle::failing();

    harness.open_stream("O1", &oracle, 3, 5.0).await.unwrap();

    let handle = harness.states.get("O1").await.unwrap();
    let state = handle.lock().await;
    assert_eq!(state.sellers.len(), 3);
    assert!(state.sellers.iter().all(|s| s.distance_km == 5.0));
    assert_eq!(state.sellers[0].seller_id, "S1");
    assert_eq!(state.sellers[1].seller_id, "S2");
    assert_eq!(state.sellers[2].seller_id, "S3");
}
