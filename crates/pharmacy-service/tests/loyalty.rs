//! Loyalty card integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn owner_sees_own_card() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "alice").await;

    let response = harness
        .server
        .get(&format!("/v1/loyalty-cards/{}", harness.test_user_id))
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], harness.test_user_id.to_string());
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn others_cannot_see_card() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "alice").await;
    let other = harness.buyer("bob", 0).await;

    let response = harness
        .server
        .get(&format!("/v1/loyalty-cards/{}", harness.test_user_id))
        .add_header("authorization", harness.auth_header_for(other))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_sets_bonuses_and_blocks() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    harness.register(harness.test_user_id, "alice").await;

    harness.set_bonuses(staff, harness.test_user_id, 750).await;

    let response = harness
        .server
        .post(&format!("/v1/loyalty-cards/{}/block", harness.test_user_id))
        .add_header("authorization", harness.auth_header_for(staff))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "blocked");
    assert_eq!(body["bonuses"], 750);

    let response = harness
        .server
        .post(&format!("/v1/loyalty-cards/{}/unblock", harness.test_user_id))
        .add_header("authorization", harness.auth_header_for(staff))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn negative_bonuses_rejected() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    harness.register(harness.test_user_id, "alice").await;

    let response = harness
        .server
        .put(&format!("/v1/loyalty-cards/{}/bonuses", harness.test_user_id))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "bonuses": -5 }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn customer_cannot_grant_themselves_bonuses() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "alice").await;

    let response = harness
        .server
        .put(&format!("/v1/loyalty-cards/{}/bonuses", harness.test_user_id))
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "bonuses": 1_000_000 }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}
