//! Account management integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use pharmacy_core::UserId;
use serde_json::json;

// ============================================================================
// Account Creation
// ============================================================================

#[tokio::test]
async fn create_account_issues_loyalty_card() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "username": "alice" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], harness.test_user_id.to_string());
    assert_eq!(body["username"], "alice");
    assert_eq!(body["balance_cents"], 0);
    assert_eq!(body["loyalty_card"]["bonuses"], 0);
    assert_eq!(body["loyalty_card"]["status"], "active");
}

#[tokio::test]
async fn create_account_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/accounts")
        .json(&json!({ "username": "alice" }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let harness = TestHarness::new();
    let claims = pharmacy_service::auth::JwtClaims {
        sub: harness.test_user_id.to_string(),
        exp: chrono::Utc::now().timestamp() + 600,
        iat: 0,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();

    let response = harness
        .server
        .get("/v1/accounts/me")
        .add_header("authorization", format!("Bearer {token}"))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn create_account_duplicate_fails() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "alice").await;

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "username": "alice2" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "already_exists");
}

#[tokio::test]
async fn username_taken_fails() {
    let harness = TestHarness::new();
    harness.register(UserId::generate(), "alice").await;

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "username": "ALICE" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn blank_username_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "username": "   " }))
        .await;

    response.assert_status_bad_request();
}

// ============================================================================
// Get Account
// ============================================================================

#[tokio::test]
async fn get_account_success() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "bob").await;

    let response = harness
        .server
        .get("/v1/accounts/me")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["username"], "bob");
    assert_eq!(body["balance_formatted"], "0.00");
}

#[tokio::test]
async fn get_nonexistent_account_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/accounts/me")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Roles
// ============================================================================

#[tokio::test]
async fn admin_sets_roles() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "carol").await;

    let response = harness
        .server
        .put(&format!("/v1/admin/accounts/{}/roles", harness.test_user_id))
        .add_header("x-admin-key", harness.admin_key_header())
        .json(&json!({ "roles": ["pharmacist", "moderator"] }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["roles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn set_roles_requires_admin_key() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "dave").await;

    let response = harness
        .server
        .put(&format!("/v1/admin/accounts/{}/roles", harness.test_user_id))
        .add_header("x-admin-key", "wrong-key")
        .json(&json!({ "roles": ["admin"] }))
        .await;

    response.assert_status_unauthorized();
}
