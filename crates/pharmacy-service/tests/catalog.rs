//! Catalog, promotion and review integration tests.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestHarness;
use pharmacy_core::UserId;
use serde_json::json;

// ============================================================================
// Goods
// ============================================================================

#[tokio::test]
async fn staff_creates_goods() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;

    let response = harness
        .server
        .post("/v1/goods")
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({
            "name": "Aspirin",
            "kind": "medicine",
            "info": "500 mg",
            "price_cents": 1999,
            "stock": 12
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "Aspirin");
    assert_eq!(body["effective_price_cents"], 1999);
    assert_eq!(body["effective_price_formatted"], "19.99");
    assert_eq!(body["stock"], 12);
    assert!(body["active_promotion"].is_null());
}

#[tokio::test]
async fn customer_cannot_create_goods() {
    let harness = TestHarness::new();
    harness.register(harness.test_user_id, "alice").await;

    let response = harness
        .server
        .post("/v1/goods")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "name": "Aspirin", "price_cents": 100 }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn pharmacist_manages_catalog() {
    let harness = TestHarness::new();
    let pharmacist = UserId::generate();
    harness.register(pharmacist, "pharmacist").await;
    harness.grant(pharmacist, &["pharmacist"]).await;

    let goods_id = harness.add_goods(pharmacist, "Bandage", 250, 4).await;

    let response = harness
        .server
        .put(&format!("/v1/goods/{goods_id}"))
        .add_header("authorization", harness.auth_header_for(pharmacist))
        .json(&json!({ "price_cents": 300, "stock": 10 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["price_cents"], 300);
    assert_eq!(body["stock"], 10);

    harness
        .server
        .delete(&format!("/v1/goods/{goods_id}"))
        .add_header("authorization", harness.auth_header_for(pharmacist))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    harness
        .server
        .get(&format!("/v1/goods/{goods_id}"))
        .add_header("authorization", harness.auth_header_for(pharmacist))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn duplicate_goods_name_conflicts() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    harness.add_goods(staff, "Aspirin", 100, 1).await;

    let response = harness
        .server
        .post("/v1/goods")
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "name": "aspirin", "price_cents": 100 }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn negative_price_rejected() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;

    let response = harness
        .server
        .post("/v1/goods")
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "name": "Freebie", "price_cents": -1 }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_price");
}

#[tokio::test]
async fn price_ceiling_enforced() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;

    let response = harness
        .server
        .post("/v1/goods")
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "name": "Gold plated scalpel", "price_cents": 100_000_000 }))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_price");

    let goods_id = harness.add_goods(staff, "Scalpel", 99_999_999, 1).await;
    let response = harness
        .server
        .put(&format!("/v1/goods/{goods_id}"))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "price_cents": i64::MAX }))
        .await;
    response.assert_status_bad_request();

    harness
        .server
        .post(&format!("/v1/goods/{goods_id}/promotions"))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({
            "percentage": 10,
            "expires_at": (Utc::now() + Duration::days(1)).to_rfc3339()
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = harness
        .server
        .get("/v1/goods")
        .add_header("authorization", harness.auth_header_for(staff))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body[0]["effective_price_cents"], 89_999_999);
}

#[tokio::test]
async fn list_goods_filters() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    harness.add_goods(staff, "Aspirin", 500, 3).await;
    harness.add_goods(staff, "Zinc tablets", 300, 0).await;
    harness.add_goods(staff, "Aspirin Forte", 900, 1).await;

    let response = harness
        .server
        .get("/v1/goods?name=aspirin&max_price_cents=600")
        .add_header("authorization", harness.auth_header_for(staff))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let goods = body.as_array().unwrap();
    assert_eq!(goods.len(), 1);
    assert_eq!(goods[0]["name"], "Aspirin");

    let response = harness
        .server
        .get("/v1/goods?in_stock=false")
        .add_header("authorization", harness.auth_header_for(staff))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Zinc tablets");
}

// ============================================================================
// Promotions
// ============================================================================

#[tokio::test]
async fn promotion_discounts_goods() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    let goods_id = harness.add_goods(staff, "Lotion", 1999, 5).await;

    let response = harness
        .server
        .post(&format!("/v1/goods/{goods_id}/promotions"))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({
            "percentage": 10,
            "expires_at": (Utc::now() + Duration::days(1)).to_rfc3339()
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = harness
        .server
        .get(&format!("/v1/goods/{goods_id}"))
        .add_header("authorization", harness.auth_header_for(staff))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["price_cents"], 1999);
    assert_eq!(body["effective_price_cents"], 1799);
    assert_eq!(body["active_promotion"]["percentage"], 10);
}

#[tokio::test]
async fn second_running_promotion_conflicts() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    let goods_id = harness.add_goods(staff, "Cream", 1000, 5).await;
    let expires_at = (Utc::now() + Duration::days(1)).to_rfc3339();

    harness
        .server
        .post(&format!("/v1/goods/{goods_id}/promotions"))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "percentage": 20, "expires_at": expires_at }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = harness
        .server
        .post(&format!("/v1/goods/{goods_id}/promotions"))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "percentage": 30, "expires_at": expires_at }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "active_promotion_exists");
}

#[tokio::test]
async fn promotion_percentage_bounds() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    let goods_id = harness.add_goods(staff, "Soap", 100, 5).await;
    let expires_at = (Utc::now() + Duration::days(1)).to_rfc3339();

    for percentage in [5, 95, 300] {
        let response = harness
            .server
            .post(&format!("/v1/goods/{goods_id}/promotions"))
            .add_header("authorization", harness.auth_header_for(staff))
            .json(&json!({ "percentage": percentage, "expires_at": expires_at }))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["code"], "invalid_promotion");
    }
}

#[tokio::test]
async fn promotion_can_be_updated_and_deleted() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    let goods_id = harness.add_goods(staff, "Gel", 1000, 5).await;

    let response = harness
        .server
        .post(&format!("/v1/goods/{goods_id}/promotions"))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({
            "percentage": 20,
            "expires_at": (Utc::now() + Duration::days(1)).to_rfc3339()
        }))
        .await;
    let body: serde_json::Value = response.json();
    let promotion_id = body["id"].as_str().unwrap().to_string();

    let response = harness
        .server
        .put(&format!("/v1/promotions/{promotion_id}"))
        .add_header("authorization", harness.auth_header_for(staff))
        .json(&json!({ "percentage": 50 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["percentage"], 50);

    harness
        .server
        .delete(&format!("/v1/promotions/{promotion_id}"))
        .add_header("authorization", harness.auth_header_for(staff))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = harness
        .server
        .get(&format!("/v1/goods/{goods_id}/promotions"))
        .add_header("authorization", harness.auth_header_for(staff))
        .await;
    let body: serde_json::Value = response.json();
    assert!(body.as_array().unwrap().is_empty());
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
async fn one_review_per_author() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    let goods_id = harness.add_goods(staff, "Shampoo", 800, 5).await;

    let response = harness
        .server
        .post(&format!("/v1/goods/{goods_id}/reviews"))
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "text": "Works well", "grade_hundredths": 450 }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = harness
        .server
        .post(&format!("/v1/goods/{goods_id}/reviews"))
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "text": "Again", "grade_hundredths": 100 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "duplicate_review");
}

#[tokio::test]
async fn grade_out_of_range_rejected() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    let goods_id = harness.add_goods(staff, "Balm", 800, 5).await;

    let response = harness
        .server
        .post(&format!("/v1/goods/{goods_id}/reviews"))
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "text": "Too good", "grade_hundredths": 501 }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_grade");
}

#[tokio::test]
async fn only_author_edits_and_moderator_deletes() {
    let harness = TestHarness::new();
    let staff = harness.staff().await;
    let goods_id = harness.add_goods(staff, "Cream", 800, 5).await;

    let response = harness
        .server
        .post(&format!("/v1/goods/{goods_id}/reviews"))
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "text": "Nice", "grade_hundredths": 400 }))
        .await;
    let body: serde_json::Value = response.json();
    let review_id = body["id"].as_str().unwrap().to_string();

    let stranger = UserId::generate();
    harness
        .server
        .put(&format!("/v1/reviews/{review_id}"))
        .add_header("authorization", harness.auth_header_for(stranger))
        .json(&json!({ "text": "Hijacked" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    harness
        .server
        .delete(&format!("/v1/reviews/{review_id}"))
        .add_header("authorization", harness.auth_header_for(stranger))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = harness
        .server
        .put(&format!("/v1/reviews/{review_id}"))
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "grade_hundredths": 350 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["grade_hundredths"], 350);
    assert_eq!(body["text"], "Nice");

    let moderator = UserId::generate();
    harness.register(moderator, "moderator").await;
    harness.grant(moderator, &["moderator"]).await;
    harness
        .server
        .delete(&format!("/v1/reviews/{review_id}"))
        .add_header("authorization", harness.auth_header_for(moderator))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = harness
        .server
        .get(&format!("/v1/goods/{goods_id}/reviews"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    let body: serde_json::Value = response.json();
    assert!(body.as_array().unwrap().is_empty());
}
