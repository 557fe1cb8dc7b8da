//! Common test utilities for pharmacy integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tempfile::TempDir;

use pharmacy_core::UserId;
use pharmacy_service::auth::JwtClaims;
use pharmacy_service::{create_router, AppState, ServiceConfig};
use pharmacy_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// Secret the harness signs user tokens with.
    pub jwt_secret: String,
    /// The admin API key.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let jwt_secret = "test-jwt-secret".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_jwt_secret: Some(jwt_secret.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(Arc::new(store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id: UserId::generate(),
            jwt_secret,
            admin_api_key,
        }
    }

    /// Bearer header for any user, signed with the harness secret.
    pub fn auth_header_for(&self, user_id: UserId) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: now + 3600,
            iat: now,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .expect("Failed to sign token");
        format!("Bearer {token}")
    }

    /// Get the authorization header for the default test user.
    pub fn user_auth_header(&self) -> String {
        self.auth_header_for(self.test_user_id)
    }

    /// Get the admin key header value.
    pub fn admin_key_header(&self) -> String {
        self.admin_api_key.clone()
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    /// Register an account for a user.
    pub async fn register(&self, user_id: UserId, username: &str) {
        self.server
            .post("/v1/accounts")
            .add_header("authorization", self.auth_header_for(user_id))
            .json(&json!({ "username": username }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    /// Credit a user's balance through the admin endpoint.
    pub async fn fund(&self, user_id: UserId, amount_cents: i64) {
        self.server
            .post("/v1/admin/balance/credit")
            .add_header("x-admin-key", self.admin_key_header())
            .json(&json!({
                "user_id": user_id.to_string(),
                "amount_cents": amount_cents,
                "reason": "Test funding"
            }))
            .await
            .assert_status_ok();
    }

    /// Replace a user's roles through the admin endpoint.
    pub async fn grant(&self, user_id: UserId, roles: &[&str]) {
        self.server
            .put(&format!("/v1/admin/accounts/{user_id}/roles"))
            .add_header("x-admin-key", self.admin_key_header())
            .json(&json!({ "roles": roles }))
            .await
            .assert_status_ok();
    }

    /// Register a fresh user holding the admin role.
    pub async fn staff(&self) -> UserId {
        let staff = UserId::generate();
        self.register(staff, &format!("staff-{staff}")).await;
        self.grant(staff, &["admin"]).await;
        staff
    }

    /// Register and fund a fresh buyer.
    pub async fn buyer(&self, username: &str, balance_cents: i64) -> UserId {
        let buyer = UserId::generate();
        self.register(buyer, username).await;
        if balance_cents > 0 {
            self.fund(buyer, balance_cents).await;
        }
        buyer
    }

    /// Add goods to the catalog and return its id.
    pub async fn add_goods(&self, staff: UserId, name: &str, price_cents: i64, stock: u32) -> String {
        let response = self
            .server
            .post("/v1/goods")
            .add_header("authorization", self.auth_header_for(staff))
            .json(&json!({
                "name": name,
                "kind": "medicine",
                "price_cents": price_cents,
                "stock": stock
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        body["id"].as_str().expect("goods id").to_string()
    }

    /// Open a purchase with the given lines and return its id.
    pub async fn open_purchase(&self, buyer: UserId, lines: &[(&str, i64)]) -> String {
        let response = self
            .server
            .post("/v1/purchases")
            .add_header("authorization", self.auth_header_for(buyer))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        let purchase_id = body["id"].as_str().expect("purchase id").to_string();

        for (goods_id, quantity) in lines {
            self.server
                .post(&format!("/v1/purchases/{purchase_id}/lines"))
                .add_header("authorization", self.auth_header_for(buyer))
                .json(&json!({ "goods_id": goods_id, "quantity": quantity }))
                .await
                .assert_status(axum::http::StatusCode::CREATED);
        }
        purchase_id
    }

    /// Set a user's loyalty points as staff.
    pub async fn set_bonuses(&self, staff: UserId, user_id: UserId, bonuses: i64) {
        self.server
            .put(&format!("/v1/loyalty-cards/{user_id}/bonuses"))
            .add_header("authorization", self.auth_header_for(staff))
            .json(&json!({ "bonuses": bonuses }))
            .await
            .assert_status_ok();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
