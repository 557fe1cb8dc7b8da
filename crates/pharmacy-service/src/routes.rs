//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, balance, goods, health, loyalty, promotions, purchases, reviews};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent checkout requests. Each one may hold row locks on
/// goods while it waits, so they get a tighter limit than reads.
const CHECKOUT_MAX_CONCURRENT_REQUESTS: usize = 32;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts and balance (JWT auth)
/// - `POST /v1/accounts` - Create the caller's account and loyalty card
/// - `GET /v1/accounts/me` - Get the caller's account
/// - `GET /v1/balance` - Current balance and bonus points
/// - `GET /v1/balance/transactions` - Balance history
///
/// ## Admin (admin key)
/// - `POST /v1/admin/balance/credit` - Credit a balance
/// - `PUT /v1/admin/accounts/:user_id/roles` - Replace staff roles
///
/// ## Catalog (JWT auth, staff roles for writes)
/// - `GET|POST /v1/goods`, `GET|PUT|DELETE /v1/goods/:goods_id`
/// - `GET|POST /v1/goods/:goods_id/promotions`, `PUT|DELETE /v1/promotions/:promotion_id`
/// - `GET|POST /v1/goods/:goods_id/reviews`, `PUT|DELETE /v1/reviews/:review_id`
///
/// ## Loyalty cards (JWT auth)
/// - `GET /v1/loyalty-cards/:user_id`
/// - `PUT /v1/loyalty-cards/:user_id/bonuses`
/// - `POST /v1/loyalty-cards/:user_id/block`, `POST /v1/loyalty-cards/:user_id/unblock`
///
/// ## Purchases (JWT auth)
/// - `GET|POST /v1/purchases`, `GET|DELETE /v1/purchases/:purchase_id`
/// - `GET|POST /v1/purchases/:purchase_id/lines`
/// - `PUT|DELETE /v1/purchases/:purchase_id/lines/:goods_id`
/// - `POST /v1/purchases/:purchase_id/buy` - Checkout (rate-limited)
/// - `POST /v1/purchases/:purchase_id/received` - Hand-over by staff
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let checkout_routes = Router::new()
        .route("/purchases/:purchase_id/buy", post(purchases::buy))
        .route("/purchases/:purchase_id/received", post(purchases::mark_received))
        .layer(ConcurrencyLimitLayer::new(CHECKOUT_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Accounts and balance
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/me", get(accounts::get_account))
        .route("/balance", get(balance::get_balance))
        .route("/balance/transactions", get(balance::list_transactions))
        // Admin
        .route("/admin/balance/credit", post(balance::admin_credit_balance))
        .route("/admin/accounts/:user_id/roles", put(accounts::admin_set_roles))
        // Catalog
        .route("/goods", get(goods::list_goods).post(goods::create_goods))
        .route(
            "/goods/:goods_id",
            get(goods::get_goods)
                .put(goods::update_goods)
                .delete(goods::delete_goods),
        )
        .route(
            "/goods/:goods_id/promotions",
            get(promotions::list_promotions).post(promotions::create_promotion),
        )
        .route(
            "/promotions/:promotion_id",
            put(promotions::update_promotion).delete(promotions::delete_promotion),
        )
        .route(
            "/goods/:goods_id/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/reviews/:review_id",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        // Loyalty cards
        .route("/loyalty-cards/:user_id", get(loyalty::get_card))
        .route("/loyalty-cards/:user_id/bonuses", put(loyalty::set_bonuses))
        .route("/loyalty-cards/:user_id/block", post(loyalty::block_card))
        .route("/loyalty-cards/:user_id/unblock", post(loyalty::unblock_card))
        // Purchases
        .route(
            "/purchases",
            get(purchases::list_purchases).post(purchases::create_purchase),
        )
        .route(
            "/purchases/:purchase_id",
            get(purchases::get_purchase).delete(purchases::delete_purchase),
        )
        .route(
            "/purchases/:purchase_id/lines",
            get(purchases::list_lines).post(purchases::add_line),
        )
        .route(
            "/purchases/:purchase_id/lines/:goods_id",
            put(purchases::update_line).delete(purchases::remove_line),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        // Checkout routes (with their own concurrency limit)
        .merge(checkout_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
