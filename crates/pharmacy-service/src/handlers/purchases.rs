//! Purchase, line and checkout handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{
    format_cents, GoodsId, PricedLine, Purchase, PurchaseId, PurchaseLine, PurchaseStatus,
};
use pharmacy_store::{Settlement, Store, StoreError};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{write, PageQuery};
use crate::state::AppState;

/// Purchase response.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    /// The purchase record.
    #[serde(flatten)]
    pub purchase: Purchase,
    /// Lifecycle state.
    pub status: PurchaseStatus,
}

impl From<Purchase> for PurchaseResponse {
    fn from(purchase: Purchase) -> Self {
        Self {
            status: purchase.status(),
            purchase,
        }
    }
}

/// Purchase with its lines.
#[derive(Debug, Serialize)]
pub struct PurchaseDetailResponse {
    /// The purchase.
    #[serde(flatten)]
    pub purchase: PurchaseResponse,
    /// Its lines.
    pub lines: Vec<PurchaseLine>,
}

fn load_purchase(state: &AppState, purchase_id: &PurchaseId) -> Result<Purchase, ApiError> {
    state
        .store
        .get_purchase(purchase_id)?
        .ok_or_else(|| ApiError::NotFound(format!("purchase not found: {purchase_id}")))
}

/// Open an empty purchase for the caller.
pub async fn create_purchase(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    state
        .store
        .get_account(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    let purchase = Purchase::open(auth.user_id, Utc::now());
    let stored = purchase.clone();
    write(&state, move |store| store.create_purchase(&stored)).await?;

    tracing::info!(user_id = %auth.user_id, purchase_id = %purchase.id, "Purchase opened");

    Ok((StatusCode::CREATED, Json(PurchaseResponse::from(purchase))))
}

/// The caller's purchases, newest first.
pub async fn list_purchases(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<PurchaseResponse>>, ApiError> {
    let purchases =
        state
            .store
            .list_purchases_by_user(&auth.user_id, query.clamped_limit(), query.offset)?;
    Ok(Json(purchases.into_iter().map(PurchaseResponse::from).collect()))
}

/// Get a purchase with its lines. Owner or fulfilment staff.
pub async fn get_purchase(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(purchase_id): Path<PurchaseId>,
) -> Result<Json<PurchaseDetailResponse>, ApiError> {
    let purchase = load_purchase(&state, &purchase_id)?;
    purchase.ensure_visible_to(&auth.actor(&state)?)?;
    let lines = state.store.list_lines(&purchase_id)?;

    Ok(Json(PurchaseDetailResponse {
        purchase: PurchaseResponse::from(purchase),
        lines,
    }))
}

/// Delete an open purchase.
pub async fn delete_purchase(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(purchase_id): Path<PurchaseId>,
) -> Result<StatusCode, ApiError> {
    let caller = auth.user_id;
    write(&state, move |store| store.delete_purchase(&purchase_id, caller)).await?;

    tracing::info!(user_id = %auth.user_id, purchase_id = %purchase_id, "Purchase deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Lines
// ============================================================================

/// Lines of a purchase.
pub async fn list_lines(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(purchase_id): Path<PurchaseId>,
) -> Result<Json<Vec<PurchaseLine>>, ApiError> {
    load_purchase(&state, &purchase_id)?.ensure_visible_to(&auth.actor(&state)?)?;
    Ok(Json(state.store.list_lines(&purchase_id)?))
}

/// Add line request.
#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    /// Goods to buy.
    pub goods_id: GoodsId,
    /// Units to buy.
    pub quantity: i64,
}

/// Add goods to an open purchase.
pub async fn add_line(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(purchase_id): Path<PurchaseId>,
    Json(body): Json<AddLineRequest>,
) -> Result<(StatusCode, Json<PurchaseLine>), ApiError> {
    let (caller, goods_id, quantity) = (auth.user_id, body.goods_id, body.quantity);
    let line = write(&state, move |store| {
        store.add_line(&purchase_id, caller, &goods_id, quantity, Utc::now())
    })
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        purchase_id = %purchase_id,
        goods_id = %body.goods_id,
        quantity = line.quantity,
        "Line added"
    );

    Ok((StatusCode::CREATED, Json(line)))
}

/// Update line request.
#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    /// New quantity.
    pub quantity: i64,
}

/// Change the quantity of a line.
pub async fn update_line(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((purchase_id, goods_id)): Path<(PurchaseId, GoodsId)>,
    Json(body): Json<UpdateLineRequest>,
) -> Result<Json<PurchaseLine>, ApiError> {
    let caller = auth.user_id;
    let line = write(&state, move |store| {
        store.update_line(&purchase_id, caller, &goods_id, body.quantity)
    })
    .await?;
    Ok(Json(line))
}

/// Remove a line.
pub async fn remove_line(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((purchase_id, goods_id)): Path<(PurchaseId, GoodsId)>,
) -> Result<StatusCode, ApiError> {
    let caller = auth.user_id;
    write(&state, move |store| store.remove_line(&purchase_id, caller, &goods_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Checkout
// ============================================================================

/// Buy request.
#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    /// Loyalty points to redeem.
    #[serde(default)]
    pub bonus_points: i64,
}

/// Checkout summary.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Purchase ID.
    pub purchase_id: PurchaseId,
    /// Lifecycle state (always `paid`).
    pub status: PurchaseStatus,
    /// Sum of line totals in cents.
    pub subtotal_cents: i64,
    /// Subtotal formatted as a decimal amount.
    pub subtotal_formatted: String,
    /// Points redeemed.
    pub bonus_points_used: i64,
    /// Value of the redeemed points in cents.
    pub bonus_value_cents: i64,
    /// Cash taken from the balance in cents.
    pub cash_paid_cents: i64,
    /// Balance left after payment.
    pub balance_after_cents: i64,
    /// Points left on the card.
    pub bonuses_left: i64,
    /// Settlement time.
    pub paid_at: Option<DateTime<Utc>>,
    /// Per-line unit and line prices.
    pub lines: Vec<PricedLine>,
}

impl From<Settlement> for CheckoutResponse {
    fn from(settlement: Settlement) -> Self {
        let quote = settlement.quote;
        Self {
            purchase_id: settlement.purchase.id,
            status: settlement.purchase.status(),
            subtotal_cents: quote.subtotal_cents,
            subtotal_formatted: format_cents(quote.subtotal_cents),
            bonus_points_used: quote.bonus_points,
            bonus_value_cents: quote.bonus_value_cents,
            cash_paid_cents: quote.cash_due_cents,
            balance_after_cents: settlement.balance_after_cents,
            bonuses_left: settlement.bonuses_after,
            paid_at: settlement.purchase.paid_at,
            lines: quote.lines,
        }
    }
}

/// Pay for a purchase with balance and loyalty points.
///
/// The settlement runs on the blocking pool because it may wait on row locks
/// held by a concurrent checkout of the same goods.
pub async fn buy(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(purchase_id): Path<PurchaseId>,
    Json(body): Json<BuyRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let store = Arc::clone(&state.store);
    let policy = state.policy;
    let caller = auth.user_id;
    let bonus_points = body.bonus_points;

    let outcome = tokio::task::spawn_blocking(move || {
        store.settle_purchase(&purchase_id, caller, bonus_points, Utc::now(), &policy)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("settlement task failed: {e}")))?;

    match outcome {
        Ok(settlement) => Ok((StatusCode::CREATED, Json(CheckoutResponse::from(settlement)))),
        Err(StoreError::Domain(err)) => {
            tracing::warn!(
                user_id = %caller,
                purchase_id = %purchase_id,
                bonus_points,
                error = %err,
                "Checkout rejected"
            );
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Mark a paid purchase as handed over. Fulfilment staff only.
pub async fn mark_received(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(purchase_id): Path<PurchaseId>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let actor = auth.actor(&state)?;
    let purchase = write(&state, move |store| {
        store.mark_received(&purchase_id, &actor, Utc::now())
    })
    .await?;

    tracing::info!(user_id = %auth.user_id, purchase_id = %purchase_id, "Purchase received");

    Ok(Json(PurchaseResponse::from(purchase)))
}
