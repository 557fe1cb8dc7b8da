//! Catalog handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use pharmacy_core::pricing::active_promotion;
use pharmacy_core::{
    effective_price, format_cents, Capability, Goods, GoodsFilter, GoodsId, GoodsKind, GoodsUpdate,
    NewGoods, Promotion,
};
use pharmacy_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::write;
use crate::state::AppState;

/// Goods response, priced at the time of the request.
#[derive(Debug, Serialize)]
pub struct GoodsResponse {
    /// Goods ID.
    pub id: GoodsId,
    /// Unique name.
    pub name: String,
    /// Category.
    pub kind: GoodsKind,
    /// Description.
    pub info: String,
    /// List price in cents.
    pub price_cents: i64,
    /// Price after the running promotion, if any.
    pub effective_price_cents: i64,
    /// Effective price formatted as a decimal amount.
    pub effective_price_formatted: String,
    /// The running promotion.
    pub active_promotion: Option<Promotion>,
    /// Units in stock.
    pub stock: u32,
    /// Created timestamp.
    pub created_at: String,
    /// Updated timestamp.
    pub updated_at: String,
}

impl GoodsResponse {
    fn priced(goods: Goods, promotions: &[Promotion], now: DateTime<Utc>) -> Self {
        let effective = effective_price(&goods, promotions, now);
        Self {
            active_promotion: active_promotion(&goods, promotions, now).cloned(),
            effective_price_cents: effective,
            effective_price_formatted: format_cents(effective),
            created_at: goods.created_at.to_rfc3339(),
            updated_at: goods.updated_at.to_rfc3339(),
            id: goods.id,
            name: goods.name,
            kind: goods.kind,
            info: goods.info,
            price_cents: goods.price_cents,
            stock: goods.stock,
        }
    }
}

fn present(state: &AppState, goods: Goods) -> Result<GoodsResponse, ApiError> {
    let promotions = state.store.list_promotions(&goods.id)?;
    Ok(GoodsResponse::priced(goods, &promotions, Utc::now()))
}

/// List catalog goods matching the query filter.
pub async fn list_goods(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(filter): Query<GoodsFilter>,
) -> Result<Json<Vec<GoodsResponse>>, ApiError> {
    let goods = state.store.list_goods(&filter)?;
    let response = goods
        .into_iter()
        .map(|g| present(&state, g))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(response))
}

/// Get one goods.
pub async fn get_goods(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(goods_id): Path<GoodsId>,
) -> Result<Json<GoodsResponse>, ApiError> {
    let goods = state
        .store
        .get_goods(&goods_id)?
        .ok_or_else(|| ApiError::NotFound(format!("goods not found: {goods_id}")))?;
    Ok(Json(present(&state, goods)?))
}

/// Add goods to the catalog.
pub async fn create_goods(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<NewGoods>,
) -> Result<(StatusCode, Json<GoodsResponse>), ApiError> {
    auth.actor(&state)?.require(Capability::ManageCatalog)?;

    let goods = Goods::new(body, Utc::now())?;
    let stored = goods.clone();
    write(&state, move |store| store.create_goods(&stored)).await?;

    tracing::info!(user_id = %auth.user_id, goods_id = %goods.id, name = %goods.name, "Goods created");

    Ok((StatusCode::CREATED, Json(present(&state, goods)?)))
}

/// Update goods fields.
pub async fn update_goods(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(goods_id): Path<GoodsId>,
    Json(body): Json<GoodsUpdate>,
) -> Result<Json<GoodsResponse>, ApiError> {
    auth.actor(&state)?.require(Capability::ManageCatalog)?;

    let goods = write(&state, move |store| store.update_goods(&goods_id, body, Utc::now())).await?;

    tracing::info!(user_id = %auth.user_id, goods_id = %goods_id, "Goods updated");

    Ok(Json(present(&state, goods)?))
}

/// Remove goods together with its promotions and reviews.
pub async fn delete_goods(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(goods_id): Path<GoodsId>,
) -> Result<StatusCode, ApiError> {
    auth.actor(&state)?.require(Capability::ManageCatalog)?;

    write(&state, move |store| store.delete_goods(&goods_id)).await?;

    tracing::info!(user_id = %auth.user_id, goods_id = %goods_id, "Goods deleted");

    Ok(StatusCode::NO_CONTENT)
}
