//! Promotion handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use pharmacy_core::{Capability, CommerceError, GoodsId, Promotion, PromotionId};
use pharmacy_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::write;
use crate::state::AppState;

/// Create promotion request.
#[derive(Debug, Deserialize)]
pub struct CreatePromotionRequest {
    /// Discount percentage.
    pub percentage: i64,
    /// When the promotion stops applying.
    pub expires_at: DateTime<Utc>,
}

/// Update promotion request. Absent fields are left untouched.
#[derive(Debug, Deserialize)]
pub struct UpdatePromotionRequest {
    /// New discount percentage.
    pub percentage: Option<i64>,
    /// New expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

fn percentage(raw: i64) -> Result<u8, CommerceError> {
    u8::try_from(raw)
        .map_err(|_| CommerceError::InvalidPromotion(format!("percentage out of range: {raw}")))
}

/// All promotions of a goods, latest expiry first.
pub async fn list_promotions(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(goods_id): Path<GoodsId>,
) -> Result<Json<Vec<Promotion>>, ApiError> {
    Ok(Json(state.store.list_promotions(&goods_id)?))
}

/// Start a promotion on a goods.
pub async fn create_promotion(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(goods_id): Path<GoodsId>,
    Json(body): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<Promotion>), ApiError> {
    auth.actor(&state)?.require(Capability::ManageCatalog)?;

    let now = Utc::now();
    let promotion = Promotion::new(goods_id, percentage(body.percentage)?, body.expires_at, now)?;
    let stored = promotion.clone();
    write(&state, move |store| store.create_promotion(&stored, now)).await?;

    tracing::info!(
        user_id = %auth.user_id,
        goods_id = %goods_id,
        promotion_id = %promotion.id,
        percentage = promotion.percentage,
        "Promotion created"
    );

    Ok((StatusCode::CREATED, Json(promotion)))
}

/// Change a promotion.
pub async fn update_promotion(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(promotion_id): Path<PromotionId>,
    Json(body): Json<UpdatePromotionRequest>,
) -> Result<Json<Promotion>, ApiError> {
    auth.actor(&state)?.require(Capability::ManageCatalog)?;

    let percentage = body.percentage.map(percentage).transpose()?;
    let expires_at = body.expires_at;
    let promotion = write(&state, move |store| {
        store.update_promotion(&promotion_id, percentage, expires_at, Utc::now())
    })
    .await?;

    tracing::info!(user_id = %auth.user_id, promotion_id = %promotion_id, "Promotion updated");

    Ok(Json(promotion))
}

/// Delete a promotion.
pub async fn delete_promotion(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(promotion_id): Path<PromotionId>,
) -> Result<StatusCode, ApiError> {
    auth.actor(&state)?.require(Capability::ManageCatalog)?;

    write(&state, move |store| store.delete_promotion(&promotion_id)).await?;

    tracing::info!(user_id = %auth.user_id, promotion_id = %promotion_id, "Promotion deleted");

    Ok(StatusCode::NO_CONTENT)
}
