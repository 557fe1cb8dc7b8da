//! Review handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use pharmacy_core::{GoodsId, Review, ReviewId};
use pharmacy_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::write;
use crate::state::AppState;

/// Create review request.
#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    /// Review text.
    pub text: String,
    /// Grade in hundredths (0 to 500).
    pub grade_hundredths: i64,
}

/// Update review request.
#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    /// New text.
    pub text: Option<String>,
    /// New grade in hundredths.
    pub grade_hundredths: Option<i64>,
}

/// Reviews of a goods, newest first.
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(goods_id): Path<GoodsId>,
) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(state.store.list_reviews(&goods_id)?))
}

/// Review a goods.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(goods_id): Path<GoodsId>,
    Json(body): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let review = Review::new(goods_id, auth.user_id, body.text, body.grade_hundredths, Utc::now())?;
    let stored = review.clone();
    write(&state, move |store| store.create_review(&stored)).await?;

    tracing::info!(user_id = %auth.user_id, goods_id = %goods_id, review_id = %review.id, "Review created");

    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit the caller's own review.
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(review_id): Path<ReviewId>,
    Json(body): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    let editor = auth.user_id;
    let review = write(&state, move |store| {
        store.update_review(&review_id, editor, body.text, body.grade_hundredths, Utc::now())
    })
    .await?;
    Ok(Json(review))
}

/// Delete a review as its author or a moderator.
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(review_id): Path<ReviewId>,
) -> Result<StatusCode, ApiError> {
    let actor = auth.actor(&state)?;
    write(&state, move |store| store.delete_review(&review_id, &actor)).await?;

    tracing::info!(user_id = %auth.user_id, review_id = %review_id, "Review deleted");

    Ok(StatusCode::NO_CONTENT)
}
