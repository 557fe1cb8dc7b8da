//! Loyalty card handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use pharmacy_core::{Capability, CardStatus, CommerceError, LoyaltyCard, UserId};
use pharmacy_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::write;
use crate::state::AppState;

/// Get a card. Owner or loyalty staff.
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<LoyaltyCard>, ApiError> {
    if !auth.actor(&state)?.owns_or_can(user_id, Capability::ManageLoyalty) {
        return Err(CommerceError::forbidden("not your loyalty card").into());
    }

    let card = state
        .store
        .get_loyalty_card(&user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("loyalty card not found: {user_id}")))?;
    Ok(Json(card))
}

/// Set bonuses request.
#[derive(Debug, Deserialize)]
pub struct SetBonusesRequest {
    /// New point balance.
    pub bonuses: i64,
}

/// Overwrite a card's bonus balance.
pub async fn set_bonuses(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<UserId>,
    Json(body): Json<SetBonusesRequest>,
) -> Result<Json<LoyaltyCard>, ApiError> {
    auth.actor(&state)?.require(Capability::ManageLoyalty)?;

    let card = write(&state, move |store| {
        store.set_card_bonuses(&user_id, body.bonuses, Utc::now())
    })
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        card_owner = %user_id,
        bonuses = card.bonuses,
        "Loyalty bonuses set"
    );

    Ok(Json(card))
}

/// Block a card.
pub async fn block_card(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<LoyaltyCard>, ApiError> {
    change_status(&state, &auth, user_id, CardStatus::Blocked).await
}

/// Unblock a card.
pub async fn unblock_card(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<LoyaltyCard>, ApiError> {
    change_status(&state, &auth, user_id, CardStatus::Active).await
}

async fn change_status(
    state: &AppState,
    auth: &AuthUser,
    user_id: UserId,
    status: CardStatus,
) -> Result<Json<LoyaltyCard>, ApiError> {
    auth.actor(state)?.require(Capability::ManageLoyalty)?;

    let card = write(state, move |store| store.set_card_status(&user_id, status, Utc::now())).await?;

    tracing::info!(user_id = %auth.user_id, card_owner = %user_id, status = ?status, "Loyalty card status changed");

    Ok(Json(card))
}
