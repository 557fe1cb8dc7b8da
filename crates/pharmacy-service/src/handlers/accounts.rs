//! Account management handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use pharmacy_core::{format_cents, Account, LoyaltyCard, Role, UserId};
use pharmacy_store::Store;

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::handlers::write;
use crate::state::AppState;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// User ID.
    pub user_id: String,
    /// Unique username.
    pub username: String,
    /// Staff roles.
    pub roles: Vec<Role>,
    /// Current balance in cents.
    pub balance_cents: i64,
    /// Balance formatted as a decimal amount.
    pub balance_formatted: String,
    /// Lifetime topped up in cents.
    pub lifetime_topped_up_cents: i64,
    /// Lifetime spent on purchases in cents.
    pub lifetime_spent_cents: i64,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            user_id: account.user_id.to_string(),
            username: account.username.clone(),
            roles: account.roles.clone(),
            balance_cents: account.balance_cents,
            balance_formatted: format_cents(account.balance_cents),
            lifetime_topped_up_cents: account.lifetime_topped_up_cents,
            lifetime_spent_cents: account.lifetime_spent_cents,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Create account request.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Unique username.
    pub username: String,
}

/// Create account response.
#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    /// The new account.
    #[serde(flatten)]
    pub account: AccountResponse,
    /// The loyalty card issued with it.
    pub loyalty_card: LoyaltyCard,
}

/// Register the caller's account together with a loyalty card.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<CreateAccountResponse>), ApiError> {
    let now = Utc::now();
    let account = Account::new(auth.user_id, &body.username, now)?;
    let stored = account.clone();
    let loyalty_card = write(&state, move |store| store.create_account(&stored, now)).await?;

    tracing::info!(user_id = %auth.user_id, username = %account.username, "Account created");

    Ok((
        StatusCode::CREATED,
        Json(CreateAccountResponse {
            account: AccountResponse::from(&account),
            loyalty_card,
        }),
    ))
}

/// Get the current user's account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .store
        .get_account(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    Ok(Json(AccountResponse::from(&account)))
}

/// Set roles request.
#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    /// The complete new set of roles.
    pub roles: Vec<Role>,
}

/// Admin endpoint to replace an account's staff roles.
pub async fn admin_set_roles(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(user_id): Path<UserId>,
    Json(body): Json<SetRolesRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = write(&state, move |store| store.set_roles(&user_id, body.roles, Utc::now())).await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        roles = ?account.roles,
        "Roles updated"
    );

    Ok(Json(AccountResponse::from(&account)))
}
