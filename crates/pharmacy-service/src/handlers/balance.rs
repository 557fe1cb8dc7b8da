//! Balance and transaction handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use pharmacy_core::{format_cents, BalanceTransaction, CommerceError, UserId};
use pharmacy_store::Store;

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::handlers::{write, PageQuery};
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Balance in cents.
    pub balance_cents: i64,
    /// Balance formatted as a decimal amount.
    pub balance_formatted: String,
    /// Loyalty points on the caller's card.
    pub bonuses: i64,
}

/// Get current balance and loyalty points.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = state
        .store
        .get_account(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    let bonuses = state
        .store
        .get_loyalty_card(&auth.user_id)?
        .map_or(0, |card| card.bonuses);

    Ok(Json(BalanceResponse {
        balance_cents: account.balance_cents,
        balance_formatted: format_cents(account.balance_cents),
        bonuses,
    }))
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Amount in cents (positive = credit, negative = debit).
    pub amount_cents: i64,
    /// Transaction kind.
    pub kind: String,
    /// Balance after this transaction.
    pub balance_after_cents: i64,
    /// Description.
    pub description: String,
    /// Extra context.
    pub metadata: serde_json::Value,
    /// Timestamp.
    pub created_at: String,
}

impl From<&BalanceTransaction> for TransactionResponse {
    fn from(tx: &BalanceTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount_cents: tx.amount_cents,
            kind: tx.kind.as_str().to_string(),
            balance_after_cents: tx.balance_after_cents,
            description: tx.description.clone(),
            metadata: tx.metadata.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List balance history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    state
        .store
        .get_account(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    // Fetch one more than requested to determine has_more
    let limit = query.clamped_limit();
    let transactions =
        state
            .store
            .list_transactions_by_user(&auth.user_id, limit + 1, query.offset)?;

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Admin credit request.
#[derive(Debug, Deserialize)]
pub struct AdminCreditRequest {
    /// User ID to credit.
    pub user_id: String,
    /// Amount in cents.
    pub amount_cents: i64,
    /// Reason for the credit.
    pub reason: String,
}

/// Admin credit response.
#[derive(Debug, Serialize)]
pub struct AdminCreditResponse {
    /// Balance after the credit.
    pub balance_cents: i64,
    /// The ledger entry.
    pub transaction: TransactionResponse,
}

/// Admin endpoint to credit a balance, e.g. after a confirmed gateway payment.
pub async fn admin_credit_balance(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<AdminCreditRequest>,
) -> Result<Json<AdminCreditResponse>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    let (min, max) = (state.config.top_up_min_cents, state.config.top_up_max_cents);
    if !(min..=max).contains(&body.amount_cents) {
        return Err(CommerceError::InvalidAmount(format!(
            "credit must be between {} and {}, got {}",
            format_cents(min),
            format_cents(max),
            format_cents(body.amount_cents)
        ))
        .into());
    }

    let (amount_cents, reason) = (body.amount_cents, body.reason.clone());
    let tx = write(&state, move |store| {
        store.credit_balance(&user_id, amount_cents, reason, Utc::now())
    })
    .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        amount_cents = %body.amount_cents,
        reason = %body.reason,
        new_balance = %tx.balance_after_cents,
        "Balance credited"
    );

    Ok(Json(AdminCreditResponse {
        balance_cents: tx.balance_after_cents,
        transaction: TransactionResponse::from(&tx),
    }))
}
