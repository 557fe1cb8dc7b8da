//! API handlers.

pub mod accounts;
pub mod balance;
pub mod goods;
pub mod health;
pub mod loyalty;
pub mod promotions;
pub mod purchases;
pub mod reviews;

use std::sync::Arc;

use serde::Deserialize;

use pharmacy_store::{RocksStore, StoreError};

use crate::error::ApiError;
use crate::state::AppState;

/// Run a store write on the blocking pool.
///
/// Writes take row locks and may wait on a concurrent transaction for up to
/// the lock timeout on every attempt.
pub(crate) async fn write<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&RocksStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
        .map_err(ApiError::from)
}

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Maximum number of items to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

impl PageQuery {
    /// The limit clamped to the allowed maximum.
    #[must_use]
    pub fn clamped_limit(&self) -> usize {
        self.limit.min(100)
    }
}

fn default_limit() -> usize {
    50
}
