//! Domain error types.
//!
//! Every variant is recoverable by the caller. None of them is raised after a
//! settlement has started writing; validation always runs first.

use serde::Serialize;

use crate::ids::{GoodsId, IdError};

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, CommerceError>;

/// One goods that cannot cover the quantity requested of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortage {
    /// The goods that is short.
    pub goods_id: GoodsId,
    /// Its catalog name.
    pub name: String,
    /// Quantity requested by the purchase line.
    pub requested: u32,
    /// Quantity currently in stock.
    pub available: u32,
}

/// Errors raised by storefront rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommerceError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record ("purchase", "goods", ...).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The caller does not own the record or lacks the required role.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Why access was refused.
        reason: String,
    },

    /// The record being created already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Kind of record.
        entity: &'static str,
        /// The conflicting key.
        id: String,
    },

    /// The purchase has already been paid.
    #[error("purchase has already been paid")]
    AlreadyPaid,

    /// The purchase has already been handed over.
    #[error("purchase has already been received")]
    AlreadyReceived,

    /// The purchase has not been paid yet.
    #[error("purchase has not been paid yet")]
    NotYetPaid,

    /// The buyer's balance does not cover the cash due.
    #[error("insufficient funds: balance={balance_cents}, required={required_cents}")]
    InsufficientFunds {
        /// Current balance in cents.
        balance_cents: i64,
        /// Cash due in cents.
        required_cents: i64,
    },

    /// The loyalty card holds fewer points than requested.
    #[error("insufficient bonuses: available={available}, requested={requested}")]
    InsufficientBonuses {
        /// Points on the card.
        available: i64,
        /// Points requested.
        requested: i64,
    },

    /// The requested points are worth more than the spend cap allows.
    #[error("bonus spend cap exceeded: requested={requested_cents}, cap={cap_cents}")]
    BonusCapExceeded {
        /// Value of the requested points in cents.
        requested_cents: i64,
        /// Largest redeemable value in cents.
        cap_cents: i64,
    },

    /// One or more goods cannot cover the requested quantity.
    #[error("insufficient stock for {} goods", goods.len())]
    InsufficientStock {
        /// Every short goods in the purchase.
        goods: Vec<StockShortage>,
    },

    /// A line quantity is zero or negative.
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    /// A negative number of bonus points was requested.
    #[error("bonus points must not be negative, got {0}")]
    NegativeBonus(i64),

    /// The loyalty card is blocked and cannot redeem points.
    #[error("loyalty card is blocked")]
    LoyaltyCardBlocked,

    /// The purchase has no lines.
    #[error("purchase has no goods")]
    EmptyPurchase,

    /// The goods is already a line of this purchase.
    #[error("goods {0} is already in the purchase")]
    DuplicateLine(GoodsId),

    /// A price is negative.
    #[error("invalid price: {0}")]
    InvalidPrice(i64),

    /// A promotion is malformed.
    #[error("invalid promotion: {0}")]
    InvalidPromotion(String),

    /// Another promotion for the same goods is still running.
    #[error("goods {goods_id} already has an active promotion")]
    ActivePromotionExists {
        /// The promoted goods.
        goods_id: GoodsId,
    },

    /// A review grade is outside 0.00 to 5.00.
    #[error("grade must be between 0 and 500 hundredths, got {0}")]
    InvalidGrade(i64),

    /// The author already reviewed this goods.
    #[error("review already exists for goods {goods_id}")]
    DuplicateReview {
        /// The reviewed goods.
        goods_id: GoodsId,
    },

    /// A monetary amount or point count is out of range.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A required field is missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The settlement could not be committed; nothing was applied.
    #[error("settlement failed: {reason}")]
    SettlementFailed {
        /// Infrastructure cause.
        reason: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl CommerceError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a `Forbidden` error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }
}
