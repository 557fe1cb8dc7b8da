//! Core types and rules for the pharmacy storefront.
//!
//! - **Identifiers**: `UserId`, `GoodsId`, `PromotionId`, `CardId`,
//!   `PurchaseId`, `ReviewId`, `TransactionId`
//! - **Accounts**: `Account`, `Role`, `Capability`, `Actor`
//! - **Catalog**: `Goods`, `GoodsKind`, `GoodsFilter`, `Promotion`
//! - **Loyalty**: `LoyaltyCard`, `CardStatus`
//! - **Purchases**: `Purchase`, `PurchaseLine`, `PurchaseStatus`
//! - **Settlement**: `quote`, `SettlementPolicy`, `SettlementQuote`
//!
//! # Money
//!
//! All amounts are `i64` cents. Discounted unit prices are rounded half-up
//! once, when computed; everything after that is exact integer arithmetic.
//!
//! # Time
//!
//! Nothing in this crate reads the clock. Operations that depend on time take
//! `now` as an argument.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod balance;
pub mod catalog;
pub mod error;
pub mod ids;
pub mod loyalty;
pub mod pricing;
pub mod promotion;
pub mod purchase;
pub mod review;
pub mod settlement;

pub use account::{Account, Actor, Capability, Role};
pub use balance::{BalanceTransaction, TransactionKind};
pub use catalog::{Goods, GoodsFilter, GoodsKind, GoodsUpdate, NewGoods};
pub use error::{CommerceError, Result, StockShortage};
pub use ids::{CardId, GoodsId, IdError, PromotionId, PurchaseId, ReviewId, TransactionId, UserId};
pub use loyalty::{CardStatus, LoyaltyCard, BONUS_POINT_VALUE_CENTS};
pub use pricing::{effective_price, format_cents};
pub use promotion::Promotion;
pub use purchase::{Purchase, PurchaseLine, PurchaseStatus};
pub use review::Review;
pub use settlement::{
    quote, PricedLine, SettlementPolicy, SettlementQuote, SettlementRequest, BONUS_CAP_PERCENT,
};
