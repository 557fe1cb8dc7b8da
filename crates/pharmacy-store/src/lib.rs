//! `RocksDB` storage layer for the pharmacy storefront.
//!
//! Records are CBOR-encoded, one column family per record type plus index
//! families (see [`schema::cf`]).
//!
//! # Transactions
//!
//! The database is opened as a pessimistic `TransactionDB`. Every
//! read-check-write sequence on shared rows runs inside one transaction that
//! takes row locks with `get_for_update` before validating. Locks are taken
//! in a fixed order (purchase, account, loyalty card, goods by id) so
//! settlements that share no goods never wait on each other, and two
//! settlements racing for the same goods serialize: the second one
//! re-validates stock after the first commits. Lock timeouts are retried a
//! few times; a settlement that still cannot commit fails with
//! `SettlementFailed` and leaves nothing applied.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use pharmacy_core::{Account, UserId};
//! use pharmacy_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/pharmacy-db").unwrap();
//!
//! let now = Utc::now();
//! let account = Account::new(UserId::generate(), "alice", now).unwrap();
//! let card = store.create_account(&account, now).unwrap();
//! assert_eq!(card.bonuses, 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use pharmacy_core::{
    Account, Actor, BalanceTransaction, CardStatus, Goods, GoodsFilter, GoodsId, GoodsUpdate,
    LoyaltyCard, Promotion, PromotionId, Purchase, PurchaseId, PurchaseLine, Review, ReviewId, Role,
    SettlementPolicy, SettlementQuote, UserId,
};

/// Outcome of a committed settlement.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// The purchase, now paid.
    pub purchase: Purchase,
    /// Amounts that were moved.
    pub quote: SettlementQuote,
    /// Buyer balance after the debit.
    pub balance_after_cents: i64,
    /// Loyalty points left on the card.
    pub bonuses_after: i64,
    /// Ledger entry for the cash part.
    pub transaction: BalanceTransaction,
}

/// The storage trait defining all database operations.
///
/// Rule violations come back as `StoreError::Domain`.
pub trait Store: Send + Sync {
    // =========================================================================
    // Accounts and Balance
    // =========================================================================

    /// Create an account together with its loyalty card.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the user already has an account or the username is taken.
    fn create_account(&self, account: &Account, now: DateTime<Utc>) -> Result<LoyaltyCard>;

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Replace an account's staff roles.
    ///
    /// # Errors
    ///
    /// `NotFound` if the account doesn't exist.
    fn set_roles(&self, user_id: &UserId, roles: Vec<Role>, now: DateTime<Utc>) -> Result<Account>;

    /// Credit the balance and record the top-up, atomically.
    ///
    /// # Errors
    ///
    /// `NotFound` if the account doesn't exist, `InvalidAmount` for a
    /// non-positive amount.
    fn credit_balance(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<BalanceTransaction>;

    /// List balance transactions for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<BalanceTransaction>>;

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Insert new goods.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the name is taken.
    fn create_goods(&self, goods: &Goods) -> Result<()>;

    /// Get goods by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_goods(&self, goods_id: &GoodsId) -> Result<Option<Goods>>;

    /// Apply a partial update to goods.
    ///
    /// # Errors
    ///
    /// `NotFound`, `AlreadyExists` on a name clash, or a validation error.
    fn update_goods(&self, goods_id: &GoodsId, update: GoodsUpdate, now: DateTime<Utc>) -> Result<Goods>;

    /// Delete goods with its promotions and reviews.
    ///
    /// # Errors
    ///
    /// `NotFound` if the goods doesn't exist.
    fn delete_goods(&self, goods_id: &GoodsId) -> Result<()>;

    /// List goods matching a filter, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_goods(&self, filter: &GoodsFilter) -> Result<Vec<Goods>>;

    // =========================================================================
    // Promotions
    // =========================================================================

    /// Insert a promotion.
    ///
    /// # Errors
    ///
    /// `NotFound` if the goods doesn't exist, `ActivePromotionExists` if
    /// another promotion for it is running at `now`.
    fn create_promotion(&self, promotion: &Promotion, now: DateTime<Utc>) -> Result<()>;

    /// Get a promotion by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_promotion(&self, promotion_id: &PromotionId) -> Result<Option<Promotion>>;

    /// Change a promotion's percentage or expiry.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidPromotion` or `ActivePromotionExists`.
    fn update_promotion(
        &self,
        promotion_id: &PromotionId,
        percentage: Option<u8>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Promotion>;

    /// Delete a promotion.
    ///
    /// # Errors
    ///
    /// `NotFound` if the promotion doesn't exist.
    fn delete_promotion(&self, promotion_id: &PromotionId) -> Result<()>;

    /// All promotions of a goods, expired ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_promotions(&self, goods_id: &GoodsId) -> Result<Vec<Promotion>>;

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// `NotFound` if the goods doesn't exist, `DuplicateReview` if the author
    /// already reviewed it.
    fn create_review(&self, review: &Review) -> Result<()>;

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_review(&self, review_id: &ReviewId) -> Result<Option<Review>>;

    /// Edit a review. Author only.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` or a validation error.
    fn update_review(
        &self,
        review_id: &ReviewId,
        editor: UserId,
        text: Option<String>,
        grade_hundredths: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Review>;

    /// Delete a review. Author or moderator.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    fn delete_review(&self, review_id: &ReviewId, actor: &Actor) -> Result<()>;

    /// Reviews of a goods, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_reviews(&self, goods_id: &GoodsId) -> Result<Vec<Review>>;

    // =========================================================================
    // Loyalty Cards
    // =========================================================================

    /// Get a user's loyalty card.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_loyalty_card(&self, user_id: &UserId) -> Result<Option<LoyaltyCard>>;

    /// Overwrite a card's bonus balance.
    ///
    /// # Errors
    ///
    /// `NotFound` or `InvalidAmount`.
    fn set_card_bonuses(&self, user_id: &UserId, bonuses: i64, now: DateTime<Utc>) -> Result<LoyaltyCard>;

    /// Block or unblock a card.
    ///
    /// # Errors
    ///
    /// `NotFound` if the card doesn't exist.
    fn set_card_status(
        &self,
        user_id: &UserId,
        status: CardStatus,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyCard>;

    // =========================================================================
    // Purchases
    // =========================================================================

    /// Insert a new open purchase.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_purchase(&self, purchase: &Purchase) -> Result<()>;

    /// Get a purchase by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<Purchase>>;

    /// List a user's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_purchases_by_user(&self, user_id: &UserId, limit: usize, offset: usize) -> Result<Vec<Purchase>>;

    /// Delete an open purchase and its lines. Owner only.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` or `AlreadyPaid`.
    fn delete_purchase(&self, purchase_id: &PurchaseId, caller: UserId) -> Result<()>;

    /// Lines of a purchase, ordered by goods id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_lines(&self, purchase_id: &PurchaseId) -> Result<Vec<PurchaseLine>>;

    /// Add a goods to an open purchase.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, `AlreadyPaid`, `InvalidQuantity`,
    /// `InsufficientStock` or `DuplicateLine`.
    fn add_line(
        &self,
        purchase_id: &PurchaseId,
        caller: UserId,
        goods_id: &GoodsId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<PurchaseLine>;

    /// Change the quantity of a line.
    ///
    /// # Errors
    ///
    /// Same as [`Store::add_line`], with `NotFound` for a missing line.
    fn update_line(
        &self,
        purchase_id: &PurchaseId,
        caller: UserId,
        goods_id: &GoodsId,
        quantity: i64,
    ) -> Result<PurchaseLine>;

    /// Remove a line from an open purchase.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` or `AlreadyPaid`.
    fn remove_line(&self, purchase_id: &PurchaseId, caller: UserId, goods_id: &GoodsId) -> Result<()>;

    /// Pay for a purchase with balance and bonus points.
    ///
    /// Stock, balance, card and purchase change together or not at all.
    ///
    /// # Errors
    ///
    /// Any settlement rule violation, or `SettlementFailed` if the
    /// transaction could not be committed.
    fn settle_purchase(
        &self,
        purchase_id: &PurchaseId,
        caller: UserId,
        bonus_points: i64,
        now: DateTime<Utc>,
        policy: &SettlementPolicy,
    ) -> Result<Settlement>;

    /// Mark a paid purchase as handed over.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, `NotYetPaid` or `AlreadyReceived`.
    fn mark_received(&self, purchase_id: &PurchaseId, actor: &Actor, now: DateTime<Utc>) -> Result<Purchase>;
}
