//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, MultiThreaded, Options,
    Transaction, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use pharmacy_core::{
    promotion, settlement, Account, Actor, BalanceTransaction, CardStatus, CommerceError, Goods,
    GoodsFilter, GoodsId, GoodsUpdate, LoyaltyCard, Promotion, PromotionId, Purchase, PurchaseId,
    PurchaseLine, Review, ReviewId, Role, SettlementPolicy, SettlementQuote, SettlementRequest,
    TransactionId, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{Settlement, Store};

/// How many times a transaction is attempted before a lock conflict is
/// reported to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How long a transaction waits for a row lock, in milliseconds.
const LOCK_TIMEOUT_MS: i64 = 2_000;

type Txn<'db> = Transaction<'db, TransactionDB<MultiThreaded>>;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<TransactionDB<MultiThreaded>>,
    max_attempts: u32,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(LOCK_TIMEOUT_MS);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db: TransactionDB<MultiThreaded> =
            TransactionDB::open_cf_descriptors(&opts, &txn_db_opts, path, cf_descriptors)
                .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Set how many times a conflicting transaction is attempted.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    // =========================================================================
    // Plain reads
    // =========================================================================

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(cf_name)?;
        let mut entries = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Suffix ids of an index prefix, newest first, paginated.
    fn page_suffix_ids(
        &self,
        cf_name: &str,
        prefix: &[u8],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<[u8; keys::ID_LEN]>> {
        self.scan_prefix(cf_name, prefix)?
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .map(|(key, _)| keys::suffix_id(key).ok_or_else(malformed_key))
            .collect()
    }

    fn promotions_of(&self, goods_id: &GoodsId) -> Result<Vec<Promotion>> {
        let mut promotions = Vec::new();
        for (key, _) in self.scan_prefix(cf::PROMOTIONS_BY_GOODS, goods_id.as_bytes())? {
            let id = PromotionId::from_bytes(keys::suffix_id(&key).ok_or_else(malformed_key)?);
            if let Some(promotion) = self.get(cf::PROMOTIONS, &keys::promotion_key(&id))? {
                promotions.push(promotion);
            }
        }
        Ok(promotions)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Run `f` inside a pessimistic transaction and commit it.
    ///
    /// If `f` fails the transaction is dropped, which rolls back every staged
    /// write. Lock conflicts restart `f` from scratch on a fresh transaction.
    fn in_transaction<T>(
        &self,
        op: &'static str,
        mut f: impl FnMut(&Txn<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_deadlock_detect(true);

        let mut attempt = 1;
        loop {
            let txn = self.db.transaction_opt(&WriteOptions::default(), &txn_opts);
            let outcome = match f(&txn) {
                Ok(value) => txn.commit().map(|()| value).map_err(StoreError::from),
                Err(err) => Err(err),
            };

            match outcome {
                Err(StoreError::Conflict(reason)) if attempt < self.max_attempts => {
                    tracing::debug!(op, attempt, %reason, "Transaction conflict, retrying");
                    attempt += 1;
                }
                Err(StoreError::Conflict(reason)) => {
                    tracing::warn!(op, attempt, %reason, "Transaction conflict, giving up");
                    return Err(StoreError::Conflict(reason));
                }
                other => return other,
            }
        }
    }

    /// Read a row and hold an exclusive lock on it until the transaction ends.
    fn lock<T: DeserializeOwned>(&self, txn: &Txn<'_>, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        self.lock_raw(txn, cf_name, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn lock_raw(&self, txn: &Txn<'_>, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        Ok(txn.get_for_update_cf(&cf, key, true)?)
    }

    fn stage<T: Serialize>(&self, txn: &Txn<'_>, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        self.stage_raw(txn, cf_name, key, &Self::serialize(value)?)
    }

    fn stage_raw(&self, txn: &Txn<'_>, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        txn.put_cf(&cf, key, value)?;
        Ok(())
    }

    fn unstage(&self, txn: &Txn<'_>, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        txn.delete_cf(&cf, key)?;
        Ok(())
    }

    fn lock_purchase(&self, txn: &Txn<'_>, purchase_id: &PurchaseId) -> Result<Purchase> {
        self.lock(txn, cf::PURCHASES, &keys::purchase_key(purchase_id))?
            .ok_or_else(|| CommerceError::not_found("purchase", purchase_id).into())
    }

    fn lock_card(&self, txn: &Txn<'_>, user_id: &UserId) -> Result<LoyaltyCard> {
        self.lock(txn, cf::LOYALTY_CARDS, &keys::card_key(user_id))?
            .ok_or_else(|| CommerceError::not_found("loyalty card", user_id).into())
    }

    fn require_goods(&self, goods_id: &GoodsId) -> Result<Goods> {
        self.get(cf::GOODS, &keys::goods_key(goods_id))?
            .ok_or_else(|| CommerceError::not_found("goods", goods_id).into())
    }

    /// Stage every write of a validated settlement.
    ///
    /// The balance is debited first and stock last. A failure at any step
    /// returns `SettlementFailed`; the caller drops the transaction, so the
    /// writes staged before the failure are discarded with it.
    #[allow(clippy::too_many_arguments)]
    fn write_settlement(
        &self,
        txn: &Txn<'_>,
        purchase: &mut Purchase,
        account: &mut Account,
        card: &mut LoyaltyCard,
        goods: &mut [Goods],
        quote: SettlementQuote,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let fault = |err: CommerceError| {
            StoreError::from(CommerceError::SettlementFailed {
                reason: err.to_string(),
            })
        };

        let balance_after_cents = account.debit(quote.cash_due_cents, now).map_err(fault)?;
        self.stage(txn, cf::ACCOUNTS, &keys::account_key(&account.user_id), &*account)?;

        let transaction = BalanceTransaction::purchase_debit(
            account.user_id,
            purchase.id,
            quote.cash_due_cents,
            balance_after_cents,
            now,
        );
        self.stage(txn, cf::TRANSACTIONS, &keys::transaction_key(&transaction.id), &transaction)?;
        self.stage_raw(
            txn,
            cf::TRANSACTIONS_BY_USER,
            &keys::user_transaction_key(&account.user_id, &transaction.id),
            &[],
        )?;

        let bonuses_after = card.redeem(quote.bonus_points, now).map_err(fault)?;
        self.stage(txn, cf::LOYALTY_CARDS, &keys::card_key(&card.user_id), &*card)?;

        for line in &quote.lines {
            let item = goods
                .iter_mut()
                .find(|g| g.id == line.goods_id)
                .ok_or_else(|| fault(CommerceError::not_found("goods", line.goods_id)))?;
            item.take_stock(line.quantity, now).map_err(fault)?;
            self.stage(txn, cf::GOODS, &keys::goods_key(&item.id), &*item)?;
        }

        purchase.mark_paid(&quote, now);
        self.stage(txn, cf::PURCHASES, &keys::purchase_key(&purchase.id), &*purchase)?;

        Ok(Settlement {
            purchase: purchase.clone(),
            quote,
            balance_after_cents,
            bonuses_after,
            transaction,
        })
    }
}

fn malformed_key() -> StoreError {
    StoreError::Database("malformed index key".into())
}

impl Store for RocksStore {
    // =========================================================================
    // Accounts and Balance
    // =========================================================================

    fn create_account(&self, account: &Account, now: DateTime<Utc>) -> Result<LoyaltyCard> {
        let account_key = keys::account_key(&account.user_id);
        let name_key = keys::username_key(&account.username);

        self.in_transaction("create_account", |txn| {
            if self.lock_raw(txn, cf::ACCOUNTS, &account_key)?.is_some() {
                return Err(CommerceError::AlreadyExists {
                    entity: "account",
                    id: account.user_id.to_string(),
                }
                .into());
            }
            if self.lock_raw(txn, cf::USERNAMES, &name_key)?.is_some() {
                return Err(CommerceError::AlreadyExists {
                    entity: "username",
                    id: account.username.clone(),
                }
                .into());
            }

            let card = LoyaltyCard::issue(account.user_id, now);
            self.stage(txn, cf::ACCOUNTS, &account_key, account)?;
            self.stage_raw(txn, cf::USERNAMES, &name_key, account.user_id.as_bytes())?;
            self.stage(txn, cf::LOYALTY_CARDS, &keys::card_key(&account.user_id), &card)?;
            Ok(card)
        })
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        self.get(cf::ACCOUNTS, &keys::account_key(user_id))
    }

    fn set_roles(&self, user_id: &UserId, roles: Vec<Role>, now: DateTime<Utc>) -> Result<Account> {
        let key = keys::account_key(user_id);
        let mut roles = roles;
        roles.sort_by_key(|role| *role as u8);
        roles.dedup();

        self.in_transaction("set_roles", |txn| {
            let mut account: Account = self
                .lock(txn, cf::ACCOUNTS, &key)?
                .ok_or_else(|| CommerceError::not_found("account", user_id))?;
            account.roles.clone_from(&roles);
            account.updated_at = now;
            self.stage(txn, cf::ACCOUNTS, &key, &account)?;
            Ok(account)
        })
    }

    fn credit_balance(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<BalanceTransaction> {
        let key = keys::account_key(user_id);

        let transaction = self.in_transaction("credit_balance", |txn| {
            let mut account: Account = self
                .lock(txn, cf::ACCOUNTS, &key)?
                .ok_or_else(|| CommerceError::not_found("account", user_id))?;
            let balance_after_cents = account.credit(amount_cents, now)?;
            let transaction = BalanceTransaction::top_up(
                *user_id,
                amount_cents,
                balance_after_cents,
                description.clone(),
                now,
            );

            self.stage(txn, cf::ACCOUNTS, &key, &account)?;
            self.stage(txn, cf::TRANSACTIONS, &keys::transaction_key(&transaction.id), &transaction)?;
            self.stage_raw(
                txn,
                cf::TRANSACTIONS_BY_USER,
                &keys::user_transaction_key(user_id, &transaction.id),
                &[],
            )?;
            Ok(transaction)
        })?;

        tracing::info!(
            user_id = %user_id,
            amount_cents,
            balance_after_cents = transaction.balance_after_cents,
            "Balance credited"
        );
        Ok(transaction)
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<BalanceTransaction>> {
        let mut transactions = Vec::new();
        for bytes in self.page_suffix_ids(cf::TRANSACTIONS_BY_USER, user_id.as_bytes(), limit, offset)? {
            let id = TransactionId::from_bytes(bytes);
            if let Some(tx) = self.get(cf::TRANSACTIONS, &keys::transaction_key(&id))? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    fn create_goods(&self, goods: &Goods) -> Result<()> {
        let name_key = keys::goods_name_key(&goods.name);

        self.in_transaction("create_goods", |txn| {
            if self.lock_raw(txn, cf::GOODS_NAMES, &name_key)?.is_some() {
                return Err(CommerceError::AlreadyExists {
                    entity: "goods",
                    id: goods.name.clone(),
                }
                .into());
            }
            self.stage(txn, cf::GOODS, &keys::goods_key(&goods.id), goods)?;
            self.stage_raw(txn, cf::GOODS_NAMES, &name_key, goods.id.as_bytes())
        })
    }

    fn get_goods(&self, goods_id: &GoodsId) -> Result<Option<Goods>> {
        self.get(cf::GOODS, &keys::goods_key(goods_id))
    }

    fn update_goods(&self, goods_id: &GoodsId, update: GoodsUpdate, now: DateTime<Utc>) -> Result<Goods> {
        let key = keys::goods_key(goods_id);

        self.in_transaction("update_goods", |txn| {
            let mut goods: Goods = self
                .lock(txn, cf::GOODS, &key)?
                .ok_or_else(|| CommerceError::not_found("goods", goods_id))?;
            let old_name_key = keys::goods_name_key(&goods.name);
            goods.apply(update.clone(), now)?;
            let new_name_key = keys::goods_name_key(&goods.name);

            if new_name_key != old_name_key {
                if let Some(owner) = self.lock_raw(txn, cf::GOODS_NAMES, &new_name_key)? {
                    if owner.as_slice() != goods_id.as_bytes() {
                        return Err(CommerceError::AlreadyExists {
                            entity: "goods",
                            id: goods.name.clone(),
                        }
                        .into());
                    }
                }
                self.unstage(txn, cf::GOODS_NAMES, &old_name_key)?;
                self.stage_raw(txn, cf::GOODS_NAMES, &new_name_key, goods_id.as_bytes())?;
            }

            self.stage(txn, cf::GOODS, &key, &goods)?;
            Ok(goods)
        })
    }

    fn delete_goods(&self, goods_id: &GoodsId) -> Result<()> {
        let key = keys::goods_key(goods_id);

        self.in_transaction("delete_goods", |txn| {
            let goods: Goods = self
                .lock(txn, cf::GOODS, &key)?
                .ok_or_else(|| CommerceError::not_found("goods", goods_id))?;

            self.unstage(txn, cf::GOODS, &key)?;
            self.unstage(txn, cf::GOODS_NAMES, &keys::goods_name_key(&goods.name))?;

            for (index_key, _) in self.scan_prefix(cf::PROMOTIONS_BY_GOODS, goods_id.as_bytes())? {
                let id = PromotionId::from_bytes(keys::suffix_id(&index_key).ok_or_else(malformed_key)?);
                self.unstage(txn, cf::PROMOTIONS, &keys::promotion_key(&id))?;
                self.unstage(txn, cf::PROMOTIONS_BY_GOODS, &index_key)?;
            }

            for (index_key, value) in self.scan_prefix(cf::REVIEWS_BY_GOODS, goods_id.as_bytes())? {
                let id = ReviewId::from_bytes(keys::id_bytes(&value).ok_or_else(malformed_key)?);
                self.unstage(txn, cf::REVIEWS, &keys::review_key(&id))?;
                self.unstage(txn, cf::REVIEWS_BY_GOODS, &index_key)?;
            }
            Ok(())
        })
    }

    fn list_goods(&self, filter: &GoodsFilter) -> Result<Vec<Goods>> {
        let cf = self.cf(cf::GOODS)?;
        let mut goods = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            let record: Goods = Self::deserialize(&value)?;
            if filter.matches(&record) {
                goods.push(record);
            }
        }
        goods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(goods)
    }

    // =========================================================================
    // Promotions
    // =========================================================================

    fn create_promotion(&self, promotion: &Promotion, now: DateTime<Utc>) -> Result<()> {
        self.in_transaction("create_promotion", |txn| {
            // The goods row lock serializes promotion changes per goods.
            let _goods: Goods = self
                .lock(txn, cf::GOODS, &keys::goods_key(&promotion.goods_id))?
                .ok_or_else(|| CommerceError::not_found("goods", promotion.goods_id))?;
            let existing = self.promotions_of(&promotion.goods_id)?;
            promotion::ensure_no_active_rival(promotion, &existing, now)?;

            self.stage(txn, cf::PROMOTIONS, &keys::promotion_key(&promotion.id), promotion)?;
            self.stage_raw(
                txn,
                cf::PROMOTIONS_BY_GOODS,
                &keys::goods_promotion_key(&promotion.goods_id, &promotion.id),
                &[],
            )
        })
    }

    fn get_promotion(&self, promotion_id: &PromotionId) -> Result<Option<Promotion>> {
        self.get(cf::PROMOTIONS, &keys::promotion_key(promotion_id))
    }

    fn update_promotion(
        &self,
        promotion_id: &PromotionId,
        percentage: Option<u8>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Promotion> {
        let key = keys::promotion_key(promotion_id);
        let goods_id = self
            .get_promotion(promotion_id)?
            .ok_or_else(|| CommerceError::not_found("promotion", promotion_id))?
            .goods_id;

        self.in_transaction("update_promotion", |txn| {
            self.lock_raw(txn, cf::GOODS, &keys::goods_key(&goods_id))?;
            let mut promotion: Promotion = self
                .lock(txn, cf::PROMOTIONS, &key)?
                .ok_or_else(|| CommerceError::not_found("promotion", promotion_id))?;
            promotion.revise(percentage, expires_at)?;
            let existing = self.promotions_of(&goods_id)?;
            promotion::ensure_no_active_rival(&promotion, &existing, now)?;

            self.stage(txn, cf::PROMOTIONS, &key, &promotion)?;
            Ok(promotion)
        })
    }

    fn delete_promotion(&self, promotion_id: &PromotionId) -> Result<()> {
        let key = keys::promotion_key(promotion_id);

        self.in_transaction("delete_promotion", |txn| {
            let promotion: Promotion = self
                .lock(txn, cf::PROMOTIONS, &key)?
                .ok_or_else(|| CommerceError::not_found("promotion", promotion_id))?;
            self.unstage(txn, cf::PROMOTIONS, &key)?;
            self.unstage(
                txn,
                cf::PROMOTIONS_BY_GOODS,
                &keys::goods_promotion_key(&promotion.goods_id, promotion_id),
            )
        })
    }

    fn list_promotions(&self, goods_id: &GoodsId) -> Result<Vec<Promotion>> {
        let mut promotions = self.promotions_of(goods_id)?;
        promotions.sort_by(|a, b| b.expires_at.cmp(&a.expires_at));
        Ok(promotions)
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    fn create_review(&self, review: &Review) -> Result<()> {
        let index_key = keys::goods_review_key(&review.goods_id, &review.author);

        self.in_transaction("create_review", |txn| {
            self.require_goods(&review.goods_id)?;
            if self.lock_raw(txn, cf::REVIEWS_BY_GOODS, &index_key)?.is_some() {
                return Err(CommerceError::DuplicateReview {
                    goods_id: review.goods_id,
                }
                .into());
            }
            self.stage(txn, cf::REVIEWS, &keys::review_key(&review.id), review)?;
            self.stage_raw(txn, cf::REVIEWS_BY_GOODS, &index_key, &review.id.to_bytes())
        })
    }

    fn get_review(&self, review_id: &ReviewId) -> Result<Option<Review>> {
        self.get(cf::REVIEWS, &keys::review_key(review_id))
    }

    fn update_review(
        &self,
        review_id: &ReviewId,
        editor: UserId,
        text: Option<String>,
        grade_hundredths: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Review> {
        let key = keys::review_key(review_id);

        self.in_transaction("update_review", |txn| {
            let mut review: Review = self
                .lock(txn, cf::REVIEWS, &key)?
                .ok_or_else(|| CommerceError::not_found("review", review_id))?;
            review.edit(editor, text.clone(), grade_hundredths, now)?;
            self.stage(txn, cf::REVIEWS, &key, &review)?;
            Ok(review)
        })
    }

    fn delete_review(&self, review_id: &ReviewId, actor: &Actor) -> Result<()> {
        let key = keys::review_key(review_id);

        self.in_transaction("delete_review", |txn| {
            let review: Review = self
                .lock(txn, cf::REVIEWS, &key)?
                .ok_or_else(|| CommerceError::not_found("review", review_id))?;
            review.ensure_deletable_by(actor)?;
            self.unstage(txn, cf::REVIEWS, &key)?;
            self.unstage(
                txn,
                cf::REVIEWS_BY_GOODS,
                &keys::goods_review_key(&review.goods_id, &review.author),
            )
        })
    }

    fn list_reviews(&self, goods_id: &GoodsId) -> Result<Vec<Review>> {
        let mut reviews: Vec<Review> = Vec::new();
        for (_, value) in self.scan_prefix(cf::REVIEWS_BY_GOODS, goods_id.as_bytes())? {
            let id = ReviewId::from_bytes(keys::id_bytes(&value).ok_or_else(malformed_key)?);
            if let Some(review) = self.get_review(&id)? {
                reviews.push(review);
            }
        }
        reviews.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(reviews)
    }

    // =========================================================================
    // Loyalty Cards
    // =========================================================================

    fn get_loyalty_card(&self, user_id: &UserId) -> Result<Option<LoyaltyCard>> {
        self.get(cf::LOYALTY_CARDS, &keys::card_key(user_id))
    }

    fn set_card_bonuses(&self, user_id: &UserId, bonuses: i64, now: DateTime<Utc>) -> Result<LoyaltyCard> {
        self.in_transaction("set_card_bonuses", |txn| {
            let mut card = self.lock_card(txn, user_id)?;
            card.set_bonuses(bonuses, now)?;
            self.stage(txn, cf::LOYALTY_CARDS, &keys::card_key(user_id), &card)?;
            Ok(card)
        })
    }

    fn set_card_status(
        &self,
        user_id: &UserId,
        status: CardStatus,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyCard> {
        self.in_transaction("set_card_status", |txn| {
            let mut card = self.lock_card(txn, user_id)?;
            card.set_status(status, now);
            self.stage(txn, cf::LOYALTY_CARDS, &keys::card_key(user_id), &card)?;
            Ok(card)
        })
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    fn create_purchase(&self, purchase: &Purchase) -> Result<()> {
        self.in_transaction("create_purchase", |txn| {
            self.stage(txn, cf::PURCHASES, &keys::purchase_key(&purchase.id), purchase)?;
            self.stage_raw(
                txn,
                cf::PURCHASES_BY_USER,
                &keys::user_purchase_key(&purchase.owner, &purchase.id),
                &[],
            )
        })
    }

    fn get_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<Purchase>> {
        self.get(cf::PURCHASES, &keys::purchase_key(purchase_id))
    }

    fn list_purchases_by_user(&self, user_id: &UserId, limit: usize, offset: usize) -> Result<Vec<Purchase>> {
        let mut purchases = Vec::new();
        for bytes in self.page_suffix_ids(cf::PURCHASES_BY_USER, user_id.as_bytes(), limit, offset)? {
            if let Some(purchase) = self.get_purchase(&PurchaseId::from_bytes(bytes))? {
                purchases.push(purchase);
            }
        }
        Ok(purchases)
    }

    fn delete_purchase(&self, purchase_id: &PurchaseId, caller: UserId) -> Result<()> {
        self.in_transaction("delete_purchase", |txn| {
            let purchase = self.lock_purchase(txn, purchase_id)?;
            purchase.ensure_deletable(caller)?;

            for (line_key, _) in self.scan_prefix(cf::PURCHASE_LINES, &keys::purchase_key(purchase_id))? {
                self.unstage(txn, cf::PURCHASE_LINES, &line_key)?;
            }
            self.unstage(txn, cf::PURCHASES, &keys::purchase_key(purchase_id))?;
            self.unstage(
                txn,
                cf::PURCHASES_BY_USER,
                &keys::user_purchase_key(&purchase.owner, purchase_id),
            )
        })
    }

    fn list_lines(&self, purchase_id: &PurchaseId) -> Result<Vec<PurchaseLine>> {
        self.scan_prefix(cf::PURCHASE_LINES, &keys::purchase_key(purchase_id))?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    fn add_line(
        &self,
        purchase_id: &PurchaseId,
        caller: UserId,
        goods_id: &GoodsId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<PurchaseLine> {
        let line_key = keys::line_key(purchase_id, goods_id);

        self.in_transaction("add_line", |txn| {
            let purchase = self.lock_purchase(txn, purchase_id)?;
            purchase.ensure_editable(caller)?;

            let goods = self.require_goods(goods_id)?;
            let quantity = goods.check_quantity(quantity)?;
            if self.lock_raw(txn, cf::PURCHASE_LINES, &line_key)?.is_some() {
                return Err(CommerceError::DuplicateLine(*goods_id).into());
            }

            let line = PurchaseLine::new(*purchase_id, *goods_id, quantity, now);
            self.stage(txn, cf::PURCHASE_LINES, &line_key, &line)?;
            Ok(line)
        })
    }

    fn update_line(
        &self,
        purchase_id: &PurchaseId,
        caller: UserId,
        goods_id: &GoodsId,
        quantity: i64,
    ) -> Result<PurchaseLine> {
        let line_key = keys::line_key(purchase_id, goods_id);

        self.in_transaction("update_line", |txn| {
            let purchase = self.lock_purchase(txn, purchase_id)?;
            purchase.ensure_editable(caller)?;

            let mut line: PurchaseLine = self
                .lock(txn, cf::PURCHASE_LINES, &line_key)?
                .ok_or_else(|| CommerceError::not_found("purchase line", goods_id))?;
            let goods = self.require_goods(goods_id)?;
            line.quantity = goods.check_quantity(quantity)?;

            self.stage(txn, cf::PURCHASE_LINES, &line_key, &line)?;
            Ok(line)
        })
    }

    fn remove_line(&self, purchase_id: &PurchaseId, caller: UserId, goods_id: &GoodsId) -> Result<()> {
        let line_key = keys::line_key(purchase_id, goods_id);

        self.in_transaction("remove_line", |txn| {
            let purchase = self.lock_purchase(txn, purchase_id)?;
            purchase.ensure_editable(caller)?;

            if self.lock_raw(txn, cf::PURCHASE_LINES, &line_key)?.is_none() {
                return Err(CommerceError::not_found("purchase line", goods_id).into());
            }
            self.unstage(txn, cf::PURCHASE_LINES, &line_key)
        })
    }

    fn settle_purchase(
        &self,
        purchase_id: &PurchaseId,
        caller: UserId,
        bonus_points: i64,
        now: DateTime<Utc>,
        policy: &SettlementPolicy,
    ) -> Result<Settlement> {
        let outcome = self.in_transaction("settle_purchase", |txn| {
            let mut purchase = self.lock_purchase(txn, purchase_id)?;
            purchase.ensure_owner(caller)?;
            if purchase.paid {
                return Err(CommerceError::AlreadyPaid.into());
            }

            // Lines cannot change while the purchase row is locked.
            let lines = self.list_lines(purchase_id)?;
            let mut account: Account = self
                .lock(txn, cf::ACCOUNTS, &keys::account_key(&caller))?
                .ok_or_else(|| CommerceError::not_found("account", caller))?;
            let mut card = self.lock_card(txn, &caller)?;

            let mut goods_ids: Vec<GoodsId> = lines.iter().map(|line| line.goods_id).collect();
            goods_ids.sort_unstable();
            goods_ids.dedup();

            let mut goods = Vec::with_capacity(goods_ids.len());
            let mut promotions = Vec::new();
            for goods_id in &goods_ids {
                if let Some(record) = self.lock::<Goods>(txn, cf::GOODS, &keys::goods_key(goods_id))? {
                    promotions.extend(self.promotions_of(goods_id)?);
                    goods.push(record);
                }
            }

            let quote = settlement::quote(
                &SettlementRequest {
                    purchase: &purchase,
                    caller,
                    lines: &lines,
                    goods: &goods,
                    promotions: &promotions,
                    card: &card,
                    account: &account,
                    bonus_points,
                    now,
                },
                policy,
            )?;

            self.write_settlement(txn, &mut purchase, &mut account, &mut card, &mut goods, quote, now)
        });

        match outcome {
            Ok(settlement) => {
                tracing::info!(
                    purchase_id = %purchase_id,
                    user_id = %caller,
                    subtotal_cents = settlement.quote.subtotal_cents,
                    bonus_points = settlement.quote.bonus_points,
                    cash_due_cents = settlement.quote.cash_due_cents,
                    "Purchase settled"
                );
                Ok(settlement)
            }
            Err(StoreError::Conflict(reason) | StoreError::Database(reason)) => {
                tracing::error!(purchase_id = %purchase_id, %reason, "Settlement could not be committed");
                Err(CommerceError::SettlementFailed { reason }.into())
            }
            Err(err) => Err(err),
        }
    }

    fn mark_received(&self, purchase_id: &PurchaseId, actor: &Actor, now: DateTime<Utc>) -> Result<Purchase> {
        self.in_transaction("mark_received", |txn| {
            let mut purchase = self.lock_purchase(txn, purchase_id)?;
            purchase.mark_received(actor, now)?;
            self.stage(txn, cf::PURCHASES, &keys::purchase_key(purchase_id), &purchase)?;
            Ok(purchase)
        })
    }
}
