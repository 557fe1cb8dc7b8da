//! Column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Accounts, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Unique index: lowercased username -> `user_id`.
    pub const USERNAMES: &str = "usernames";

    /// Loyalty cards, keyed by the holder's `user_id`.
    pub const LOYALTY_CARDS: &str = "loyalty_cards";

    /// Goods, keyed by `goods_id`.
    pub const GOODS: &str = "goods";

    /// Unique index: lowercased goods name -> `goods_id`.
    pub const GOODS_NAMES: &str = "goods_names";

    /// Promotions, keyed by `promotion_id`.
    pub const PROMOTIONS: &str = "promotions";

    /// Index: `goods_id || promotion_id`, empty value.
    pub const PROMOTIONS_BY_GOODS: &str = "promotions_by_goods";

    /// Reviews, keyed by `review_id` (ULID).
    pub const REVIEWS: &str = "reviews";

    /// Unique index: `goods_id || author` -> `review_id`.
    pub const REVIEWS_BY_GOODS: &str = "reviews_by_goods";

    /// Purchases, keyed by `purchase_id` (ULID).
    pub const PURCHASES: &str = "purchases";

    /// Index: `user_id || purchase_id`, empty value.
    pub const PURCHASES_BY_USER: &str = "purchases_by_user";

    /// Purchase lines, keyed by `purchase_id || goods_id`.
    /// Guarded by the row lock of their purchase.
    pub const PURCHASE_LINES: &str = "purchase_lines";

    /// Balance transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: `user_id || transaction_id`, empty value.
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::USERNAMES,
        cf::LOYALTY_CARDS,
        cf::GOODS,
        cf::GOODS_NAMES,
        cf::PROMOTIONS,
        cf::PROMOTIONS_BY_GOODS,
        cf::REVIEWS,
        cf::REVIEWS_BY_GOODS,
        cf::PURCHASES,
        cf::PURCHASES_BY_USER,
        cf::PURCHASE_LINES,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
    ]
}
