//! Key encoding for the column families.
//!
//! Identifiers are stored as their raw 16 bytes. Composite index keys are the
//! concatenation of two identifiers, so a prefix scan on the first one lists
//! its children and ULID suffixes come out in creation order.

use pharmacy_core::{GoodsId, PromotionId, PurchaseId, ReviewId, TransactionId, UserId};

/// Length of an encoded identifier.
pub const ID_LEN: usize = 16;

/// Account key.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Username index key. Usernames are unique case-insensitively.
#[must_use]
pub fn username_key(username: &str) -> Vec<u8> {
    username.trim().to_lowercase().into_bytes()
}

/// Loyalty card key (one card per user).
#[must_use]
pub fn card_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Goods key.
#[must_use]
pub fn goods_key(goods_id: &GoodsId) -> Vec<u8> {
    goods_id.as_bytes().to_vec()
}

/// Goods name index key. Names are unique case-insensitively.
#[must_use]
pub fn goods_name_key(name: &str) -> Vec<u8> {
    name.trim().to_lowercase().into_bytes()
}

/// Promotion key.
#[must_use]
pub fn promotion_key(promotion_id: &PromotionId) -> Vec<u8> {
    promotion_id.as_bytes().to_vec()
}

/// Promotion-by-goods index key: `goods_id || promotion_id`.
#[must_use]
pub fn goods_promotion_key(goods_id: &GoodsId, promotion_id: &PromotionId) -> Vec<u8> {
    concat(goods_id.as_bytes(), promotion_id.as_bytes())
}

/// Review key.
#[must_use]
pub fn review_key(review_id: &ReviewId) -> Vec<u8> {
    review_id.to_bytes().to_vec()
}

/// Review uniqueness index key: `goods_id || author`.
#[must_use]
pub fn goods_review_key(goods_id: &GoodsId, author: &UserId) -> Vec<u8> {
    concat(goods_id.as_bytes(), author.as_bytes())
}

/// Purchase key.
#[must_use]
pub fn purchase_key(purchase_id: &PurchaseId) -> Vec<u8> {
    purchase_id.to_bytes().to_vec()
}

/// Purchase-by-user index key: `user_id || purchase_id`.
#[must_use]
pub fn user_purchase_key(user_id: &UserId, purchase_id: &PurchaseId) -> Vec<u8> {
    concat(user_id.as_bytes(), &purchase_id.to_bytes())
}

/// Purchase line key: `purchase_id || goods_id`.
#[must_use]
pub fn line_key(purchase_id: &PurchaseId, goods_id: &GoodsId) -> Vec<u8> {
    concat(&purchase_id.to_bytes(), goods_id.as_bytes())
}

/// Transaction key.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Transaction-by-user index key: `user_id || transaction_id`.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    concat(user_id.as_bytes(), &transaction_id.to_bytes())
}

/// The second identifier of a composite key, or `None` if the key is malformed.
#[must_use]
pub fn suffix_id(key: &[u8]) -> Option<[u8; ID_LEN]> {
    key.get(ID_LEN..ID_LEN * 2)?.try_into().ok()
}

/// Decode a bare 16-byte identifier value.
#[must_use]
pub fn id_bytes(value: &[u8]) -> Option<[u8; ID_LEN]> {
    value.try_into().ok()
}

fn concat(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(first.len() + second.len());
    key.extend_from_slice(first);
    key.extend_from_slice(second);
    key
}
