//! Effective unit prices.
//!
//! All money is held as integer cents. A discounted unit price is rounded
//! half-up to whole cents exactly once, when it is computed. Line totals and
//! the subtotal are then exact integer sums, so the final aggregate needs no
//! further rounding and the result does not depend on line order.

use chrono::{DateTime, Utc};

use crate::catalog::Goods;
use crate::promotion::Promotion;

/// Apply a percentage discount, rounding half-up to whole cents.
///
/// `price_cents` must be non-negative. The product is taken in `i128`, and
/// the result never exceeds `price_cents`.
#[must_use]
pub fn discounted_cents(price_cents: i64, percentage: u8) -> i64 {
    let kept = 100 - i128::from(percentage.min(100));
    let discounted = (i128::from(price_cents) * kept + 50) / 100;
    i64::try_from(discounted).unwrap_or(price_cents)
}

/// The promotion that prices `goods_id` at `at`: the running one with the
/// latest expiry.
#[must_use]
pub fn active_promotion<'a>(
    goods: &Goods,
    promotions: &'a [Promotion],
    at: DateTime<Utc>,
) -> Option<&'a Promotion> {
    promotions
        .iter()
        .filter(|p| p.goods_id == goods.id && p.is_active(at))
        .max_by_key(|p| p.expires_at)
}

/// Unit price of `goods` at `at`, after the best running promotion.
#[must_use]
pub fn effective_price(goods: &Goods, promotions: &[Promotion], at: DateTime<Utc>) -> i64 {
    active_promotion(goods, promotions, at).map_or(goods.price_cents, |promotion| {
        discounted_cents(goods.price_cents, promotion.percentage)
    })
}

/// Render cents as a decimal string with two fractional digits.
#[must_use]
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
