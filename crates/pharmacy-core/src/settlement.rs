//! Settlement rules.
//!
//! [`quote`] runs every check that decides whether a purchase can be paid and
//! computes the amounts to move. It is pure: the store calls it on records
//! read under transaction locks and then applies the quote atomically.
//!
//! # Policy
//!
//! - At most 25 % of the subtotal may be paid with bonus points.
//! - One point is worth [`BONUS_POINT_VALUE_CENTS`] cent.
//! - The cap is compared exactly in integer arithmetic
//!   (`value * 100 <= subtotal * 25`); no rounding is involved.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::Account;
use crate::catalog::Goods;
use crate::error::{CommerceError, Result};
use crate::loyalty::{LoyaltyCard, BONUS_POINT_VALUE_CENTS};
use crate::pricing::effective_price;
use crate::promotion::Promotion;
use crate::purchase::{Purchase, PurchaseLine};
use crate::{GoodsId, PurchaseId, UserId};

/// Share of the subtotal payable with bonus points, in percent.
pub const BONUS_CAP_PERCENT: i64 = 25;

/// Settlement constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementPolicy {
    /// Share of the subtotal payable with points, in percent.
    pub bonus_cap_percent: i64,
    /// Value of one point in cents.
    pub bonus_point_value_cents: i64,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            bonus_cap_percent: BONUS_CAP_PERCENT,
            bonus_point_value_cents: BONUS_POINT_VALUE_CENTS,
        }
    }
}

impl SettlementPolicy {
    /// Value of `points` in cents.
    #[must_use]
    pub fn bonus_value_cents(&self, points: i64) -> i64 {
        points.saturating_mul(self.bonus_point_value_cents)
    }

    /// Largest whole-cent value redeemable against `subtotal_cents`.
    #[must_use]
    pub fn cap_cents(&self, subtotal_cents: i64) -> i64 {
        subtotal_cents.saturating_mul(self.bonus_cap_percent) / 100
    }

    /// Whether `value_cents` fits under the cap for `subtotal_cents`.
    #[must_use]
    pub fn within_cap(&self, value_cents: i64, subtotal_cents: i64) -> bool {
        value_cents.saturating_mul(100) <= subtotal_cents.saturating_mul(self.bonus_cap_percent)
    }
}

/// Everything settlement looks at, as read inside the transaction.
#[derive(Debug, Clone, Copy)]
pub struct SettlementRequest<'a> {
    /// The purchase being paid.
    pub purchase: &'a Purchase,
    /// Who is paying.
    pub caller: UserId,
    /// The purchase lines.
    pub lines: &'a [PurchaseLine],
    /// Every goods referenced by `lines`.
    pub goods: &'a [Goods],
    /// Promotions of those goods, expired ones included.
    pub promotions: &'a [Promotion],
    /// The caller's loyalty card.
    pub card: &'a LoyaltyCard,
    /// The caller's account.
    pub account: &'a Account,
    /// Points the caller wants to redeem.
    pub bonus_points: i64,
    /// Pricing instant.
    pub now: DateTime<Utc>,
}

/// One priced line of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    /// Goods ID.
    pub goods_id: GoodsId,
    /// Goods name at settlement.
    pub name: String,
    /// Units.
    pub quantity: u32,
    /// Effective unit price in cents.
    pub unit_price_cents: i64,
    /// `quantity * unit_price_cents`.
    pub line_total_cents: i64,
}

/// The amounts a settlement moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementQuote {
    /// Purchase ID.
    pub purchase_id: PurchaseId,
    /// Priced lines.
    pub lines: Vec<PricedLine>,
    /// Authoritative total in cents.
    pub subtotal_cents: i64,
    /// Points redeemed.
    pub bonus_points: i64,
    /// Value of the redeemed points in cents.
    pub bonus_value_cents: i64,
    /// Debited from the balance.
    pub cash_due_cents: i64,
}

/// Validate a settlement and compute its amounts.
///
/// Checks run in this order and the first failure is returned:
/// ownership, not already paid, non-negative points, non-empty purchase,
/// pricing (every goods must exist), card can redeem, spend cap, funds, stock.
/// Stock shortages are collected across all lines before failing.
///
/// # Errors
///
/// Any [`CommerceError`] rule violation. Nothing is mutated.
pub fn quote(request: &SettlementRequest<'_>, policy: &SettlementPolicy) -> Result<SettlementQuote> {
    let purchase = request.purchase;
    purchase.ensure_owner(request.caller)?;
    if purchase.paid {
        return Err(CommerceError::AlreadyPaid);
    }
    if request.bonus_points < 0 {
        return Err(CommerceError::NegativeBonus(request.bonus_points));
    }
    if request.lines.is_empty() {
        return Err(CommerceError::EmptyPurchase);
    }

    let mut lines = Vec::with_capacity(request.lines.len());
    let mut subtotal_cents: i64 = 0;
    for line in request.lines {
        let goods = find_goods(request.goods, line.goods_id)?;
        let unit_price_cents = effective_price(goods, request.promotions, request.now);
        let line_total_cents = unit_price_cents
            .checked_mul(i64::from(line.quantity))
            .ok_or_else(|| CommerceError::InvalidAmount("line total overflow".into()))?;
        subtotal_cents = subtotal_cents
            .checked_add(line_total_cents)
            .ok_or_else(|| CommerceError::InvalidAmount("subtotal overflow".into()))?;
        lines.push(PricedLine {
            goods_id: goods.id,
            name: goods.name.clone(),
            quantity: line.quantity,
            unit_price_cents,
            line_total_cents,
        });
    }

    request.card.check_redeemable(request.bonus_points)?;

    let bonus_value_cents = policy.bonus_value_cents(request.bonus_points);
    if !policy.within_cap(bonus_value_cents, subtotal_cents) {
        return Err(CommerceError::BonusCapExceeded {
            requested_cents: bonus_value_cents,
            cap_cents: policy.cap_cents(subtotal_cents),
        });
    }

    let cash_due_cents = subtotal_cents - bonus_value_cents;
    if !request.account.has_sufficient_funds(cash_due_cents) {
        return Err(CommerceError::InsufficientFunds {
            balance_cents: request.account.balance_cents,
            required_cents: cash_due_cents,
        });
    }

    let mut shortages = Vec::new();
    for line in request.lines {
        let goods = find_goods(request.goods, line.goods_id)?;
        if let Some(shortage) = goods.shortage(line.quantity) {
            shortages.push(shortage);
        }
    }
    if !shortages.is_empty() {
        return Err(CommerceError::InsufficientStock { goods: shortages });
    }

    Ok(SettlementQuote {
        purchase_id: purchase.id,
        lines,
        subtotal_cents,
        bonus_points: request.bonus_points,
        bonus_value_cents,
        cash_due_cents,
    })
}

fn find_goods(goods: &[Goods], goods_id: GoodsId) -> Result<&Goods> {
    goods
        .iter()
        .find(|g| g.id == goods_id)
        .ok_or_else(|| CommerceError::not_found("goods", goods_id))
}
