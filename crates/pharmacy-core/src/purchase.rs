//! Purchases and their lines.
//!
//! A purchase moves `Open -> Paid -> Received`. An open purchase can also be
//! deleted. No transition leads back to `Open`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{Actor, Capability};
use crate::error::{CommerceError, Result};
use crate::settlement::SettlementQuote;
use crate::{GoodsId, PurchaseId, UserId};

/// Lifecycle state, derived from the paid and received flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Lines may still change.
    Open,
    /// Settled; immutable.
    Paid,
    /// Handed over to the buyer.
    Received,
}

/// A purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Purchase ID.
    pub id: PurchaseId,
    /// The buyer.
    pub owner: UserId,
    /// When the purchase was opened.
    pub created_at: DateTime<Utc>,
    /// Set by settlement.
    pub paid: bool,
    /// Set by fulfilment.
    pub received: bool,
    /// Subtotal in cents, set by settlement.
    pub total_price_cents: Option<i64>,
    /// Bonus points redeemed, set by settlement.
    pub bonus_points_used: Option<i64>,
    /// Cash taken from the balance, set by settlement.
    pub cash_paid_cents: Option<i64>,
    /// Settlement time.
    pub paid_at: Option<DateTime<Utc>>,
    /// Hand-over time.
    pub received_at: Option<DateTime<Utc>>,
}

impl Purchase {
    /// Open an empty purchase.
    #[must_use]
    pub fn open(owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: PurchaseId::generate(),
            owner,
            created_at: now,
            paid: false,
            received: false,
            total_price_cents: None,
            bonus_points_used: None,
            cash_paid_cents: None,
            paid_at: None,
            received_at: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> PurchaseStatus {
        match (self.paid, self.received) {
            (_, true) => PurchaseStatus::Received,
            (true, false) => PurchaseStatus::Paid,
            (false, false) => PurchaseStatus::Open,
        }
    }

    /// Fail unless `user_id` is the buyer.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`.
    pub fn ensure_owner(&self, user_id: UserId) -> Result<()> {
        if self.owner == user_id {
            Ok(())
        } else {
            Err(CommerceError::forbidden("purchase belongs to another user"))
        }
    }

    /// Fail unless the caller may see this purchase.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden`.
    pub fn ensure_visible_to(&self, actor: &Actor) -> Result<()> {
        if actor.owns_or_can(self.owner, Capability::FulfillPurchases) {
            Ok(())
        } else {
            Err(CommerceError::forbidden("purchase belongs to another user"))
        }
    }

    /// Fail unless the purchase is open and owned by `user_id`.
    /// Guards every line mutation.
    ///
    /// # Errors
    ///
    /// `Forbidden` or `AlreadyPaid`.
    pub fn ensure_editable(&self, user_id: UserId) -> Result<()> {
        self.ensure_owner(user_id)?;
        if self.paid {
            return Err(CommerceError::AlreadyPaid);
        }
        Ok(())
    }

    /// Deletion follows the same rule as editing: owner only, unpaid only.
    ///
    /// # Errors
    ///
    /// `Forbidden` or `AlreadyPaid`.
    pub fn ensure_deletable(&self, user_id: UserId) -> Result<()> {
        self.ensure_editable(user_id)
    }

    /// Record a successful settlement.
    pub fn mark_paid(&mut self, quote: &SettlementQuote, now: DateTime<Utc>) {
        self.paid = true;
        self.total_price_cents = Some(quote.subtotal_cents);
        self.bonus_points_used = Some(quote.bonus_points);
        self.cash_paid_cents = Some(quote.cash_due_cents);
        self.paid_at = Some(now);
    }

    /// Record the hand-over of a paid purchase.
    ///
    /// # Errors
    ///
    /// `Forbidden` without the fulfilment capability, `NotYetPaid` for an
    /// open purchase, `AlreadyReceived` on repeat.
    pub fn mark_received(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<()> {
        actor.require(Capability::FulfillPurchases)?;
        if !self.paid {
            return Err(CommerceError::NotYetPaid);
        }
        if self.received {
            return Err(CommerceError::AlreadyReceived);
        }
        self.received = true;
        self.received_at = Some(now);
        Ok(())
    }
}

/// One goods in a purchase. At most one line per goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    /// Owning purchase.
    pub purchase_id: PurchaseId,
    /// Referenced goods.
    pub goods_id: GoodsId,
    /// Units, at least one.
    pub quantity: u32,
    /// When the line was added.
    pub added_at: DateTime<Utc>,
}

impl PurchaseLine {
    /// Build a line. The quantity has already been checked against stock.
    #[must_use]
    pub fn new(purchase_id: PurchaseId, goods_id: GoodsId, quantity: u32, now: DateTime<Utc>) -> Self {
        Self {
            purchase_id,
            goods_id,
            quantity,
            added_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;

    fn pharmacist() -> Actor {
        Actor {
            user_id: UserId::generate(),
            roles: vec![Role::Pharmacist],
        }
    }

    fn paid(owner: UserId) -> Purchase {
        let mut purchase = Purchase::open(owner, Utc::now());
        purchase.paid = true;
        purchase
    }

    #[test]
    fn status_follows_flags() {
        let owner = UserId::generate();
        let mut purchase = Purchase::open(owner, Utc::now());
        assert_eq!(purchase.status(), PurchaseStatus::Open);
        purchase.paid = true;
        assert_eq!(purchase.status(), PurchaseStatus::Paid);
        purchase.received = true;
        assert_eq!(purchase.status(), PurchaseStatus::Received);
    }

    #[test]
    fn only_owner_edits_open_purchase() {
        let owner = UserId::generate();
        let purchase = Purchase::open(owner, Utc::now());
        assert!(purchase.ensure_editable(owner).is_ok());
        assert!(matches!(
            purchase.ensure_editable(UserId::generate()),
            Err(CommerceError::Forbidden { .. })
        ));
        assert_eq!(paid(owner).ensure_editable(owner), Err(CommerceError::AlreadyPaid));
        assert_eq!(paid(owner).ensure_deletable(owner), Err(CommerceError::AlreadyPaid));
    }

    #[test]
    fn received_requires_role_payment_and_is_final() {
        let owner = UserId::generate();
        let staff = pharmacist();

        let mut open = Purchase::open(owner, Utc::now());
        assert_eq!(open.mark_received(&staff, Utc::now()), Err(CommerceError::NotYetPaid));

        let mut purchase = paid(owner);
        assert!(matches!(
            purchase.mark_received(&Actor::customer(owner), Utc::now()),
            Err(CommerceError::Forbidden { .. })
        ));
        purchase.mark_received(&staff, Utc::now()).unwrap();
        assert!(purchase.received);
        assert_eq!(
            purchase.mark_received(&staff, Utc::now()),
            Err(CommerceError::AlreadyReceived)
        );
    }

    #[test]
    fn staff_can_view_any_purchase() {
        let purchase = Purchase::open(UserId::generate(), Utc::now());
        assert!(purchase.ensure_visible_to(&pharmacist()).is_ok());
        assert!(purchase
            .ensure_visible_to(&Actor::customer(UserId::generate()))
            .is_err());
    }
}
