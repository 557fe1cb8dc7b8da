//! Loyalty cards and bonus points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, Result};
use crate::{CardId, UserId};

/// Currency value of one bonus point, in cents (1 point = 0.01).
pub const BONUS_POINT_VALUE_CENTS: i64 = 1;

/// Card status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    /// Points can be redeemed.
    #[default]
    Active,
    /// Points are frozen.
    Blocked,
}

/// A user's loyalty card. Exactly one per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyCard {
    /// Card number.
    pub id: CardId,
    /// Card holder.
    pub user_id: UserId,
    /// Active or blocked.
    pub status: CardStatus,
    /// Bonus point balance. Never negative.
    pub bonuses: i64,
    /// When the card was issued.
    pub created_at: DateTime<Utc>,
    /// When the card last changed.
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyCard {
    /// Issue an active card with no points.
    #[must_use]
    pub fn issue(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CardId::generate(),
            user_id,
            status: CardStatus::Active,
            bonuses: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether points can be redeemed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    /// Check that `points` can be redeemed from this card.
    ///
    /// # Errors
    ///
    /// `NegativeBonus`, `LoyaltyCardBlocked` (only when points are actually
    /// requested) or `InsufficientBonuses`.
    pub fn check_redeemable(&self, points: i64) -> Result<()> {
        if points < 0 {
            return Err(CommerceError::NegativeBonus(points));
        }
        if points == 0 {
            return Ok(());
        }
        if !self.is_active() {
            return Err(CommerceError::LoyaltyCardBlocked);
        }
        if points > self.bonuses {
            return Err(CommerceError::InsufficientBonuses {
                available: self.bonuses,
                requested: points,
            });
        }
        Ok(())
    }

    /// Deduct redeemed points.
    ///
    /// # Errors
    ///
    /// See [`LoyaltyCard::check_redeemable`].
    pub fn redeem(&mut self, points: i64, now: DateTime<Utc>) -> Result<i64> {
        self.check_redeemable(points)?;
        self.bonuses -= points;
        self.updated_at = now;
        Ok(self.bonuses)
    }

    /// Overwrite the bonus balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a negative balance.
    pub fn set_bonuses(&mut self, bonuses: i64, now: DateTime<Utc>) -> Result<()> {
        if bonuses < 0 {
            return Err(CommerceError::InvalidAmount(format!(
                "bonuses must not be negative, got {bonuses}"
            )));
        }
        self.bonuses = bonuses;
        self.updated_at = now;
        Ok(())
    }

    /// Block or unblock the card.
    pub fn set_status(&mut self, status: CardStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_with(bonuses: i64) -> LoyaltyCard {
        let mut card = LoyaltyCard::issue(UserId::generate(), Utc::now());
        card.set_bonuses(bonuses, Utc::now()).unwrap();
        card
    }

    #[test]
    fn new_card_is_active_and_empty() {
        let card = LoyaltyCard::issue(UserId::generate(), Utc::now());
        assert!(card.is_active());
        assert_eq!(card.bonuses, 0);
    }

    #[test]
    fn redeem_deducts_points() {
        let mut card = card_with(1000);
        assert_eq!(card.redeem(500, Utc::now()).unwrap(), 500);
        assert_eq!(
            card.redeem(501, Utc::now()),
            Err(CommerceError::InsufficientBonuses {
                available: 500,
                requested: 501
            })
        );
    }

    #[test]
    fn blocked_card_only_allows_zero() {
        let mut card = card_with(100);
        card.set_status(CardStatus::Blocked, Utc::now());
        assert_eq!(card.check_redeemable(1), Err(CommerceError::LoyaltyCardBlocked));
        assert!(card.check_redeemable(0).is_ok());
    }

    #[test]
    fn negative_points_are_rejected() {
        let card = card_with(100);
        assert_eq!(card.check_redeemable(-1), Err(CommerceError::NegativeBonus(-1)));

        let mut card = card;
        assert!(card.set_bonuses(-1, Utc::now()).is_err());
        assert_eq!(card.bonuses, 100);
    }
}
