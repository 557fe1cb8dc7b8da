//! Time-bounded percentage discounts on goods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, Result};
use crate::{GoodsId, PromotionId};

/// Smallest allowed discount.
pub const MIN_PERCENTAGE: u8 = 10;

/// Largest allowed discount.
pub const MAX_PERCENTAGE: u8 = 90;

/// A discount on one goods, running until `expires_at`.
///
/// Expired promotions stay in storage and are ignored by pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    /// Promotion ID.
    pub id: PromotionId,
    /// The discounted goods.
    pub goods_id: GoodsId,
    /// Discount in percent, 10 to 90.
    pub percentage: u8,
    /// The discount applies strictly before this instant.
    pub expires_at: DateTime<Utc>,
    /// When the promotion was created.
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Build a validated promotion.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPromotion` if the percentage is out of range.
    pub fn new(
        goods_id: GoodsId,
        percentage: u8,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        check_percentage(percentage)?;
        Ok(Self {
            id: PromotionId::generate(),
            goods_id,
            percentage,
            expires_at,
            created_at: now,
        })
    }

    /// Change the discount or the expiry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPromotion` if the percentage is out of range.
    pub fn revise(&mut self, percentage: Option<u8>, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        if let Some(percentage) = percentage {
            check_percentage(percentage)?;
            self.percentage = percentage;
        }
        if let Some(expires_at) = expires_at {
            self.expires_at = expires_at;
        }
        Ok(())
    }

    /// Whether the promotion is running at `at`.
    #[must_use]
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.expires_at > at
    }
}

fn check_percentage(percentage: u8) -> Result<()> {
    if (MIN_PERCENTAGE..=MAX_PERCENTAGE).contains(&percentage) {
        Ok(())
    } else {
        Err(CommerceError::InvalidPromotion(format!(
            "percentage must be between {MIN_PERCENTAGE} and {MAX_PERCENTAGE}, got {percentage}"
        )))
    }
}

/// Reject a new or revised promotion while a different one is still running
/// for the same goods.
///
/// # Errors
///
/// Returns `ActivePromotionExists`.
pub fn ensure_no_active_rival(
    candidate: &Promotion,
    existing: &[Promotion],
    now: DateTime<Utc>,
) -> Result<()> {
    let rival = existing.iter().any(|p| {
        p.id != candidate.id && p.goods_id == candidate.goods_id && p.is_active(now)
    });
    if rival {
        Err(CommerceError::ActivePromotionExists {
            goods_id: candidate.goods_id,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn percentage_bounds() {
        let now = Utc::now();
        let goods = GoodsId::generate();
        assert!(Promotion::new(goods, 9, now, now).is_err());
        assert!(Promotion::new(goods, 10, now, now).is_ok());
        assert!(Promotion::new(goods, 90, now, now).is_ok());
        assert!(Promotion::new(goods, 91, now, now).is_err());
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let promo = Promotion::new(GoodsId::generate(), 20, now, now).unwrap();
        assert!(!promo.is_active(now));
        assert!(promo.is_active(now - Duration::seconds(1)));
    }

    #[test]
    fn rival_detection_ignores_expired_and_self() {
        let now = Utc::now();
        let goods = GoodsId::generate();
        let expired = Promotion::new(goods, 20, now - Duration::hours(1), now).unwrap();
        let running = Promotion::new(goods, 30, now + Duration::hours(1), now).unwrap();
        let other_goods = Promotion::new(GoodsId::generate(), 30, now + Duration::hours(1), now).unwrap();

        let candidate = Promotion::new(goods, 15, now + Duration::days(1), now).unwrap();
        assert!(ensure_no_active_rival(&candidate, &[expired.clone(), other_goods.clone()], now).is_ok());
        assert_eq!(
            ensure_no_active_rival(&candidate, &[expired, running.clone()], now),
            Err(CommerceError::ActivePromotionExists { goods_id: goods })
        );

        // Revising the running promotion itself is fine.
        assert!(ensure_no_active_rival(&running, &[running.clone(), other_goods], now).is_ok());
    }
}
