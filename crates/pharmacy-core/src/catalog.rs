//! Catalog goods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, Result, StockShortage};
use crate::GoodsId;

/// Longest accepted goods name.
pub const MAX_NAME_LEN: usize = 1024;

/// Longest accepted goods description.
pub const MAX_INFO_LEN: usize = 2048;

/// Highest accepted unit price (999 999.99).
pub const MAX_PRICE_CENTS: i64 = 99_999_999;

/// Goods category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoodsKind {
    /// Uncategorised.
    #[default]
    Other,
    /// Medicine.
    Medicine,
    /// Medical products.
    MedicalProducts,
    /// Cosmetics.
    Cosmetics,
    /// Hygiene.
    Hygiene,
    /// Supplements and vitamins.
    SupplementsVitamins,
}

/// A sellable good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goods {
    /// Goods ID.
    pub id: GoodsId,
    /// Unique name.
    pub name: String,
    /// Category.
    pub kind: GoodsKind,
    /// Free-form description.
    pub info: String,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Units in stock.
    pub stock: u32,
    /// When the goods was created.
    pub created_at: DateTime<Utc>,
    /// When the goods was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating goods.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoods {
    /// Unique name.
    pub name: String,
    /// Category.
    #[serde(default)]
    pub kind: GoodsKind,
    /// Description.
    #[serde(default)]
    pub info: String,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Initial stock.
    #[serde(default)]
    pub stock: u32,
}

/// Partial update of goods. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoodsUpdate {
    /// New name.
    pub name: Option<String>,
    /// New category.
    pub kind: Option<GoodsKind>,
    /// New description.
    pub info: Option<String>,
    /// New unit price.
    pub price_cents: Option<i64>,
    /// New stock count.
    pub stock: Option<u32>,
}

impl Goods {
    /// Validate and build a new goods record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad name or description, `InvalidPrice`
    /// for a negative price.
    pub fn new(fields: NewGoods, now: DateTime<Utc>) -> Result<Self> {
        let goods = Self {
            id: GoodsId::generate(),
            name: fields.name.trim().to_string(),
            kind: fields.kind,
            info: fields.info,
            price_cents: fields.price_cents,
            stock: fields.stock,
            created_at: now,
            updated_at: now,
        };
        goods.validate()?;
        Ok(goods)
    }

    /// Apply a partial update, re-validating the result.
    ///
    /// # Errors
    ///
    /// Same as [`Goods::new`].
    pub fn apply(&mut self, update: GoodsUpdate, now: DateTime<Utc>) -> Result<()> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(kind) = update.kind {
            next.kind = kind;
        }
        if let Some(info) = update.info {
            next.info = info;
        }
        if let Some(price_cents) = update.price_cents {
            next.price_cents = price_cents;
        }
        if let Some(stock) = update.stock {
            next.stock = stock;
        }
        next.validate()?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(CommerceError::InvalidInput(format!(
                "goods name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
        if self.info.len() > MAX_INFO_LEN {
            return Err(CommerceError::InvalidInput(format!(
                "goods info must be at most {MAX_INFO_LEN} characters"
            )));
        }
        if !(0..=MAX_PRICE_CENTS).contains(&self.price_cents) {
            return Err(CommerceError::InvalidPrice(self.price_cents));
        }
        Ok(())
    }

    /// Describe the shortfall if `quantity` exceeds stock.
    #[must_use]
    pub fn shortage(&self, quantity: u32) -> Option<StockShortage> {
        (self.stock < quantity).then(|| StockShortage {
            goods_id: self.id,
            name: self.name.clone(),
            requested: quantity,
            available: self.stock,
        })
    }

    /// Remove sold units from stock.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientStock` if stock would go negative.
    pub fn take_stock(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<()> {
        if let Some(shortage) = self.shortage(quantity) {
            return Err(CommerceError::InsufficientStock {
                goods: vec![shortage],
            });
        }
        self.stock -= quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Validate a requested line quantity against current stock.
    ///
    /// This is the edit-time check; settlement repeats it under lock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for non-positive values and
    /// `InsufficientStock` when stock cannot cover the request.
    pub fn check_quantity(&self, requested: i64) -> Result<u32> {
        if requested <= 0 {
            return Err(CommerceError::InvalidQuantity(requested));
        }
        let quantity = u32::try_from(requested).unwrap_or(u32::MAX);
        match self.shortage(quantity) {
            Some(shortage) => Err(CommerceError::InsufficientStock {
                goods: vec![shortage],
            }),
            None => Ok(quantity),
        }
    }
}

/// Catalog listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoodsFilter {
    /// Case-insensitive name substring.
    pub name: Option<String>,
    /// Category.
    pub kind: Option<GoodsKind>,
    /// Inclusive lower price bound in cents.
    pub min_price_cents: Option<i64>,
    /// Inclusive upper price bound in cents.
    pub max_price_cents: Option<i64>,
    /// `true` keeps only goods in stock, `false` only sold-out goods.
    pub in_stock: Option<bool>,
}

impl GoodsFilter {
    /// Whether the goods passes every set criterion.
    #[must_use]
    pub fn matches(&self, goods: &Goods) -> bool {
        if let Some(name) = &self.name {
            if !goods.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if self.kind.is_some_and(|kind| kind != goods.kind) {
            return false;
        }
        if self.min_price_cents.is_some_and(|min| goods.price_cents < min) {
            return false;
        }
        if self.max_price_cents.is_some_and(|max| goods.price_cents > max) {
            return false;
        }
        if self.in_stock.is_some_and(|in_stock| in_stock != (goods.stock > 0)) {
            return false;
        }
        true
    }
}
