//! User accounts, staff roles and the authenticated caller.
//!
//! Identity itself lives outside this service. An account holds what the
//! storefront needs about a user: the monetary balance, the unique username
//! and the set of staff roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, Result};
use crate::UserId;

/// A storefront account for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The user ID.
    pub user_id: UserId,

    /// Unique public name.
    pub username: String,

    /// Staff roles. Empty for ordinary customers.
    pub roles: Vec<Role>,

    /// Spendable balance in cents. Never negative.
    pub balance_cents: i64,

    /// Lifetime balance credited through top-ups (in cents).
    pub lifetime_topped_up_cents: i64,

    /// Lifetime balance spent on purchases (in cents).
    pub lifetime_spent_cents: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new customer account with zero balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the username is blank or too long.
    pub fn new(user_id: UserId, username: &str, now: DateTime<Utc>) -> Result<Self> {
        let username = username.trim();
        if username.is_empty() || username.len() > MAX_USERNAME_LEN {
            return Err(CommerceError::InvalidInput(format!(
                "username must be 1 to {MAX_USERNAME_LEN} characters"
            )));
        }

        Ok(Self {
            user_id,
            username: username.to_string(),
            roles: Vec::new(),
            balance_cents: 0,
            lifetime_topped_up_cents: 0,
            lifetime_spent_cents: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check if the balance covers an amount.
    #[must_use]
    pub fn has_sufficient_funds(&self, amount_cents: i64) -> bool {
        self.balance_cents >= amount_cents
    }

    /// Add a top-up to the balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts or on overflow.
    pub fn credit(&mut self, amount_cents: i64, now: DateTime<Utc>) -> Result<i64> {
        if amount_cents <= 0 {
            return Err(CommerceError::InvalidAmount(format!(
                "credit must be positive, got {amount_cents}"
            )));
        }
        self.balance_cents = self
            .balance_cents
            .checked_add(amount_cents)
            .ok_or_else(|| CommerceError::InvalidAmount("balance overflow".into()))?;
        self.lifetime_topped_up_cents = self.lifetime_topped_up_cents.saturating_add(amount_cents);
        self.updated_at = now;
        Ok(self.balance_cents)
    }

    /// Take a purchase payment from the balance.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` if the balance is lower than the amount.
    pub fn debit(&mut self, amount_cents: i64, now: DateTime<Utc>) -> Result<i64> {
        if !self.has_sufficient_funds(amount_cents) {
            return Err(CommerceError::InsufficientFunds {
                balance_cents: self.balance_cents,
                required_cents: amount_cents,
            });
        }
        self.balance_cents -= amount_cents;
        self.lifetime_spent_cents += amount_cents;
        self.updated_at = now;
        Ok(self.balance_cents)
    }

    /// The caller context for this account.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            roles: self.roles.clone(),
        }
    }
}

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 150;

/// Staff roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Moderates reviews.
    Moderator,

    /// Maintains the catalog and hands over paid purchases.
    Pharmacist,

    /// Superuser.
    Admin,
}

/// Things a role may allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create, edit and delete goods and promotions.
    ManageCatalog,

    /// View any loyalty card, adjust bonuses, block and unblock cards.
    ManageLoyalty,

    /// View any purchase and mark paid purchases as received.
    FulfillPurchases,

    /// Delete other users' reviews.
    ModerateReviews,
}

impl Role {
    /// Whether this role grants a capability.
    #[must_use]
    pub const fn grants(self, capability: Capability) -> bool {
        match self {
            Self::Admin => true,
            Self::Pharmacist => matches!(
                capability,
                Capability::ManageCatalog | Capability::FulfillPurchases
            ),
            Self::Moderator => matches!(capability, Capability::ModerateReviews),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Who is calling.
    pub user_id: UserId,
    /// Their staff roles.
    pub roles: Vec<Role>,
}

impl Actor {
    /// A caller without staff roles.
    #[must_use]
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            roles: Vec::new(),
        }
    }

    /// Whether any of the caller's roles grants the capability.
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        self.roles.iter().any(|role| role.grants(capability))
    }

    /// Fail with `Forbidden` unless the caller holds the capability.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` naming the missing capability.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(CommerceError::forbidden(format!(
                "missing capability {capability:?}"
            )))
        }
    }

    /// Whether the caller is `owner` or holds the capability.
    #[must_use]
    pub fn owns_or_can(&self, owner: UserId, capability: Capability) -> bool {
        self.user_id == owner || self.can(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_zero_balance_and_no_roles() {
        let account = Account::new(UserId::generate(), " alice ", Utc::now()).unwrap();
        assert_eq!(account.username, "alice");
        assert_eq!(account.balance_cents, 0);
        assert!(account.roles.is_empty());
    }

    #[test]
    fn blank_username_is_rejected() {
        let result = Account::new(UserId::generate(), "   ", Utc::now());
        assert!(matches!(result, Err(CommerceError::InvalidInput(_))));
    }

    #[test]
    fn debit_refuses_overdraft() {
        let now = Utc::now();
        let mut account = Account::new(UserId::generate(), "bob", now).unwrap();
        account.credit(1000, now).unwrap();

        assert_eq!(account.debit(400, now).unwrap(), 600);
        assert_eq!(
            account.debit(601, now),
            Err(CommerceError::InsufficientFunds {
                balance_cents: 600,
                required_cents: 601
            })
        );
        assert_eq!(account.balance_cents, 600);
        assert_eq!(account.lifetime_spent_cents, 400);
        assert_eq!(account.lifetime_topped_up_cents, 1000);
    }

    #[test]
    fn credit_must_be_positive() {
        let now = Utc::now();
        let mut account = Account::new(UserId::generate(), "carol", now).unwrap();
        assert!(account.credit(0, now).is_err());
        assert!(account.credit(-5, now).is_err());
    }

    #[test]
    fn role_capabilities() {
        assert!(Role::Pharmacist.grants(Capability::FulfillPurchases));
        assert!(Role::Pharmacist.grants(Capability::ManageCatalog));
        assert!(!Role::Pharmacist.grants(Capability::ManageLoyalty));
        assert!(Role::Moderator.grants(Capability::ModerateReviews));
        assert!(!Role::Moderator.grants(Capability::FulfillPurchases));
        assert!(Role::Admin.grants(Capability::ManageLoyalty));
    }

    #[test]
    fn customer_has_no_capabilities() {
        let actor = Actor::customer(UserId::generate());
        assert!(!actor.can(Capability::FulfillPurchases));
        assert!(actor.require(Capability::ManageCatalog).is_err());
        assert!(actor.owns_or_can(actor.user_id, Capability::ManageLoyalty));
    }
}
