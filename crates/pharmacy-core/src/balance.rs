//! Balance ledger entries.
//!
//! Every change to an account balance writes one entry in the same atomic
//! unit as the balance itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PurchaseId, TransactionId, UserId};

/// A balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Amount in cents. Positive = credit, negative = debit.
    pub amount_cents: i64,

    /// What caused the change.
    pub kind: TransactionKind,

    /// Balance after this transaction (in cents).
    pub balance_after_cents: i64,

    /// Human-readable description.
    pub description: String,

    /// Extra context such as the purchase id.
    pub metadata: serde_json::Value,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl BalanceTransaction {
    /// A top-up through the payment gateway or an operator.
    #[must_use]
    pub fn top_up(
        user_id: UserId,
        amount_cents: i64,
        balance_after_cents: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount_cents,
            kind: TransactionKind::TopUp,
            balance_after_cents,
            description,
            metadata: serde_json::Value::Null,
            created_at: now,
        }
    }

    /// The cash part of a settled purchase.
    #[must_use]
    pub fn purchase_debit(
        user_id: UserId,
        purchase_id: PurchaseId,
        amount_cents: i64,
        balance_after_cents: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount_cents: -amount_cents.abs(),
            kind: TransactionKind::PurchaseDebit,
            balance_after_cents,
            description: format!("Payment for purchase {purchase_id}"),
            metadata: serde_json::json!({ "purchase_id": purchase_id.to_string() }),
            created_at: now,
        }
    }
}

/// Type of balance transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Balance was topped up.
    TopUp,

    /// Balance paid for a purchase.
    PurchaseDebit,
}

impl TransactionKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopUp => "top_up",
            Self::PurchaseDebit => "purchase_debit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_debit_is_negative() {
        let purchase_id = PurchaseId::generate();
        let tx =
            BalanceTransaction::purchase_debit(UserId::generate(), purchase_id, 3500, 1500, Utc::now());

        assert_eq!(tx.amount_cents, -3500);
        assert_eq!(tx.kind, TransactionKind::PurchaseDebit);
        assert_eq!(tx.metadata["purchase_id"], purchase_id.to_string());
    }

    #[test]
    fn top_up_is_positive() {
        let tx = BalanceTransaction::top_up(UserId::generate(), 5000, 5000, "top-up".into(), Utc::now());
        assert_eq!(tx.amount_cents, 5000);
        assert_eq!(tx.kind.as_str(), "top_up");
    }
}
