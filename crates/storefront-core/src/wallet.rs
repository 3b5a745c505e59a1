//! # Wallet Ledger Types
//!
//! The wallet is an append-only list of signed postings plus a running
//! balance. The core only describes postings; the Wallet collaborator
//! applies them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(TransactionKind::Credit),
            "debit" => Some(TransactionKind::Debit),
            _ => None,
        }
    }
}

/// A posting request or a recorded ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WalletTransaction {
    pub user_id: String,
    pub kind: TransactionKind,
    /// Always positive; the kind gives the sign.
    pub amount: Money,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn credit(user_id: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: TransactionKind::Credit,
            amount,
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    pub fn debit(user_id: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: TransactionKind::Debit,
            amount,
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// Balance change this posting causes.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => Money::zero() - self.amount,
        }
    }
}
