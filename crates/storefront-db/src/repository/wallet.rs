//! # Wallet Repository
//!
//! Per-customer balance plus an append-only ledger. A posting updates the
//! balance and appends its ledger row in one transaction.
//!
//! ## Guarded Debit
//! ```text
//! UPDATE wallets SET balance = balance - ?amount
//! WHERE user_id = ? AND balance >= ?amount
//!
//! 0 rows affected → InsufficientBalance, nothing written
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use storefront_core::{Money, TransactionKind, WalletTransaction};

#[derive(Debug, FromRow)]
struct TransactionRow {
    user_id: String,
    kind: String,
    amount: i64,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = DbError;

    fn try_from(row: TransactionRow) -> DbResult<Self> {
        let kind = TransactionKind::parse(&row.kind).ok_or_else(|| {
            DbError::Serialization(format!("unknown transaction kind '{}'", row.kind))
        })?;
        Ok(WalletTransaction {
            user_id: row.user_id,
            kind,
            amount: Money::from_minor(row.amount),
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Repository for wallet balances and transactions.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

impl WalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    /// Current balance; zero for a customer without a wallet row.
    pub async fn balance(&self, user_id: &str) -> DbResult<Money> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(Money::from_minor(balance.unwrap_or(0)))
    }

    /// Applies a posting.
    ///
    /// ## Returns
    /// * `Ok(Money)` - balance after the posting
    /// * `Err(DbError::InsufficientBalance)` - debit larger than the balance
    pub async fn post(&self, tx_in: &WalletTransaction) -> DbResult<Money> {
        let amount = tx_in.amount.minor();
        if amount <= 0 {
            return Err(DbError::QueryFailed(format!(
                "wallet posting must be positive, got {amount}"
            )));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        match tx_in.kind {
            TransactionKind::Credit => {
                sqlx::query(
                    r#"
                    INSERT INTO wallets (user_id, balance, updated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(user_id) DO UPDATE
                    SET balance = balance + excluded.balance,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(&tx_in.user_id)
                .bind(amount)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            TransactionKind::Debit => {
                let result = sqlx::query(
                    r#"
                    UPDATE wallets
                    SET balance = balance - ?2, updated_at = ?3
                    WHERE user_id = ?1 AND balance >= ?2
                    "#,
                )
                .bind(&tx_in.user_id)
                .bind(amount)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    let available: Option<i64> =
                        sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = ?1")
                            .bind(&tx_in.user_id)
                            .fetch_optional(&mut *tx)
                            .await?;
                    return Err(DbError::InsufficientBalance {
                        available: available.unwrap_or(0),
                        required: amount,
                    });
                }
            }
        }

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, user_id, kind, amount, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(generate_id())
        .bind(&tx_in.user_id)
        .bind(tx_in.kind.as_str())
        .bind(amount)
        .bind(&tx_in.description)
        .bind(tx_in.created_at)
        .execute(&mut *tx)
        .await?;

        let balance: i64 = sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = ?1")
            .bind(&tx_in.user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            user_id = %tx_in.user_id,
            kind = tx_in.kind.as_str(),
            amount = %tx_in.amount,
            "Wallet posting recorded"
        );
        debug!(balance = balance, "Wallet balance after posting");
        Ok(Money::from_minor(balance))
    }

    /// A customer's ledger, newest first.
    pub async fn transactions(&self, user_id: &str) -> DbResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT user_id, kind, amount, description, created_at
            FROM wallet_transactions
            WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WalletTransaction::try_from).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_credit_then_debit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.wallets();
        assert_eq!(repo.balance("u1").await.unwrap(), Money::zero());

        let credit = WalletTransaction::credit("u1", Money::from_major(1000), "Top up");
        assert_eq!(repo.post(&credit).await.unwrap(), Money::from_major(1000));

        let debit = WalletTransaction::debit("u1", Money::from_major(900), "Order Purchase");
        assert_eq!(repo.post(&debit).await.unwrap(), Money::from_major(100));

        let ledger = repo.transactions("u1").await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].kind, TransactionKind::Debit);
    }

    #[tokio::test]
    async fn test_overdraft_is_rejected_and_leaves_no_trace() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.wallets();
        repo.post(&WalletTransaction::credit("u1", Money::from_major(100), "Top up"))
            .await
            .unwrap();

        let err = repo
            .post(&WalletTransaction::debit("u1", Money::from_major(900), "Order Purchase"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientBalance {
                available: 10_000,
                required: 90_000
            }
        ));
        assert_eq!(repo.balance("u1").await.unwrap(), Money::from_major(100));
        assert_eq!(repo.transactions("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_debit_without_wallet() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .wallets()
            .post(&WalletTransaction::debit("nobody", Money::from_major(1), "Order Purchase"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientBalance { available: 0, .. }));
    }
}
