//! # Order Repository
//!
//! Orders are stored as JSON documents. `order_status`, `user_id` and
//! `created_at` are mirrored into columns for listing.
//!
//! ## Optimistic Save
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Writer A: load (v3) ── mutate ── UPDATE … WHERE version = 3 ✓ (→ v4)  │
//! │  Writer B: load (v3) ── mutate ── UPDATE … WHERE version = 3 ✗ Conflict │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::Order;

#[derive(Debug, FromRow)]
struct OrderRow {
    document: String,
    version: i64,
}

impl OrderRow {
    fn into_order(self) -> DbResult<Order> {
        let mut order: Order = serde_json::from_str(&self.document)?;
        order.version = self.version;
        Ok(order)
    }
}

/// Repository for order documents.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a freshly placed order.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - id already used
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, order_status, document, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer.id)
        .bind(order.order_status.as_str())
        .bind(serde_json::to_string(order)?)
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT document, version FROM orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// A customer's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT document, version FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// Writes back a mutated order if its version is still current.
    ///
    /// ## Returns
    /// * `Ok(version)` - the stored version after the save
    /// * `Err(DbError::NotFound)` - no such order
    /// * `Err(DbError::Conflict)` - someone else saved first
    pub async fn update(&self, order: &Order) -> DbResult<i64> {
        let next = order.version + 1;
        let mut stored = order.clone();
        stored.version = next;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET document = ?2, order_status = ?3, version = ?4, updated_at = ?5
            WHERE id = ?1 AND version = ?6
            "#,
        )
        .bind(&order.id)
        .bind(serde_json::to_string(&stored)?)
        .bind(order.order_status.as_str())
        .bind(next)
        .bind(Utc::now())
        .bind(order.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = ?1")
                .bind(&order.id)
                .fetch_one(&self.pool)
                .await?;
            return Err(if exists == 0 {
                DbError::not_found("Order", &order.id)
            } else {
                DbError::conflict("Order", &order.id, order.version)
            });
        }

        debug!(order_id = %order.id, version = next, "Order saved");
        Ok(next)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
