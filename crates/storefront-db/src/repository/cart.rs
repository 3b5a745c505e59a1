//! # Cart Repository
//!
//! One JSON cart document per customer, guarded by a version column.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::Cart;

#[derive(Debug, FromRow)]
struct CartRow {
    document: String,
    version: i64,
}

/// Repository for cart documents.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Loads a customer's cart, if one was ever saved.
    pub async fn get(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT document, version FROM carts WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let mut cart: Cart = serde_json::from_str(&row.document)?;
            cart.version = row.version;
            Ok(cart)
        })
        .transpose()
    }

    /// Saves a cart if nobody else saved it since it was loaded.
    ///
    /// A cart with version 0 is new and is inserted.
    ///
    /// ## Returns
    /// * `Ok(version)` - the stored version after the save
    /// * `Err(DbError::Conflict)` - the stored version moved on
    pub async fn save(&self, cart: &Cart) -> DbResult<i64> {
        let next = cart.version + 1;
        let mut stored = cart.clone();
        stored.version = next;
        let document = serde_json::to_string(&stored)?;
        let now = Utc::now();

        let affected = if cart.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO carts (user_id, document, version, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id) DO NOTHING
                "#,
            )
            .bind(&cart.user_id)
            .bind(&document)
            .bind(next)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE carts
                SET document = ?2, version = ?3, updated_at = ?4
                WHERE user_id = ?1 AND version = ?5
                "#,
            )
            .bind(&cart.user_id)
            .bind(&document)
            .bind(next)
            .bind(now)
            .bind(cart.version)
            .execute(&self.pool)
            .await?
            .rows_affected()
        };

        if affected == 0 {
            return Err(DbError::conflict("Cart", &cart.user_id, cart.version));
        }

        debug!(user_id = %cart.user_id, version = next, "Cart saved");
        Ok(next)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
