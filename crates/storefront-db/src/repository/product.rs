//! # Product Repository
//!
//! Product snapshots and their stock counters.
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: read, subtract, write back (lost updates)                    │
//! │     SELECT stock ...; UPDATE product_sizes SET stock = 7                │
//! │                                                                         │
//! │  ✅ CORRECT: delta update in one statement                              │
//! │     UPDATE product_sizes SET stock = MAX(0, stock + ?delta)            │
//! │                                                                         │
//! │  Checkout A: -3 ─┐                                                      │
//! │  Checkout B: -2 ─┴─► both applied, neither overwrites the other        │
//! │                                                                         │
//! │  The size counter and the global counter move in one transaction.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::cart::ProductMap;
use storefront_core::{Money, ProductSnapshot, ProductStatus, SizeStock};

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price_minor: i64,
    status: String,
    stock_quantity: i64,
    category_id: Option<String>,
    team_id: Option<String>,
    image: Option<String>,
}

#[derive(Debug, FromRow)]
struct SizeRow {
    size: String,
    stock: i64,
}

impl ProductRow {
    fn into_snapshot(self, sizes: Vec<SizeRow>) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name,
            price: Money::from_minor(self.price_minor),
            status: ProductStatus::parse(&self.status),
            stock_quantity: self.stock_quantity,
            sizes: sizes
                .into_iter()
                .map(|s| SizeStock {
                    size: s.size,
                    stock: s.stock,
                })
                .collect(),
            category_id: self.category_id,
            team_id: self.team_id,
            image: self.image,
        }
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product with its sizes.
    ///
    /// ## Returns
    /// * `Ok(Some(ProductSnapshot))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get(&self, id: &str) -> DbResult<Option<ProductSnapshot>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, price_minor, status, stock_quantity,
                   category_id, team_id, image
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sizes = self.sizes(id).await?;
        Ok(Some(row.into_snapshot(sizes)))
    }

    /// Gets several products keyed by id. Missing ids are simply absent.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<ProductMap> {
        let mut products = HashMap::with_capacity(ids.len());
        for id in ids {
            if products.contains_key(id) {
                continue;
            }
            if let Some(product) = self.get(id).await? {
                products.insert(id.clone(), product);
            }
        }
        debug!(requested = ids.len(), found = products.len(), "Loaded products");
        Ok(products)
    }

    async fn sizes(&self, product_id: &str) -> DbResult<Vec<SizeRow>> {
        let sizes = sqlx::query_as::<_, SizeRow>(
            r#"
            SELECT size, stock
            FROM product_sizes
            WHERE product_id = ?1
            ORDER BY position, size
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sizes)
    }

    /// Inserts a product and its sizes.
    pub async fn insert(&self, product: &ProductSnapshot) -> DbResult<()> {
        debug!(id = %product.id, "Inserting product");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, price_minor, status, stock_quantity,
                category_id, team_id, image, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price.minor())
        .bind(product.status.as_str())
        .bind(product.stock_quantity)
        .bind(&product.category_id)
        .bind(&product.team_id)
        .bind(&product.image)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, size) in product.sizes.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_sizes (product_id, size, stock, position)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&product.id)
            .bind(&size.size)
            .bind(size.stock)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Applies a stock delta (negative for sales, positive for restocking).
    ///
    /// With a size, the size counter and the global counter both move.
    /// Counters are floored at zero.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - unknown product, or unknown size
    pub async fn adjust_stock(&self, id: &str, size: Option<&str>, delta: i64) -> DbResult<()> {
        debug!(id = %id, size = ?size, delta = %delta, "Adjusting stock");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(size) = size {
            let result = sqlx::query(
                r#"
                UPDATE product_sizes
                SET stock = MAX(0, stock + ?3)
                WHERE product_id = ?1 AND size = ?2
                "#,
            )
            .bind(id)
            .bind(size)
            .bind(delta)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("ProductSize", format!("{id}/{size}")));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = MAX(0, stock_quantity + ?2),
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Changes a product's publication status.
    pub async fn set_status(&self, id: &str, status: ProductStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn jersey() -> ProductSnapshot {
        ProductSnapshot {
            id: "prod-1".to_string(),
            name: "Home Jersey".to_string(),
            price: Money::from_major(500),
            status: ProductStatus::Active,
            stock_quantity: 10,
            sizes: vec![
                SizeStock {
                    size: "M".to_string(),
                    stock: 6,
                },
                SizeStock {
                    size: "L".to_string(),
                    stock: 4,
                },
            ],
            category_id: Some("jerseys".to_string()),
            team_id: Some("blues".to_string()),
            image: Some("home.jpg".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&jersey()).await.unwrap();

        let loaded = db.products().get("prod-1").await.unwrap().unwrap();
        assert_eq!(loaded, jersey());
        assert!(db.products().get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adjust_stock_moves_both_counters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(&jersey()).await.unwrap();

        repo.adjust_stock("prod-1", Some("M"), -2).await.unwrap();
        let p = repo.get("prod-1").await.unwrap().unwrap();
        assert_eq!(p.size_stock("M"), Some(4));
        assert_eq!(p.stock_quantity, 8);

        repo.adjust_stock("prod-1", Some("M"), 2).await.unwrap();
        let p = repo.get("prod-1").await.unwrap().unwrap();
        assert_eq!(p.size_stock("M"), Some(6));
        assert_eq!(p.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_adjust_stock_floors_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(&jersey()).await.unwrap();

        repo.adjust_stock("prod-1", Some("L"), -9).await.unwrap();
        let p = repo.get("prod-1").await.unwrap().unwrap();
        assert_eq!(p.size_stock("L"), Some(0));
        assert_eq!(p.stock_quantity, 1);
    }

    #[tokio::test]
    async fn test_unknown_size_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(&jersey()).await.unwrap();

        let err = repo.adjust_stock("prod-1", Some("XXL"), -1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(repo.get("prod-1").await.unwrap().unwrap().stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&jersey()).await.unwrap();

        let map = db
            .products()
            .get_many(&["prod-1".to_string(), "gone".to_string()])
            .await
            .unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("prod-1"));
    }
}
