//! # SQLite Backend
//!
//! Adapts the storefront-db repositories to the engine's ports.
//!
//! ## Error Mapping
//! ```text
//! DbError::NotFound            → PortError::NotFound
//! DbError::Conflict            → PortError::Conflict
//! DbError::InsufficientBalance → PortError::InsufficientBalance
//! DbError::UniqueViolation     → PortError::Duplicate
//! anything else                → PortError::Unavailable
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::Backends;
use crate::error::{PortError, PortResult};
use crate::ports::{CartStore, Catalog, CouponDirectory, Notifier, OrderStore, Wallet};
use storefront_core::cart::ProductMap;
use storefront_core::{Cart, Coupon, Money, Order, ProductSnapshot, WalletTransaction};
use storefront_db::{Database, DbError};

impl From<DbError> for PortError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PortError::NotFound { entity, id },
            DbError::Conflict { entity, id, .. } => PortError::Conflict { entity, id },
            DbError::InsufficientBalance {
                available,
                required,
            } => PortError::InsufficientBalance {
                available: Money::from_minor(available),
                required: Money::from_minor(required),
            },
            DbError::UniqueViolation { field, value } => {
                PortError::Duplicate(format!("{field} {value}"))
            }
            other => PortError::Unavailable(other.to_string()),
        }
    }
}

/// Every storage port over one SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Port bundle backed by this database plus the given notifier.
    pub fn backends(&self, notifier: Arc<dyn Notifier>) -> Backends {
        let shared = Arc::new(self.clone());
        Backends {
            catalog: shared.clone(),
            coupons: shared.clone(),
            wallet: shared.clone(),
            orders: shared.clone(),
            carts: shared,
            notifier,
        }
    }
}

#[async_trait]
impl Catalog for SqliteBackend {
    async fn get_product(&self, id: &str) -> PortResult<Option<ProductSnapshot>> {
        Ok(self.db.products().get(id).await?)
    }

    async fn get_products(&self, ids: &[String]) -> PortResult<ProductMap> {
        Ok(self.db.products().get_many(ids).await?)
    }

    async fn adjust_stock(&self, id: &str, size: Option<&str>, delta: i64) -> PortResult<()> {
        Ok(self.db.products().adjust_stock(id, size, delta).await?)
    }
}

#[async_trait]
impl CouponDirectory for SqliteBackend {
    async fn resolve(&self, id_or_code: &str) -> PortResult<Option<Coupon>> {
        Ok(self.db.coupons().resolve(id_or_code).await?)
    }

    async fn increment_usage(&self, id: &str) -> PortResult<()> {
        Ok(self.db.coupons().increment_usage(id).await?)
    }

    async fn has_prior_use(&self, user_id: &str, code: &str) -> PortResult<bool> {
        Ok(self.db.coupons().has_live_redemption(user_id, code).await?)
    }

    async fn claim(&self, user_id: &str, code: &str, order_id: &str) -> PortResult<()> {
        Ok(self.db.coupons().claim(user_id, code, order_id).await?)
    }

    async fn release_for_order(&self, order_id: &str) -> PortResult<()> {
        self.db.coupons().release_for_order(order_id).await?;
        Ok(())
    }
}

#[async_trait]
impl Wallet for SqliteBackend {
    async fn balance(&self, user_id: &str) -> PortResult<Money> {
        Ok(self.db.wallets().balance(user_id).await?)
    }

    async fn post(&self, tx: &WalletTransaction) -> PortResult<Money> {
        Ok(self.db.wallets().post(tx).await?)
    }
}

#[async_trait]
impl OrderStore for SqliteBackend {
    async fn insert(&self, order: &Order) -> PortResult<()> {
        Ok(self.db.orders().insert(order).await?)
    }

    async fn get(&self, id: &str) -> PortResult<Option<Order>> {
        Ok(self.db.orders().get(id).await?)
    }

    async fn save(&self, order: &Order) -> PortResult<i64> {
        Ok(self.db.orders().update(order).await?)
    }

    async fn list_for_user(&self, user_id: &str) -> PortResult<Vec<Order>> {
        Ok(self.db.orders().list_for_user(user_id).await?)
    }
}

#[async_trait]
impl CartStore for SqliteBackend {
    async fn load(&self, user_id: &str) -> PortResult<Option<Cart>> {
        Ok(self.db.carts().get(user_id).await?)
    }

    async fn save(&self, cart: &Cart) -> PortResult<i64> {
        Ok(self.db.carts().save(cart).await?)
    }
}
