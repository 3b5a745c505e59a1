//! # Collaborator Ports
//!
//! The engine never talks to storage or services directly. Every
//! collaborator sits behind one of these traits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           OrderEngine                                   │
//! │                                                                         │
//! │   Catalog    CouponDirectory    Wallet    OrderStore  CartStore Notifier│
//! │      │             │              │           │           │        │    │
//! └──────┼─────────────┼──────────────┼───────────┼───────────┼────────┼────┘
//!        ▼             ▼              ▼           ▼           ▼        ▼
//!   memory::*  or  sqlite::SqliteBackend                        LogNotifier
//! ```

use async_trait::async_trait;

use crate::error::PortResult;
use crate::notify::ItemStatusNotice;
use storefront_core::cart::ProductMap;
use storefront_core::{Cart, Coupon, Money, Order, ProductSnapshot, WalletTransaction};

/// Product prices, stock and status.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: &str) -> PortResult<Option<ProductSnapshot>>;

    /// Products that exist among `ids`. Missing ids are simply absent.
    async fn get_products(&self, ids: &[String]) -> PortResult<ProductMap> {
        let mut products = ProductMap::new();
        for id in ids {
            if let Some(product) = self.get_product(id).await? {
                products.insert(product.id.clone(), product);
            }
        }
        Ok(products)
    }

    /// Atomic stock change for a product and, when given, one size.
    /// Decrements never drive a counter below zero.
    async fn adjust_stock(&self, id: &str, size: Option<&str>, delta: i64) -> PortResult<()>;
}

/// Coupon rules, usage counters and per-customer redemptions.
#[async_trait]
pub trait CouponDirectory: Send + Sync {
    /// Looks up by id, then by (normalised) code.
    async fn resolve(&self, id_or_code: &str) -> PortResult<Option<Coupon>>;

    /// Bumps `used_count`, deactivating the coupon at its limit.
    async fn increment_usage(&self, id: &str) -> PortResult<()>;

    /// Whether a non-cancelled order of this customer already used `code`.
    async fn has_prior_use(&self, user_id: &str, code: &str) -> PortResult<bool>;

    /// Claims the customer's single use of `code` for `order_id`.
    ///
    /// Fails with `PortError::Duplicate` if a live claim exists.
    async fn claim(&self, user_id: &str, code: &str, order_id: &str) -> PortResult<()>;

    /// Releases whatever claim `order_id` holds. No claim is not an error.
    async fn release_for_order(&self, order_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn balance(&self, user_id: &str) -> PortResult<Money>;

    /// Posts a credit or a guarded debit, returning the new balance.
    async fn post(&self, tx: &WalletTransaction) -> PortResult<Money>;
}

/// Versioned order documents.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> PortResult<()>;

    async fn get(&self, id: &str) -> PortResult<Option<Order>>;

    /// Saves if `order.version` is still the stored version.
    ///
    /// Returns the new version, or `PortError::Conflict`.
    async fn save(&self, order: &Order) -> PortResult<i64>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> PortResult<Vec<Order>>;
}

/// Versioned cart documents, one per customer.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load(&self, user_id: &str) -> PortResult<Option<Cart>>;

    /// Returns the new version, or `PortError::Conflict`.
    async fn save(&self, cart: &Cart) -> PortResult<i64>;
}

/// Customer notifications. Always invoked through the dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_item_status(&self, notice: &ItemStatusNotice) -> PortResult<()>;
}
