//! # In-Memory Backends
//!
//! Port implementations held entirely in memory, with failure toggles for
//! exercising compensation paths. They enforce the same guarantees as the
//! SQLite backend: atomic stock counters floored at zero, guarded debits,
//! versioned saves and one live coupon claim per customer.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::EngineConfig;
use crate::engine::{Backends, OrderEngine};
use crate::error::{PortError, PortResult};
use crate::notify::RecordingNotifier;
use crate::ports::{CartStore, Catalog, CouponDirectory, OrderStore, Wallet};
use storefront_core::{
    Cart, Coupon, Money, Order, ProductSnapshot, ProductStatus, TransactionKind,
    WalletTransaction,
};

fn unavailable(what: &str) -> PortError {
    PortError::Unavailable(format!("{what} failure injected"))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<String, ProductSnapshot>>,
    fail_adjust: RwLock<bool>,
}

impl MemoryCatalog {
    pub async fn insert(&self, product: ProductSnapshot) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    pub async fn remove(&self, id: &str) {
        self.products.write().await.remove(id);
    }

    pub async fn set_status(&self, id: &str, status: ProductStatus) {
        if let Some(p) = self.products.write().await.get_mut(id) {
            p.status = status;
        }
    }

    pub async fn set_price(&self, id: &str, major: i64) {
        if let Some(p) = self.products.write().await.get_mut(id) {
            p.price = Money::from_major(major);
        }
    }

    pub async fn set_fail_adjust(&self, fail: bool) {
        *self.fail_adjust.write().await = fail;
    }

    pub async fn stock(&self, id: &str) -> Option<i64> {
        self.products.read().await.get(id).map(|p| p.stock_quantity)
    }

    pub async fn size_stock(&self, id: &str, size: &str) -> Option<i64> {
        self.products.read().await.get(id)?.size_stock(size)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_product(&self, id: &str) -> PortResult<Option<ProductSnapshot>> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn adjust_stock(&self, id: &str, size: Option<&str>, delta: i64) -> PortResult<()> {
        if *self.fail_adjust.read().await {
            return Err(unavailable("catalog"));
        }
        let mut products = self.products.write().await;
        let product = products
            .get_mut(id)
            .ok_or_else(|| PortError::not_found("Product", id))?;

        if let Some(size) = size {
            let entry = product
                .sizes
                .iter_mut()
                .find(|s| s.size == size)
                .ok_or_else(|| PortError::not_found("Product size", format!("{id}/{size}")))?;
            entry.stock = (entry.stock + delta).max(0);
        }
        product.stock_quantity = (product.stock_quantity + delta).max(0);
        Ok(())
    }
}

// =============================================================================
// Coupon Directory
// =============================================================================

#[derive(Debug, Clone)]
struct Redemption {
    user_id: String,
    code: String,
    order_id: String,
    released: bool,
}

#[derive(Default)]
pub struct MemoryCoupons {
    coupons: RwLock<HashMap<String, Coupon>>,
    redemptions: RwLock<Vec<Redemption>>,
}

impl MemoryCoupons {
    pub async fn insert(&self, coupon: Coupon) {
        self.coupons.write().await.insert(coupon.id.clone(), coupon);
    }

    pub async fn remove(&self, id: &str) {
        self.coupons.write().await.remove(id);
    }

    pub async fn live_claims(&self, user_id: &str) -> Vec<String> {
        self.redemptions
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && !r.released)
            .map(|r| r.code.clone())
            .collect()
    }
}

#[async_trait]
impl CouponDirectory for MemoryCoupons {
    async fn resolve(&self, id_or_code: &str) -> PortResult<Option<Coupon>> {
        let coupons = self.coupons.read().await;
        if let Some(coupon) = coupons.get(id_or_code) {
            return Ok(Some(coupon.clone()));
        }
        let code = id_or_code.trim().to_uppercase();
        Ok(coupons.values().find(|c| c.code == code).cloned())
    }

    async fn increment_usage(&self, id: &str) -> PortResult<()> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons
            .get_mut(id)
            .ok_or_else(|| PortError::not_found("Coupon", id))?;
        coupon.used_count += 1;
        if coupon.limit_reached() {
            coupon.is_active = false;
        }
        Ok(())
    }

    async fn has_prior_use(&self, user_id: &str, code: &str) -> PortResult<bool> {
        Ok(self
            .redemptions
            .read()
            .await
            .iter()
            .any(|r| r.user_id == user_id && r.code == code && !r.released))
    }

    async fn claim(&self, user_id: &str, code: &str, order_id: &str) -> PortResult<()> {
        let mut redemptions = self.redemptions.write().await;
        if redemptions
            .iter()
            .any(|r| r.user_id == user_id && r.code == code && !r.released)
        {
            return Err(PortError::Duplicate(format!("coupon redemption {code}")));
        }
        redemptions.push(Redemption {
            user_id: user_id.to_string(),
            code: code.to_string(),
            order_id: order_id.to_string(),
            released: false,
        });
        Ok(())
    }

    async fn release_for_order(&self, order_id: &str) -> PortResult<()> {
        for r in self
            .redemptions
            .write()
            .await
            .iter_mut()
            .filter(|r| r.order_id == order_id)
        {
            r.released = true;
        }
        Ok(())
    }
}

// =============================================================================
// Wallet
// =============================================================================

#[derive(Default)]
pub struct MemoryWallet {
    balances: RwLock<HashMap<String, Money>>,
    ledger: RwLock<Vec<WalletTransaction>>,
    fail_posts: RwLock<bool>,
}

impl MemoryWallet {
    /// Credits a balance directly (a top-up).
    pub async fn fund(&self, user_id: &str, amount: Money) {
        let tx = WalletTransaction::credit(user_id, amount, "Top up");
        *self
            .balances
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert_with(Money::zero) += amount;
        self.ledger.write().await.push(tx);
    }

    pub async fn set_fail_posts(&self, fail: bool) {
        *self.fail_posts.write().await = fail;
    }

    /// A customer's ledger, oldest first.
    pub async fn ledger(&self, user_id: &str) -> Vec<WalletTransaction> {
        self.ledger
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Wallet for MemoryWallet {
    async fn balance(&self, user_id: &str) -> PortResult<Money> {
        Ok(self
            .balances
            .read()
            .await
            .get(user_id)
            .copied()
            .unwrap_or_else(Money::zero))
    }

    async fn post(&self, tx: &WalletTransaction) -> PortResult<Money> {
        if *self.fail_posts.read().await {
            return Err(unavailable("wallet"));
        }
        if !tx.amount.is_positive() {
            return Err(PortError::Unavailable(format!(
                "wallet posting must be positive, got {}",
                tx.amount
            )));
        }

        let mut balances = self.balances.write().await;
        let balance = balances
            .entry(tx.user_id.clone())
            .or_insert_with(Money::zero);
        if tx.kind == TransactionKind::Debit && *balance < tx.amount {
            return Err(PortError::InsufficientBalance {
                available: *balance,
                required: tx.amount,
            });
        }
        *balance += tx.signed_amount();
        let after = *balance;
        drop(balances);

        self.ledger.write().await.push(tx.clone());
        Ok(after)
    }
}

// =============================================================================
// Order Store
// =============================================================================

#[derive(Default)]
pub struct MemoryOrders {
    // insertion order, so equal timestamps list newest first
    orders: RwLock<Vec<Order>>,
    fail_writes: RwLock<bool>,
}

impl MemoryOrders {
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }
}

#[async_trait]
impl OrderStore for MemoryOrders {
    async fn insert(&self, order: &Order) -> PortResult<()> {
        if *self.fail_writes.read().await {
            return Err(unavailable("order store"));
        }
        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.id == order.id) {
            return Err(PortError::Duplicate(format!("order {}", order.id)));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> PortResult<Option<Order>> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }

    async fn save(&self, order: &Order) -> PortResult<i64> {
        if *self.fail_writes.read().await {
            return Err(unavailable("order store"));
        }
        let mut orders = self.orders.write().await;
        let stored = orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| PortError::not_found("Order", &order.id))?;
        if stored.version != order.version {
            return Err(PortError::conflict("Order", &order.id));
        }
        *stored = order.clone();
        stored.version += 1;
        Ok(stored.version)
    }

    async fn list_for_user(&self, user_id: &str) -> PortResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .iter()
            .rev()
            .filter(|o| o.customer.id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

// =============================================================================
// Cart Store
// =============================================================================

#[derive(Default)]
pub struct MemoryCarts {
    carts: RwLock<HashMap<String, Cart>>,
}

#[async_trait]
impl CartStore for MemoryCarts {
    async fn load(&self, user_id: &str) -> PortResult<Option<Cart>> {
        Ok(self.carts.read().await.get(user_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> PortResult<i64> {
        let mut carts = self.carts.write().await;
        let current = carts.get(&cart.user_id).map_or(0, |c| c.version);
        if current != cart.version {
            return Err(PortError::conflict("Cart", &cart.user_id));
        }
        let mut stored = cart.clone();
        stored.version += 1;
        let version = stored.version;
        carts.insert(cart.user_id.clone(), stored);
        Ok(version)
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// One of each in-memory collaborator, shared by every engine built from it.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub catalog: Arc<MemoryCatalog>,
    pub coupons: Arc<MemoryCoupons>,
    pub wallet: Arc<MemoryWallet>,
    pub orders: Arc<MemoryOrders>,
    pub carts: Arc<MemoryCarts>,
    pub notifier: Arc<RecordingNotifier>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backends(&self) -> Backends {
        Backends {
            catalog: self.catalog.clone(),
            coupons: self.coupons.clone(),
            wallet: self.wallet.clone(),
            orders: self.orders.clone(),
            carts: self.carts.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// An engine with default configuration.
    pub fn engine(&self) -> OrderEngine {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(&self, config: EngineConfig) -> OrderEngine {
        OrderEngine::new(self.backends(), config)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Builders for products, customers and checkout requests.
pub mod fixtures {
    use crate::checkout::PlaceOrderRequest;
    use storefront_core::{
        Customer, Money, PaymentMethod, ProductSnapshot, ProductStatus, ShippingAddress,
        SizeStock,
    };

    /// An active product; global stock is the sum of the sizes.
    pub fn product(id: &str, price_major: i64, sizes: &[(&str, i64)]) -> ProductSnapshot {
        ProductSnapshot {
            id: id.to_string(),
            name: format!("{id} kit"),
            price: Money::from_major(price_major),
            status: ProductStatus::Active,
            stock_quantity: sizes.iter().map(|(_, stock)| stock).sum(),
            sizes: sizes
                .iter()
                .map(|(size, stock)| SizeStock {
                    size: size.to_string(),
                    stock: *stock,
                })
                .collect(),
            category_id: Some("jerseys".to_string()),
            team_id: None,
            image: None,
        }
    }

    pub fn customer(user_id: &str) -> Customer {
        Customer {
            id: user_id.to_string(),
            name: format!("Customer {user_id}"),
            email: format!("{user_id}@example.com"),
        }
    }

    pub fn request(user_id: &str, payment_method: PaymentMethod) -> PlaceOrderRequest {
        PlaceOrderRequest {
            customer: customer(user_id),
            shipping_address: ShippingAddress {
                full_name: format!("Customer {user_id}"),
                phone: "9000000000".to_string(),
                line1: "12 Stadium Road".to_string(),
                line2: None,
                city: "Kochi".to_string(),
                state: "Kerala".to_string(),
                postal_code: "682001".to_string(),
                country: "IN".to_string(),
            },
            payment_method,
            payment_details: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
