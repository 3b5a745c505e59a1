//! # Order Engine
//!
//! The single entry point callers hold. Its operations live in
//! [`crate::cart`], [`crate::checkout`] and [`crate::orders`]; this module
//! only wires the collaborators together.
//!
//! ## Lock Scopes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart_locks [user_id]    cart mutations, coupon apply, place_order     │
//! │  order_locks[order_id]   item transitions, cancel_order, return        │
//! │                                                                         │
//! │  Each lock is held across load → mutate → save. The stores' version   │
//! │  check catches writers outside this process.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::locks::KeyedLocks;
use crate::notify::NotificationDispatcher;
use crate::ports::{CartStore, Catalog, CouponDirectory, Notifier, OrderStore, Wallet};
use storefront_core::ShippingPolicy;

/// The collaborators an engine runs against.
#[derive(Clone)]
pub struct Backends {
    pub catalog: Arc<dyn Catalog>,
    pub coupons: Arc<dyn CouponDirectory>,
    pub wallet: Arc<dyn Wallet>,
    pub orders: Arc<dyn OrderStore>,
    pub carts: Arc<dyn CartStore>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct OrderEngine {
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) coupons: Arc<dyn CouponDirectory>,
    pub(crate) wallet: Arc<dyn Wallet>,
    pub(crate) orders: Arc<dyn OrderStore>,
    pub(crate) carts: Arc<dyn CartStore>,
    pub(crate) dispatcher: NotificationDispatcher,
    pub(crate) config: EngineConfig,
    pub(crate) shipping: ShippingPolicy,
    pub(crate) order_locks: KeyedLocks,
    pub(crate) cart_locks: KeyedLocks,
}

impl OrderEngine {
    pub fn new(backends: Backends, config: EngineConfig) -> Self {
        let dispatcher =
            NotificationDispatcher::new(backends.notifier, config.notifications.enabled);
        Self {
            catalog: backends.catalog,
            coupons: backends.coupons,
            wallet: backends.wallet,
            orders: backends.orders,
            carts: backends.carts,
            dispatcher,
            shipping: config.shipping_policy(),
            config,
            order_locks: KeyedLocks::new(),
            cart_locks: KeyedLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn max_units(&self) -> u32 {
        self.config.cart.max_units_per_line
    }
}
