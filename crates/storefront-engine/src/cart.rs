//! # Cart Service
//!
//! Every mutation runs under the customer's cart lock:
//!
//! ```text
//! lock(user) → load (or new) → load products → mutate → recalculate → save
//! ```
//!
//! Recalculating drops any attached coupon, so the customer has to apply
//! it again against the new contents. Removing a saved item is the one
//! mutation that leaves totals alone.

use chrono::Utc;
use tracing::{debug, info};

use crate::engine::OrderEngine;
use crate::error::EngineResult;
use storefront_core::cart::ProductMap;
use storefront_core::validation::normalize_coupon_code;
use storefront_core::{Cart, CoreError, CouponQuote, CouponRejection, ProductSnapshot};

impl OrderEngine {
    // =========================================================================
    // Helpers
    // =========================================================================

    pub(crate) async fn load_cart(&self, user_id: &str) -> EngineResult<Cart> {
        Ok(self
            .carts
            .load(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    pub(crate) async fn cart_products(&self, cart: &Cart) -> EngineResult<ProductMap> {
        Ok(self.catalog.get_products(&cart.product_ids()).await?)
    }

    pub(crate) async fn store_cart(&self, cart: &mut Cart) -> EngineResult<()> {
        cart.updated_at = Utc::now();
        cart.version = self.carts.save(cart).await?;
        Ok(())
    }

    async fn product(&self, product_id: &str) -> EngineResult<Option<ProductSnapshot>> {
        Ok(self.catalog.get_product(product_id).await?)
    }

    /// Recalculates against current products and saves.
    async fn recalc_and_store(&self, cart: &mut Cart) -> EngineResult<()> {
        let products = self.cart_products(cart).await?;
        cart.recalculate(&products);
        self.store_cart(cart).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The customer's cart, refreshed against the catalog.
    ///
    /// Lines whose product was deleted are dropped. If the stored subtotal
    /// no longer matches (a product went inactive or out of stock) the cart
    /// is recalculated, which also drops the coupon.
    pub async fn get_cart(&self, user_id: &str) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;
        let products = self.cart_products(&cart).await?;

        let pruned = cart.prune_missing(&products);
        let fresh = cart.available_subtotal(&products);
        if pruned || fresh != cart.total_price {
            debug!(
                user_id = %user_id,
                stored = %cart.total_price,
                fresh = %fresh,
                "Cart is stale, recalculating"
            );
            cart.recalculate(&products);
            self.store_cart(&mut cart).await?;
        }
        Ok(cart)
    }

    // =========================================================================
    // Line Mutations
    // =========================================================================

    pub async fn add_to_cart(
        &self,
        user_id: &str,
        product_id: &str,
        size: &str,
        quantity: u32,
    ) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;

        let product = self
            .product(product_id)
            .await?
            .ok_or_else(|| CoreError::ItemUnavailable {
                product_id: product_id.to_string(),
                name: product_id.to_string(),
            })?;
        cart.add_line(&product, size, quantity, self.max_units())?;

        self.recalc_and_store(&mut cart).await?;
        info!(user_id = %user_id, product_id = %product_id, size = %size, quantity, "Added to cart");
        Ok(cart)
    }

    pub async fn update_cart_line(
        &self,
        user_id: &str,
        line_id: &str,
        quantity: u32,
    ) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;

        let product_id = cart
            .items
            .iter()
            .find(|l| l.id == line_id)
            .map(|l| l.product_id.clone())
            .ok_or_else(|| CoreError::CartLineNotFound(line_id.to_string()))?;
        let product = self.product(&product_id).await?;
        cart.update_line(line_id, quantity, product.as_ref(), self.max_units())?;

        self.recalc_and_store(&mut cart).await?;
        debug!(user_id = %user_id, line_id = %line_id, quantity, "Cart line updated");
        Ok(cart)
    }

    pub async fn remove_cart_line(&self, user_id: &str, line_id: &str) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;
        cart.remove_line(line_id);
        self.recalc_and_store(&mut cart).await?;
        Ok(cart)
    }

    pub async fn save_for_later(&self, user_id: &str, line_id: &str) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;
        cart.save_for_later(line_id)?;
        self.recalc_and_store(&mut cart).await?;
        Ok(cart)
    }

    /// Moves a saved line back, re-checking stock and re-pricing it.
    pub async fn move_to_cart(&self, user_id: &str, saved_id: &str) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;

        let product_id = cart
            .saved_items
            .iter()
            .find(|l| l.id == saved_id)
            .map(|l| l.product_id.clone())
            .ok_or_else(|| CoreError::CartLineNotFound(saved_id.to_string()))?;
        let product = self.product(&product_id).await?;
        cart.move_to_cart(saved_id, product.as_ref(), self.max_units())?;

        self.recalc_and_store(&mut cart).await?;
        Ok(cart)
    }

    pub async fn remove_saved_item(&self, user_id: &str, saved_id: &str) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;
        cart.remove_saved(saved_id);
        self.store_cart(&mut cart).await?;
        Ok(cart)
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    /// Verifies a coupon against the cart and attaches it.
    ///
    /// ## Check Order
    /// 1. code exists
    /// 2. active, started, not expired, under its usage limit
    /// 3. not already used by this customer (discount coupons only)
    /// 4. minimum quantity, minimum order value, scope
    pub async fn apply_coupon(&self, user_id: &str, code: &str) -> EngineResult<CouponQuote> {
        let code = normalize_coupon_code(code).map_err(CoreError::from)?;

        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;
        let products = self.cart_products(&cart).await?;

        let coupon = self
            .coupons
            .resolve(&code)
            .await?
            .ok_or_else(|| CoreError::from(CouponRejection::NotFound(code.clone())))?;

        coupon.check_status(Utc::now()).map_err(CoreError::from)?;

        if coupon.is_single_use() && self.coupons.has_prior_use(user_id, &coupon.code).await? {
            return Err(CoreError::from(CouponRejection::AlreadyUsed).into());
        }

        let quote = coupon
            .quote(&cart.available_lines(&products))
            .map_err(CoreError::from)?;
        cart.attach_coupon(&quote);
        self.store_cart(&mut cart).await?;

        info!(
            user_id = %user_id,
            code = %quote.code,
            discount = %quote.discount_amount,
            free_shipping = quote.free_shipping,
            "Coupon applied"
        );
        Ok(quote)
    }

    pub async fn remove_coupon(&self, user_id: &str) -> EngineResult<Cart> {
        let _guard = self.cart_locks.lock(user_id).await;
        let mut cart = self.load_cart(user_id).await?;
        cart.clear_coupon();
        self.store_cart(&mut cart).await?;
        Ok(cart)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::memory::{fixtures, MemoryBackend};
    use crate::ports::CouponDirectory;
    use storefront_core::{
        Coupon, CoreError, CouponRejection, DiscountRule, Money, ProductStatus,
    };

    #[tokio::test]
    async fn test_add_merges_and_prices() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 2).await.unwrap();
        let cart = engine.add_to_cart("u1", "home", "M", 1).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.total_price, Money::from_major(1500));
        assert_eq!(cart.total_after_discount, Money::from_major(1500));
    }

    #[tokio::test]
    async fn test_add_rejects_missing_product_and_size() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
        let engine = backend.engine();

        let err = engine.add_to_cart("u1", "ghost", "M", 1).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::ItemUnavailable { .. })));

        assert!(engine.add_to_cart("u1", "home", "XXL", 1).await.is_err());
        assert!(engine.add_to_cart("u1", "home", "M", 13).await.is_err());
    }

    #[tokio::test]
    async fn test_mutation_drops_coupon() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
        backend
            .coupons
            .insert(Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 }))
            .await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 2).await.unwrap();
        let quote = engine.apply_coupon("u1", " save10 ").await.unwrap();
        assert_eq!(quote.discount_amount, Money::from_major(100));

        let cart = engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        assert!(cart.coupon_id.is_none());
        assert_eq!(cart.discount_amount, Money::zero());
    }

    #[tokio::test]
    async fn test_apply_coupon_check_order() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
        let mut duo = Coupon::new("DUO", DiscountRule::Percentage { bps: 1500 });
        duo.min_quantity = 2;
        backend.coupons.insert(duo).await;
        let mut off = Coupon::new("OFF", DiscountRule::Percentage { bps: 1500 });
        off.is_active = false;
        backend.coupons.insert(off).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();

        let rejection = |err: EngineError| match err {
            EngineError::Domain(CoreError::CouponInvalid(r)) => r,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(
            rejection(engine.apply_coupon("u1", "NOPE").await.unwrap_err()),
            CouponRejection::NotFound("NOPE".into())
        );
        assert_eq!(
            rejection(engine.apply_coupon("u1", "OFF").await.unwrap_err()),
            CouponRejection::Inactive
        );
        assert_eq!(
            rejection(engine.apply_coupon("u1", "DUO").await.unwrap_err()),
            CouponRejection::MinQuantity { missing: 1 }
        );
    }

    #[tokio::test]
    async fn test_prior_use_blocks_discount_coupon() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
        backend
            .coupons
            .insert(Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 }))
            .await;
        backend.coupons.claim("u1", "SAVE10", "old-order").await.unwrap();
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        let err = engine.apply_coupon("u1", "SAVE10").await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::CouponInvalid(CouponRejection::AlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn test_get_cart_recalculates_when_product_goes_inactive() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
        backend.catalog.insert(fixtures::product("away", 450, &[("M", 10)])).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        engine.add_to_cart("u1", "away", "M", 1).await.unwrap();
        backend.catalog.set_status("away", ProductStatus::Draft).await;

        let cart = engine.get_cart("u1").await.unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total_price, Money::from_major(500));

        backend.catalog.remove("away").await;
        let cart = engine.get_cart("u1").await.unwrap();
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn test_save_for_later_round_trip() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
        let engine = backend.engine();

        let line_id = engine.add_to_cart("u1", "home", "M", 2).await.unwrap().items[0]
            .id
            .clone();
        let cart = engine.save_for_later("u1", &line_id).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_price, Money::zero());

        // price went up while saved
        backend.catalog.set_price("home", 550).await;
        let saved_id = cart.saved_items[0].id.clone();
        let cart = engine.move_to_cart("u1", &saved_id).await.unwrap();
        assert_eq!(cart.items[0].price, Money::from_major(550));
        assert_eq!(cart.total_price, Money::from_major(1100));

        let cart = engine.remove_cart_line("u1", &cart.items[0].id).await.unwrap();
        assert!(cart.is_empty());
    }
}
