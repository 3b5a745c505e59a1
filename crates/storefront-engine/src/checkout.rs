//! # Order Builder
//!
//! ## Checkout Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock(cart)                                                             │
//! │   1. load cart                                    EmptyCart             │
//! │   2. load products, re-resolve coupon             CouponInvalid         │
//! │   3. price_checkout (stock, allocation, totals)   ItemUnavailable /     │
//! │                                                   InsufficientStock     │
//! │   4. claim coupon redemption (one per customer)   CouponInvalid         │
//! │   5. wallet debit (Wallet payments)               InsufficientBalance   │
//! │   6. insert order ─────────── fails? credit back, release claim        │
//! │  ───────────────── order committed ───────────────────────────────────  │
//! │   7. decrement stock            ┐                                       │
//! │   8. increment coupon usage     ├── failures logged, never rolled back  │
//! │   9. clear cart                 ┘                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::OrderEngine;
use crate::error::{EngineResult, PortError};
use storefront_core::{
    price_checkout, CoreError, CouponRejection, Customer, Order, OrderStatus,
    PaymentDetails, PaymentMethod, ShippingAddress, WalletTransaction,
};

/// Everything checkout needs besides the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer: Customer,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Gateway confirmation for Online payments, passed through verbatim.
    pub payment_details: Option<PaymentDetails>,
}

impl OrderEngine {
    /// Turns the customer's cart into a placed order.
    pub async fn place_order(&self, request: PlaceOrderRequest) -> EngineResult<Order> {
        let user_id = request.customer.id.clone();
        let _guard = self.cart_locks.lock(&user_id).await;
        let now = Utc::now();

        let mut cart = self.load_cart(&user_id).await?;
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let products = self.cart_products(&cart).await?;
        let coupon = match cart.coupon_id.as_deref() {
            Some(id) => self.coupons.resolve(id).await?,
            None => None,
        };
        if let Some(coupon) = &coupon {
            coupon.check_status(now).map_err(CoreError::from)?;
        } else if cart.coupon_id.is_some() {
            debug!(user_id = %user_id, "Cart coupon no longer exists, checking out without it");
        }

        let priced = price_checkout(&cart, &products, coupon.as_ref(), &self.shipping)?;
        let order_id = Uuid::new_v4().to_string();

        // ---------------------------------------------------------------------
        // One use per customer: claim before any money moves
        // ---------------------------------------------------------------------
        let mut claimed = false;
        if let Some(coupon) = coupon.as_ref().filter(|c| c.is_single_use()) {
            match self.coupons.claim(&user_id, &coupon.code, &order_id).await {
                Ok(()) => claimed = true,
                Err(PortError::Duplicate(_)) => {
                    return Err(CoreError::from(CouponRejection::AlreadyUsed).into())
                }
                Err(e) => return Err(e.into()),
            }
        }

        let order = Order {
            id: order_id.clone(),
            customer: request.customer,
            items: priced.items,
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            payment_status: request.payment_method.initial_payment_status(),
            payment_details: request.payment_details,
            order_status: OrderStatus::Pending,
            subtotal: priced.subtotal,
            coupon_code: priced.coupon_code,
            discount_amount: priced.discount_amount,
            shipping_cost: priced.shipping_cost,
            total_amount: priced.total_amount,
            return_reason: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
            version: 0,
        };

        // ---------------------------------------------------------------------
        // Wallet debit
        // ---------------------------------------------------------------------
        let mut debit = None;
        if order.payment_method == PaymentMethod::Wallet && order.total_amount.is_positive() {
            let tx = WalletTransaction::debit(
                user_id.clone(),
                order.total_amount,
                format!("Order Purchase #{}", order.short_ref()),
            );
            match self.wallet.post(&tx).await {
                Ok(balance) => {
                    debug!(user_id = %user_id, balance = %balance, "Wallet debited");
                    debit = Some(tx);
                }
                Err(e) => {
                    self.release_claim(claimed, &order_id).await;
                    return Err(match e {
                        PortError::InsufficientBalance {
                            available,
                            required,
                        } => CoreError::InsufficientBalance {
                            available,
                            required,
                        }
                        .into(),
                        other => other.into(),
                    });
                }
            }
        }

        if let Err(e) = self.orders.insert(&order).await {
            error!(order_id = %order_id, error = %e, "Order insert failed, compensating");
            if let Some(tx) = &debit {
                self.refund_debit(tx).await;
            }
            self.release_claim(claimed, &order_id).await;
            return Err(e.into());
        }

        info!(
            order_id = %order_id,
            user_id = %user_id,
            items = order.items.len(),
            total = %order.total_amount,
            payment = order.payment_method.as_str(),
            "Order placed"
        );

        // ---------------------------------------------------------------------
        // Post-commit: log and continue
        // ---------------------------------------------------------------------
        for item in &order.items {
            if let Err(e) = self
                .catalog
                .adjust_stock(&item.product_id, item.size.as_deref(), -i64::from(item.quantity))
                .await
            {
                warn!(
                    order_id = %order_id,
                    product_id = %item.product_id,
                    error = %e,
                    "Stock decrement failed after checkout"
                );
            }
        }

        if let Some(coupon) = &coupon {
            if let Err(e) = self.coupons.increment_usage(&coupon.id).await {
                warn!(order_id = %order_id, code = %coupon.code, error = %e, "Coupon usage increment failed");
            }
        }

        cart.clear();
        if let Err(e) = self.store_cart(&mut cart).await {
            warn!(order_id = %order_id, user_id = %user_id, error = %e, "Cart clear failed after checkout");
        }

        Ok(order)
    }

    async fn release_claim(&self, claimed: bool, order_id: &str) {
        if !claimed {
            return;
        }
        if let Err(e) = self.coupons.release_for_order(order_id).await {
            error!(order_id = %order_id, error = %e, "Failed to release coupon claim");
        }
    }

    async fn refund_debit(&self, debit: &WalletTransaction) {
        let credit = WalletTransaction::credit(
            debit.user_id.clone(),
            debit.amount,
            format!("Reversal: {}", debit.description),
        );
        if let Err(e) = self.wallet.post(&credit).await {
            error!(
                user_id = %debit.user_id,
                amount = %debit.amount,
                error = %e,
                "Compensating wallet credit failed"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{fixtures, MemoryBackend};
    use crate::ports::{CouponDirectory, OrderStore, Wallet};
    use storefront_core::{Coupon, DiscountRule, ItemStatus, Money, PaymentStatus};

    #[tokio::test]
    async fn test_place_order_prices_and_commits() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 5)])).await;
        backend.catalog.insert(fixtures::product("away", 500, &[("L", 5)])).await;
        backend
            .coupons
            .insert(Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 }))
            .await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        engine.add_to_cart("u1", "away", "L", 1).await.unwrap();
        engine.apply_coupon("u1", "SAVE10").await.unwrap();

        let order = engine.place_order(fixtures::request("u1", PaymentMethod::Online)).await.unwrap();
        assert_eq!(order.total_amount, Money::from_major(900));
        assert_eq!(order.shipping_cost, Money::zero());
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.items.iter().all(|i| i.status == ItemStatus::Pending));
        assert!(order.items.iter().all(|i| i.price == Money::from_major(450)));

        assert_eq!(backend.catalog.size_stock("home", "M").await, Some(4));
        let coupon = backend.coupons.resolve("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
        assert!(engine.get_cart("u1").await.unwrap().is_empty());
        assert!(backend.orders.get(&order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cod_starts_pending_with_shipping() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("scarf", 150, &[("M", 5)])).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "scarf", "M", 2).await.unwrap();
        let order = engine.place_order(fixtures::request("u1", PaymentMethod::Cod)).await.unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.shipping_cost, Money::from_major(50));
        assert_eq!(order.total_amount, Money::from_major(350));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let backend = MemoryBackend::new();
        let engine = backend.engine();
        let err = engine
            .place_order(fixtures::request("u1", PaymentMethod::Online))
            .await
            .unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::EmptyCart));
    }

    #[tokio::test]
    async fn test_wallet_shortfall_places_nothing_and_frees_claim() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 5)])).await;
        backend
            .coupons
            .insert(Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 }))
            .await;
        backend.wallet.fund("u1", Money::from_major(100)).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        engine.apply_coupon("u1", "SAVE10").await.unwrap();
        let err = engine
            .place_order(fixtures::request("u1", PaymentMethod::Wallet))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientBalance { .. })
        ));
        assert!(backend.orders.list_for_user("u1").await.unwrap().is_empty());
        assert!(!backend.coupons.has_prior_use("u1", "SAVE10").await.unwrap());
        assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(100));
        assert_eq!(backend.catalog.size_stock("home", "M").await, Some(5));
    }

    #[tokio::test]
    async fn test_failed_insert_refunds_wallet_debit() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 5)])).await;
        backend.wallet.fund("u1", Money::from_major(1000)).await;
        backend.orders.set_fail_writes(true).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        let err = engine.place_order(fixtures::request("u1", PaymentMethod::Wallet)).await;
        assert!(err.is_err());

        assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(1000));
        let ledger = backend.wallet.ledger("u1").await;
        assert_eq!(ledger.len(), 3);
        assert!(ledger[2].description.starts_with("Reversal: Order Purchase #"));
    }

    #[tokio::test]
    async fn test_post_commit_failures_keep_the_order() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 500, &[("M", 5)])).await;
        backend.catalog.set_fail_adjust(true).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        let order = engine.place_order(fixtures::request("u1", PaymentMethod::Online)).await.unwrap();
        assert!(backend.orders.get(&order.id).await.unwrap().is_some());
        assert!(engine.get_cart("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_coupon_means_no_discount() {
        let backend = MemoryBackend::new();
        backend.catalog.insert(fixtures::product("home", 700, &[("M", 5)])).await;
        let coupon = Coupon::new("GONE", DiscountRule::Percentage { bps: 1000 });
        let coupon_id = coupon.id.clone();
        backend.coupons.insert(coupon).await;
        let engine = backend.engine();

        engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
        engine.apply_coupon("u1", "GONE").await.unwrap();
        backend.coupons.remove(&coupon_id).await;

        let order = engine.place_order(fixtures::request("u1", PaymentMethod::Online)).await.unwrap();
        assert_eq!(order.total_amount, Money::from_major(700));
        assert_eq!(order.coupon_code, None);
    }
}
