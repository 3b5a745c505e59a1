//! # Checkout Pricing
//!
//! Turns a cart into frozen order lines and order totals. This is the pure
//! half of the Order Builder: no stock is reserved and no money moves here.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart + current products + resolved coupon                              │
//! │       │                                                                 │
//! │       ├── empty?                        → EmptyCart                     │
//! │       ├── each line: product active?    → ItemUnavailable               │
//! │       │              stock (global/size)→ InsufficientStock             │
//! │       ▼                                                                 │
//! │  Pricing Allocator (eligible = coupon scope matches product)           │
//! │       ▼                                                                 │
//! │  shipping = free if subtotal > threshold or free-shipping coupon       │
//! │  total    = round_to_major(Σ effective × qty + shipping)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use uuid::Uuid;

use crate::allocation::{allocate_discount, eligible_subtotal, AllocationLine};
use crate::cart::{Cart, ProductMap};
use crate::catalog::ProductSnapshot;
use crate::coupon::Coupon;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::order::OrderItem;
use crate::shipping::ShippingPolicy;
use crate::status::ItemStatus;

/// Everything the Order Builder needs to persist an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCheckout {
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    /// Discount actually distributed over the lines.
    pub discount_amount: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
    /// Code of the applied coupon, stored as a string on the order.
    pub coupon_code: Option<String>,
}

/// Prices a cart for checkout.
///
/// `coupon` is the cart's coupon as re-resolved at checkout; `None` when
/// the cart carries none or it no longer exists. The aggregate discount is
/// the amount computed at coupon verification (`cart.discount_amount`).
pub fn price_checkout(
    cart: &Cart,
    products: &ProductMap,
    coupon: Option<&Coupon>,
    policy: &ShippingPolicy,
) -> CoreResult<PricedCheckout> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let mut resolved: Vec<&ProductSnapshot> = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let product = products
            .get(&line.product_id)
            .filter(|p| p.is_active())
            .ok_or_else(|| CoreError::ItemUnavailable {
                product_id: line.product_id.clone(),
                name: products
                    .get(&line.product_id)
                    .map_or_else(|| line.product_id.clone(), |p| p.name.clone()),
            })?;

        let available = product.available_for(line.size.as_deref()).unwrap_or(0);
        if (line.quantity as i64) > available {
            return Err(CoreError::InsufficientStock {
                name: product.name.clone(),
                size: line.size.clone(),
                available,
                requested: line.quantity,
            });
        }
        resolved.push(product);
    }

    let allocation: Vec<AllocationLine> = cart
        .items
        .iter()
        .zip(&resolved)
        .map(|(line, product)| {
            let eligible = coupon.is_some_and(|c| c.scope.matches(product));
            AllocationLine::new(line.price, line.quantity, eligible)
        })
        .collect();

    let requested_discount = if coupon.is_some() {
        cart.discount_amount.clamp_non_negative()
    } else {
        Money::zero()
    };
    let discount_amount = requested_discount.min(eligible_subtotal(&allocation));
    let effective = allocate_discount(&allocation, discount_amount);

    let subtotal: Money = cart.items.iter().map(|l| l.line_total()).sum();
    let free_shipping = coupon.is_some_and(Coupon::is_free_shipping);
    let shipping_cost = policy.cost_for(subtotal, free_shipping);

    let items: Vec<OrderItem> = cart
        .items
        .iter()
        .zip(&resolved)
        .zip(effective)
        .map(|((line, product), price)| OrderItem {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: line.quantity,
            price,
            original_price: line.price,
            image: product.image.clone(),
            size: line.size.clone(),
            status: ItemStatus::Pending,
            rejection_reason: None,
            return_reason: None,
        })
        .collect();

    let lines_total: Money = items.iter().map(|i| i.paid_total()).sum();
    let total_amount = (lines_total + shipping_cost).round_to_major();

    Ok(PricedCheckout {
        items,
        subtotal,
        discount_amount,
        shipping_cost,
        total_amount,
        coupon_code: coupon.map(|c| c.code.clone()),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
