//! # Refund Calculator
//!
//! Computes what is owed back when one item leaves an order, and settles
//! the order's money fields afterwards.
//!
//! ## Two Cases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  survivors = active items other than the one leaving                   │
//! │                                                                         │
//! │  COUPON REVOCATION  (coupon.min_quantity > 0                            │
//! │                      and |survivors| < coupon.min_quantity)            │
//! │    keep  = Σ original_price × qty over survivors                        │
//! │    refund = max(0, total_amount − (keep + shipping_cost))               │
//! │    The customer ends up paying full price for what they keep.          │
//! │    With no survivors left there is nothing to ship, so the shipping    │
//! │    term drops out and the whole outstanding amount comes back.         │
//! │                                                                         │
//! │  STANDARD                                                               │
//! │    refund = price × qty                                                 │
//! │           + shipping_cost        if no survivors remain                 │
//! │                                                                         │
//! │  Either way the refund never exceeds total_amount.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "Active" is counted in lines, not units: a line of three shirts is one
//! surviving item.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::coupon::Coupon;
use crate::error::CoreResult;
use crate::money::Money;
use crate::order::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::status::{ItemStatus, Transition};

// =============================================================================
// Refund Breakdown
// =============================================================================

/// The refund owed for one item, with enough detail to describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundBreakdown {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    /// `price × qty`, what the customer paid for the line.
    pub standard: Money,
    /// Shipping included in `amount` (standard case only).
    pub shipping: Money,
    /// Whether the coupon stopped qualifying.
    pub coupon_revoked: bool,
    /// Amount actually owed back.
    pub amount: Money,
}

impl RefundBreakdown {
    /// Part of the standard refund withheld because the coupon was revoked.
    pub fn coupon_reversal(&self) -> Money {
        if self.coupon_revoked {
            (self.standard - self.amount).clamp_non_negative()
        } else {
            Money::zero()
        }
    }

    /// Wallet posting description.
    ///
    /// ## Example
    /// ```text
    /// Refund (Cancelled): Home Jersey (Qty: 1)
    /// Refund (Returned): Home Jersey (Price: ₹500.00 - Coupon Reversal: ₹50.00)
    /// ```
    pub fn description(&self, status: ItemStatus) -> String {
        if self.coupon_revoked {
            format!(
                "Refund ({}): {} (Price: {} - Coupon Reversal: {})",
                status,
                self.item_name,
                self.standard,
                self.coupon_reversal()
            )
        } else {
            format!(
                "Refund ({}): {} (Qty: {})",
                status, self.item_name, self.quantity
            )
        }
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Refund owed if `item_id` leaves the order.
///
/// `coupon` is the order's coupon as currently resolved from the
/// directory, or `None` when the order has no coupon or it was deleted.
///
/// Pure: `order` is a snapshot taken BEFORE the item's status changes.
pub fn compute_refund(
    order: &Order,
    item_id: &str,
    coupon: Option<&Coupon>,
) -> CoreResult<RefundBreakdown> {
    let item = order.item(item_id)?;
    let standard = item.paid_total();

    let survivors: Vec<_> = order
        .active_items()
        .filter(|i| i.id != item_id)
        .collect();

    let min_quantity = match (order.coupon_code.as_ref(), coupon) {
        (Some(_), Some(c)) => c.min_quantity,
        _ => 0,
    };
    let coupon_revoked = min_quantity > 0 && (survivors.len() as u32) < min_quantity;

    let (amount, shipping) = if coupon_revoked {
        let keep: Money = survivors.iter().map(|i| i.original_total()).sum();
        let shipping_kept = if survivors.is_empty() {
            Money::zero()
        } else {
            order.shipping_cost
        };
        let amount = (order.total_amount - (keep + shipping_kept)).clamp_non_negative();
        (amount, Money::zero())
    } else {
        let shipping = if survivors.is_empty() && order.shipping_cost.is_positive() {
            order.shipping_cost
        } else {
            Money::zero()
        };
        (standard + shipping, shipping)
    };

    Ok(RefundBreakdown {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        quantity: item.quantity,
        standard,
        shipping,
        coupon_revoked,
        amount: amount.min(order.total_amount.clamp_non_negative()),
    })
}

/// Applies a refund to the order's money fields.
///
/// Call after the item's status has moved to Cancelled/Returned.
pub fn apply_refund(order: &mut Order, refund: &RefundBreakdown) {
    order.total_amount = (order.total_amount - refund.amount).clamp_non_negative();
    if !order.has_active_items() {
        order.shipping_cost = Money::zero();
    }
}

/// Whether a refund of this order should be paid out to the wallet.
///
/// Only money that was actually collected goes back: Online and Wallet
/// orders from the start, COD orders once they settle as Paid. An accepted
/// return on an unsettled COD order also pays out, since the item was
/// delivered and its cash collected.
pub fn refund_is_payable(order: &Order, transition: Transition) -> bool {
    match order.payment_status {
        PaymentStatus::Paid => true,
        PaymentStatus::Pending => {
            order.payment_method == PaymentMethod::Cod && transition == Transition::AcceptReturn
        }
        PaymentStatus::Failed | PaymentStatus::Refunded => false,
    }
}

// =============================================================================
// Settlement
// =============================================================================

/// Re-runs the reducer and brings payment status in line with the items.
///
/// ## Rules (only when the order reduces to Completed)
/// - every item Cancelled/Returned and Paid → Refunded
/// - otherwise, something survives and payment is not Refunded/Failed → Paid
/// - total driven to 0 → shipping 0, and Paid → Refunded
pub fn settle_order(order: &mut Order) -> OrderStatus {
    let status = order.reduce_status();
    if status != OrderStatus::Completed {
        return status;
    }

    let all_refunded = order.items.iter().all(|i| i.status.is_refunded());
    if all_refunded {
        if order.payment_status == PaymentStatus::Paid {
            order.payment_status = PaymentStatus::Refunded;
        }
    } else if !matches!(
        order.payment_status,
        PaymentStatus::Refunded | PaymentStatus::Failed
    ) {
        order.payment_status = PaymentStatus::Paid;
    }

    if order.total_amount.is_zero() {
        order.shipping_cost = Money::zero();
        if order.payment_status == PaymentStatus::Paid {
            order.payment_status = PaymentStatus::Refunded;
        }
    }

    status
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use crate::money::Money;
    use crate::order::{
        Customer, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
    };
    use crate::status::ItemStatus;

    /// (id, effective price, original price, qty) in major units.
    pub fn order(lines: &[(&str, i64, i64, u32)], shipping: i64, coupon: Option<&str>) -> Order {
        let now = Utc::now();
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|(id, price, original, qty)| OrderItem {
                id: id.to_string(),
                product_id: format!("prod-{id}"),
                name: format!("Item {id}"),
                quantity: *qty,
                price: Money::from_major(*price),
                original_price: Money::from_major(*original),
                image: None,
                size: Some("M".to_string()),
                status: ItemStatus::Pending,
                rejection_reason: None,
                return_reason: None,
            })
            .collect();
        let paid: Money = items.iter().map(|i| i.paid_total()).sum();
        let subtotal: Money = items.iter().map(|i| i.original_total()).sum();

        Order {
            id: "order-000abc123".to_string(),
            customer: Customer {
                id: "u1".to_string(),
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
            },
            items,
            shipping_address: ShippingAddress::default(),
            payment_method: PaymentMethod::Online,
            payment_status: PaymentStatus::Paid,
            payment_details: None,
            order_status: OrderStatus::Pending,
            subtotal,
            coupon_code: coupon.map(str::to_string),
            discount_amount: subtotal - paid,
            shipping_cost: Money::from_major(shipping),
            total_amount: (paid + Money::from_major(shipping)).round_to_major(),
            return_reason: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
            version: 0,
        }
    }
}
