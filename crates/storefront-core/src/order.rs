//! # Order Document
//!
//! The order as placed at checkout. Once placed, only item statuses,
//! order/payment status, `total_amount`, `shipping_cost` and timestamps
//! change.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order                                                                  │
//! │  ├── customer { id, name, email }                                       │
//! │  ├── items[]                                                            │
//! │  │    ├── price           (effective, post-discount, per unit)          │
//! │  │    ├── original_price  (pre-discount, per unit)                      │
//! │  │    └── status          (ItemStatus, 9 values)                        │
//! │  ├── subtotal / discount_amount / shipping_cost                         │
//! │  ├── total_amount         (only ever decreases after placement)         │
//! │  ├── coupon_code          (string, survives coupon deletion)            │
//! │  ├── payment_method / payment_status                                    │
//! │  └── order_status         (reduction of item statuses, 3 values)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::status::{reduce_order_status, ItemStatus};
use crate::SHORT_REF_LEN;

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[serde(rename = "COD")]
    Cod,
    /// Captured by the payment gateway before checkout.
    Online,
    /// Debited from the customer's wallet at checkout.
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Online => "Online",
            PaymentMethod::Wallet => "Wallet",
        }
    }

    /// Payment status a freshly placed order starts with.
    pub fn initial_payment_status(&self) -> PaymentStatus {
        match self {
            PaymentMethod::Cod => PaymentStatus::Pending,
            PaymentMethod::Online | PaymentMethod::Wallet => PaymentStatus::Paid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

/// Gateway confirmation passed through from the payment step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentDetails {
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub signature: Option<String>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Order-level status, a reduction of the item statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum OrderStatus {
    Pending,
    #[serde(rename = "Return Requested")]
    ReturnRequested,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::ReturnRequested => "Return Requested",
            OrderStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Customer & Address
// =============================================================================

/// The customer the order belongs to, captured at checkout for
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

// =============================================================================
// Order Item
// =============================================================================

/// A frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub product_id: String,
    /// Product name at time of order (frozen).
    pub name: String,
    pub quantity: u32,
    /// Effective unit price actually charged.
    pub price: Money,
    /// Unit price before the coupon discount.
    pub original_price: Money,
    pub image: Option<String>,
    pub size: Option<String>,
    pub status: ItemStatus,
    pub rejection_reason: Option<String>,
    pub return_reason: Option<String>,
}

impl OrderItem {
    /// What the customer paid for this line.
    #[inline]
    pub fn paid_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }

    /// What this line costs without the coupon.
    #[inline]
    pub fn original_total(&self) -> Money {
        self.original_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_details: Option<PaymentDetails>,
    pub order_status: OrderStatus,
    /// Cart subtotal before discount and shipping.
    pub subtotal: Money,
    pub coupon_code: Option<String>,
    pub discount_amount: Money,
    pub shipping_cost: Money,
    /// Outstanding amount; decreases as refunds are issued, floored at 0.
    pub total_amount: Money,
    /// Reason given on the most recent return request.
    pub return_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, bumped by the store on every save.
    pub version: i64,
}

impl Order {
    /// Short customer-facing reference: last six characters, upper-cased.
    ///
    /// ## Example
    /// ```rust,ignore
    /// // id "5f1c...a9b3c2d1" → "B3C2D1"
    /// ```
    pub fn short_ref(&self) -> String {
        let chars: Vec<char> = self.id.chars().collect();
        let start = chars.len().saturating_sub(SHORT_REF_LEN);
        chars[start..].iter().collect::<String>().to_uppercase()
    }

    pub fn item(&self, item_id: &str) -> CoreResult<&OrderItem> {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| self.item_not_found(item_id))
    }

    pub fn item_mut(&mut self, item_id: &str) -> CoreResult<&mut OrderItem> {
        let order_id = self.id.clone();
        self.items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(CoreError::ItemNotFound {
                order_id,
                item_id: item_id.to_string(),
            })
    }

    fn item_not_found(&self, item_id: &str) -> CoreError {
        CoreError::ItemNotFound {
            order_id: self.id.clone(),
            item_id: item_id.to_string(),
        }
    }

    /// Lines that still count toward the order.
    pub fn active_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|i| i.status.is_active())
    }

    #[inline]
    pub fn has_active_items(&self) -> bool {
        self.active_items().next().is_some()
    }

    /// Re-runs the global status reducer.
    pub fn reduce_status(&mut self) -> OrderStatus {
        self.order_status = reduce_order_status(self.items.iter().map(|i| i.status));
        self.order_status
    }

    #[inline]
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
