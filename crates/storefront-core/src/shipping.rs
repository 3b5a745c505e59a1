//! Shipping cost policy.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::{FLAT_SHIPPING_FEE_MAJOR, FREE_SHIPPING_THRESHOLD_MAJOR};

/// Flat-fee shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Subtotals strictly above this ship free.
    pub free_threshold: Money,
    pub flat_fee: Money,
}

impl ShippingPolicy {
    pub fn new(free_threshold: Money, flat_fee: Money) -> Self {
        Self {
            free_threshold,
            flat_fee,
        }
    }

    /// Shipping charged for a subtotal.
    ///
    /// Free when the subtotal exceeds the threshold or the coupon waives
    /// shipping.
    pub fn cost_for(&self, subtotal: Money, coupon_free_shipping: bool) -> Money {
        if coupon_free_shipping || subtotal > self.free_threshold {
            Money::zero()
        } else {
            self.flat_fee
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self::new(
            Money::from_major(FREE_SHIPPING_THRESHOLD_MAJOR),
            Money::from_major(FLAT_SHIPPING_FEE_MAJOR),
        )
    }
}
