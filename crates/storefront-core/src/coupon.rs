//! # Coupon Rules
//!
//! Coupon definitions as supplied by the Coupon Directory and the pure
//! verification logic that turns a coupon plus a cart into a discount.
//!
//! ## Verification Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  check_status(now)          quote(lines)                                │
//! │  ─────────────────          ────────────                                │
//! │  1. active                  5. min quantity (units)                     │
//! │  2. start date              6. min order value                          │
//! │  3. expiry                  7. scope (≥ 1 matching line)                │
//! │  4. usage limit             8. discount → whole currency units          │
//! │                                                                         │
//! │  Between the two halves the engine asks the directory whether this     │
//! │  customer already used the code on a live order.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::PricedLine;
use crate::catalog::ProductSnapshot;
use crate::error::CouponRejection;
use crate::money::Money;

// =============================================================================
// Discount Rule
// =============================================================================

/// What the coupon takes off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountRule {
    /// Percentage of the eligible amount, in basis points (1000 = 10%).
    Percentage { bps: u32 },
    /// Flat amount, clamped to the eligible amount.
    Fixed { amount: Money },
    /// Waives the shipping fee. No line discount.
    FreeShipping,
}

impl DiscountRule {
    pub fn kind(&self) -> &'static str {
        match self {
            DiscountRule::Percentage { .. } => "percentage",
            DiscountRule::Fixed { .. } => "fixed",
            DiscountRule::FreeShipping => "free_shipping",
        }
    }
}

// =============================================================================
// Coupon Scope
// =============================================================================

/// Which products a coupon applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "applies_to", content = "targets", rename_all = "snake_case")]
pub enum CouponScope {
    All,
    Category(Vec<String>),
    Team(Vec<String>),
    Product(Vec<String>),
}

impl CouponScope {
    /// Whether a product is an eligible line under this scope.
    pub fn matches(&self, product: &ProductSnapshot) -> bool {
        let contains = |targets: &[String], value: Option<&String>| {
            value.is_some_and(|v| targets.iter().any(|t| t == v))
        };

        match self {
            CouponScope::All => true,
            CouponScope::Category(targets) => contains(targets, product.category_id.as_ref()),
            CouponScope::Team(targets) => contains(targets, product.team_id.as_ref()),
            CouponScope::Product(targets) => contains(targets, Some(&product.id)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CouponScope::All => "all",
            CouponScope::Category(_) => "category",
            CouponScope::Team(_) => "team",
            CouponScope::Product(_) => "product",
        }
    }

    pub fn targets(&self) -> &[String] {
        match self {
            CouponScope::All => &[],
            CouponScope::Category(t) | CouponScope::Team(t) | CouponScope::Product(t) => t,
        }
    }

    /// Rebuilds a scope from its stored kind and target list.
    pub fn from_parts(kind: &str, targets: Vec<String>) -> Option<Self> {
        match kind {
            "all" => Some(CouponScope::All),
            "category" => Some(CouponScope::Category(targets)),
            "team" => Some(CouponScope::Team(targets)),
            "product" => Some(CouponScope::Product(targets)),
            _ => None,
        }
    }
}

impl Default for CouponScope {
    fn default() -> Self {
        CouponScope::All
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// A coupon as resolved from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Coupon {
    pub id: String,
    /// Upper-case, unique.
    pub code: String,
    pub rule: DiscountRule,
    pub scope: CouponScope,
    pub min_order_value: Money,
    /// Minimum units in the cart; also the floor checked on cancellation.
    pub min_quantity: u32,
    /// `None` = unlimited.
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    #[ts(as = "Option<String>")]
    pub starts_at: Option<DateTime<Utc>>,
    /// `None` = never expires.
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Coupon {
    #[inline]
    pub fn is_free_shipping(&self) -> bool {
        self.rule == DiscountRule::FreeShipping
    }

    /// Whether the one-use-per-customer rule applies.
    ///
    /// Free-shipping coupons can be reused.
    #[inline]
    pub fn is_single_use(&self) -> bool {
        !self.is_free_shipping()
    }

    #[inline]
    pub fn limit_reached(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.used_count >= limit)
    }

    /// Status checks, in order: active, started, not expired, under limit.
    ///
    /// Run at verification and again at checkout.
    pub fn check_status(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if self.starts_at.is_some_and(|start| start > now) {
            return Err(CouponRejection::NotStarted);
        }
        if self.expires_at.is_some_and(|end| end < now) {
            return Err(CouponRejection::Expired);
        }
        if self.limit_reached() {
            return Err(CouponRejection::UsageLimitReached);
        }
        Ok(())
    }

    /// Aggregate discount for an eligible amount, in whole currency units.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::coupon::{Coupon, CouponScope, DiscountRule};
    /// use storefront_core::money::Money;
    ///
    /// let coupon = Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 });
    /// assert_eq!(coupon.discount_for(Money::from_major(1000)), Money::from_major(100));
    /// ```
    pub fn discount_for(&self, eligible: Money) -> Money {
        let raw = match &self.rule {
            DiscountRule::FreeShipping => Money::zero(),
            DiscountRule::Percentage { bps } => eligible.percentage_bps(*bps),
            DiscountRule::Fixed { amount } => (*amount).min(eligible),
        };
        raw.clamp_non_negative().round_to_major()
    }

    /// Quantity, value and scope checks plus the discount itself.
    ///
    /// `lines` must be the cart's AVAILABLE lines.
    pub fn quote(&self, lines: &[PricedLine<'_>]) -> Result<CouponQuote, CouponRejection> {
        let units: u32 = lines.iter().map(|p| p.line.quantity).sum();
        let subtotal: Money = lines.iter().map(|p| p.line.line_total()).sum();

        if self.min_quantity > 0 && units < self.min_quantity {
            return Err(CouponRejection::MinQuantity {
                missing: self.min_quantity - units,
            });
        }

        if self.min_order_value.is_positive() && subtotal < self.min_order_value {
            return Err(CouponRejection::MinOrderValue {
                min: self.min_order_value,
            });
        }

        let eligible: Vec<&PricedLine<'_>> = lines
            .iter()
            .filter(|p| self.scope.matches(p.product))
            .collect();
        if eligible.is_empty() {
            return Err(CouponRejection::ScopeMismatch);
        }
        let eligible_subtotal: Money = eligible.iter().map(|p| p.line.line_total()).sum();

        let discount_amount = self.discount_for(eligible_subtotal);

        Ok(CouponQuote {
            coupon_id: self.id.clone(),
            code: self.code.clone(),
            discount_amount,
            free_shipping: self.is_free_shipping(),
            subtotal,
            eligible_subtotal,
            total_after_discount: subtotal - discount_amount,
        })
    }

    /// Shorthand constructor with permissive defaults: active, unlimited,
    /// no window, no minimums, applies to everything.
    pub fn new(code: impl Into<String>, rule: DiscountRule) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into().trim().to_uppercase(),
            rule,
            scope: CouponScope::All,
            min_order_value: Money::zero(),
            min_quantity: 0,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }
}

// =============================================================================
// Coupon Quote
// =============================================================================

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CouponQuote {
    pub coupon_id: String,
    pub code: String,
    pub discount_amount: Money,
    /// The coupon waives shipping.
    pub free_shipping: bool,
    /// Available subtotal the discount was calculated against.
    pub subtotal: Money,
    pub eligible_subtotal: Money,
    pub total_after_discount: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================
