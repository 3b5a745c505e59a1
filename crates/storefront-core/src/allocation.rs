//! # Pricing Allocator
//!
//! Spreads an aggregate coupon discount across the eligible lines of a
//! cart, proportionally to each line's share of the eligible subtotal.
//! The result is a per-line *effective unit price* that is frozen onto
//! the order and drives every later refund.
//!
//! ## Math
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  E = Σ price × qty            over eligible lines                       │
//! │  D = min(discount, E)         fixed coupons can exceed E                │
//! │                                                                         │
//! │  for each eligible line:                                                │
//! │      share     = (price × qty) / E × D                                  │
//! │      effective = price − share / qty      → nearest paisa, ≥ 0          │
//! │                                                                         │
//! │  ineligible lines: effective = price                                    │
//! │  E == 0 or D == 0: nothing is distributed                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The proportional share is computed in floating point and rounded once,
//! per unit. The distributed total therefore matches `D` to within half a
//! paisa per unit.

use crate::money::Money;

/// One line as the allocator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationLine {
    pub unit_price: Money,
    pub quantity: u32,
    /// Whether the coupon's scope covers this line.
    pub eligible: bool,
}

impl AllocationLine {
    pub fn new(unit_price: Money, quantity: u32, eligible: bool) -> Self {
        Self {
            unit_price,
            quantity,
            eligible,
        }
    }

    #[inline]
    fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Sum of `price × qty` over eligible lines.
pub fn eligible_subtotal(lines: &[AllocationLine]) -> Money {
    lines
        .iter()
        .filter(|l| l.eligible)
        .map(AllocationLine::line_total)
        .sum()
}

/// Returns the effective unit price for every line, in input order.
///
/// ## Example
/// ```rust
/// use storefront_core::allocation::{allocate_discount, AllocationLine};
/// use storefront_core::money::Money;
///
/// let lines = [
///     AllocationLine::new(Money::from_major(600), 1, true),
///     AllocationLine::new(Money::from_major(400), 1, false),
/// ];
/// let prices = allocate_discount(&lines, Money::from_major(60));
/// assert_eq!(prices, vec![Money::from_major(540), Money::from_major(400)]);
/// ```
pub fn allocate_discount(lines: &[AllocationLine], discount: Money) -> Vec<Money> {
    let eligible = eligible_subtotal(lines);

    if !eligible.is_positive() || !discount.is_positive() {
        return lines.iter().map(|l| l.unit_price).collect();
    }

    let distributed = discount.min(eligible).as_minor_f64();
    let eligible = eligible.as_minor_f64();

    lines
        .iter()
        .map(|line| {
            if !line.eligible || line.quantity == 0 {
                return line.unit_price;
            }
            let share = line.line_total().as_minor_f64() / eligible * distributed;
            let effective = line.unit_price.as_minor_f64() - share / line.quantity as f64;
            Money::from_minor_f64(effective).clamp_non_negative()
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
