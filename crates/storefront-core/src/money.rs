//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A 100 discount split over three lines of 333.33 each:                 │
//! │    33.333... per line  ❌ cannot be charged                             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (paise)                              │
//! │    Order totals, refunds and wallet postings are i64 paise.            │
//! │    Only the allocator's proportional share is computed in floating     │
//! │    point, and it is rounded back to a whole paisa immediately.         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::money::Money;
//!
//! let price = Money::from_major(450);       // ₹450.00
//! let line = price.multiply_quantity(2);    // ₹900.00
//! assert_eq!(line.minor(), 90_000);
//! assert_eq!(Money::from_minor(89_950).round_to_major(), Money::from_major(900));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Minor units per major unit (100 paise per rupee).
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: differences (refund - paid) may go negative before
///   they are clamped
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as the raw minor count**: documents stay exact
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  CartLine.price ──► Allocator ──► OrderItem.price (effective)           │
/// │                                 └► OrderItem.original_price             │
/// │                                                                         │
/// │  Order.total_amount ──► Refund Calculator ──► Wallet credit             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units (paise).
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole major units (rupees).
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(600).minor(), 60_000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor-unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Floors the value at zero.
    ///
    /// Used wherever a balance "mutates downward": order totals after
    /// refunds and the revocation refund itself are never negative.
    #[inline]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }

    /// Rounds to the nearest whole major unit, half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(90_049).round_to_major(), Money::from_major(900));
    /// assert_eq!(Money::from_minor(90_050).round_to_major(), Money::from_major(901));
    /// ```
    pub const fn round_to_major(self) -> Self {
        let half = MINOR_PER_MAJOR / 2;
        let rounded = if self.0 >= 0 {
            (self.0 + half) / MINOR_PER_MAJOR
        } else {
            (self.0 - half) / MINOR_PER_MAJOR
        };
        Money(rounded * MINOR_PER_MAJOR)
    }

    /// Applies a basis-point rate (1000 = 10%) and rounds to the nearest
    /// minor unit.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let eligible = Money::from_major(1000);
    /// assert_eq!(eligible.percentage_bps(1000), Money::from_major(100));
    /// ```
    pub fn percentage_bps(&self, bps: u32) -> Money {
        // i128 so a lakh-rupee cart times 10000 bps cannot overflow
        let product = self.0 as i128 * bps as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money(rounded as i64)
    }

    /// Builds a Money value from a fractional minor-unit amount, rounding
    /// to the nearest paisa. This is the single float-to-integer boundary.
    #[inline]
    pub fn from_minor_f64(minor: f64) -> Self {
        Money(minor.round() as i64)
    }

    /// Returns the value as fractional minor units for proportional math.
    #[inline]
    pub fn as_minor_f64(&self) -> f64 {
        self.0 as f64
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Human-readable format with the rupee sign, as used in wallet
/// transaction descriptions.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}₹{}.{:02}",
            sign,
            self.major().abs(),
            self.minor_part()
        )
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_and_minor() {
        let money = Money::from_minor(45_050);
        assert_eq!(money.major(), 450);
        assert_eq!(money.minor_part(), 50);
        assert_eq!(Money::from_major(450).minor(), 45_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(45_050).to_string(), "₹450.50");
        assert_eq!(Money::from_major(50).to_string(), "₹50.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-₹5.50");
        assert_eq!(Money::zero().to_string(), "₹0.00");
    }

    #[test]
    fn test_round_to_major() {
        assert_eq!(Money::from_minor(89_999).round_to_major(), Money::from_major(900));
        assert_eq!(Money::from_minor(90_049).round_to_major(), Money::from_major(900));
        assert_eq!(Money::from_minor(90_050).round_to_major(), Money::from_major(901));
        assert_eq!(Money::from_minor(-150).round_to_major(), Money::from_major(-2));
    }

    #[test]
    fn test_percentage_bps() {
        assert_eq!(Money::from_major(1000).percentage_bps(1000), Money::from_major(100));
        // 15% of ₹333.33 = ₹49.9995 → ₹50.00
        assert_eq!(Money::from_minor(33_333).percentage_bps(1500), Money::from_minor(5000));
        assert_eq!(Money::from_major(10).percentage_bps(0), Money::zero());
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_minor(-1).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_minor(7).clamp_non_negative(), Money::from_minor(7));
    }

    #[test]
    fn test_sum_and_arithmetic() {
        let total: Money = [Money::from_major(450), Money::from_major(450)].iter().sum();
        assert_eq!(total, Money::from_major(900));
        assert_eq!((total - Money::from_major(900)), Money::zero());
        assert_eq!(Money::from_major(25) * 3, Money::from_major(75));
    }

    #[test]
    fn test_float_boundary_rounds_to_paisa() {
        assert_eq!(Money::from_minor_f64(33_333.333), Money::from_minor(33_333));
        assert_eq!(Money::from_minor_f64(33_333.5), Money::from_minor(33_334));
    }
}
