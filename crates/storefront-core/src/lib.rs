//! # storefront-core: Pure Order Lifecycle Logic
//!
//! This crate is the **heart** of the storefront order engine. It turns a
//! priced cart into frozen order lines, governs every line item through its
//! fulfillment state machine, and computes what is owed back when items are
//! cancelled or returned. Everything here is a pure function over snapshots.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Order Engine                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              storefront-engine (orchestration)                  │   │
//! │  │   place_order, cancel_item, set_item_status, return_item ...    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐   │   │
//! │  │  │ allocation │ │   refund   │ │   status   │ │    cart    │   │   │
//! │  │  │ discount → │ │ standard / │ │ transition │ │  coupon    │   │   │
//! │  │  │ line price │ │ revocation │ │  reducer   │ │  rules     │   │   │
//! │  │  └────────────┘ └────────────┘ └────────────┘ └────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                storefront-db (SQLite layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer minor units
//! - [`catalog`] - Product snapshot as supplied by the catalog
//! - [`cart`] - Cart document and its recalculation rules
//! - [`coupon`] - Coupon rules, scope eligibility and verification
//! - [`order`] - Order document, payment and order-level status
//! - [`status`] - Item state machine and the global status reducer
//! - [`allocation`] - Pricing allocator (discount → effective line price)
//! - [`refund`] - Refund calculator (standard and coupon revocation)
//! - [`checkout`] - Order builder pricing (cart → frozen order lines)
//! - [`lifecycle`] - Item and order transitions with their side effects
//! - [`shipping`] - Shipping cost policy
//! - [`wallet`] - Wallet ledger types
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::allocation::{allocate_discount, AllocationLine};
//! use storefront_core::money::Money;
//!
//! let lines = [
//!     AllocationLine::new(Money::from_major(500), 1, true),
//!     AllocationLine::new(Money::from_major(500), 1, true),
//! ];
//!
//! // 10% off a 1000 subtotal, spread proportionally
//! let prices = allocate_discount(&lines, Money::from_major(100));
//! assert_eq!(prices[0], Money::from_major(450));
//! assert_eq!(prices[1], Money::from_major(450));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupon;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod order;
pub mod refund;
pub mod shipping;
pub mod status;
pub mod validation;
pub mod wallet;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use catalog::{ProductSnapshot, ProductStatus, SizeStock};
pub use checkout::{price_checkout, PricedCheckout};
pub use coupon::{Coupon, CouponQuote, CouponScope, DiscountRule};
pub use error::{CoreError, CoreResult, CouponRejection, ValidationError};
pub use lifecycle::{ItemChange, OrderCancellation, StockRelease};
pub use money::Money;
pub use order::{
    Customer, Order, OrderItem, OrderStatus, PaymentDetails, PaymentMethod, PaymentStatus,
    ShippingAddress,
};
pub use refund::RefundBreakdown;
pub use shipping::ShippingPolicy;
pub use status::{Actor, ItemStatus, Transition};
pub use wallet::{TransactionKind, WalletTransaction};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum units of a single (product, size) line in a cart.
///
/// ## Business Reason
/// Keeps resellers from emptying a size run in one order.
/// Overridable through the engine configuration.
pub const MAX_UNITS_PER_LINE: u32 = 12;

/// Subtotal above which shipping is free, in major currency units.
pub const FREE_SHIPPING_THRESHOLD_MAJOR: i64 = 600;

/// Flat shipping fee charged below the threshold, in major currency units.
pub const FLAT_SHIPPING_FEE_MAJOR: i64 = 50;

/// Length of the short order reference shown to customers.
pub const SHORT_REF_LEN: usize = 6;
