//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── CouponRejection  - Why a coupon cannot be used                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db errors (separate crate)                                 │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  storefront-engine errors                                              │
//! │  ├── PortError        - Collaborator failures                          │
//! │  └── EngineError      - What callers see (with a stable code)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, item, status)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use crate::money::Money;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every failure an order-mutation entry point can report for domain
/// reasons. Collaborator failures (database down, wallet unreachable) are
/// reported by the engine crate, not here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Checkout was attempted on a cart with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A product in the cart is missing, in draft, or archived.
    ///
    /// ## When This Occurs
    /// - Product was unpublished between add-to-cart and checkout
    /// - Product was deleted from the catalog
    /// - Requested size no longer exists on the product
    #[error("{name} is not available")]
    ItemUnavailable { product_id: String, name: String },

    /// Requested quantity exceeds current stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5, size M)
    ///      │
    ///      ▼
    /// Check stock: size M = 3
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Home Jersey", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Home Jersey in stock"
    /// ```
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        size: Option<String>,
        available: i64,
        requested: u32,
    },

    /// Wallet balance does not cover the order total.
    #[error("Insufficient wallet balance: available {available}, required {required}")]
    InsufficientBalance { available: Money, required: Money },

    /// Coupon cannot be applied or is no longer valid at checkout.
    #[error("Coupon invalid: {0}")]
    CouponInvalid(CouponRejection),

    /// Order does not exist or belongs to someone else.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Item id does not exist in the order.
    #[error("Item {item_id} not found in order {order_id}")]
    ItemNotFound { order_id: String, item_id: String },

    /// Cart or saved-for-later line id does not exist.
    #[error("Cart line not found: {0}")]
    CartLineNotFound(String),

    /// The requested status change is not allowed from the current state.
    ///
    /// ## When This Occurs
    /// - Returning an item that is not Delivered
    /// - Cancelling an item that already shipped to the customer
    /// - Cancelling an order that is already Completed
    /// - Moving a terminal item anywhere
    #[error("Cannot move from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// A return rejection was submitted without a reason.
    #[error("A reason is required for {0}")]
    ReasonRequired(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<CouponRejection> for CoreError {
    fn from(rejection: CouponRejection) -> Self {
        CoreError::CouponInvalid(rejection)
    }
}

// =============================================================================
// Coupon Rejection
// =============================================================================

/// The reason a coupon was refused, in the order the checks run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon {0} does not exist")]
    NotFound(String),

    #[error("coupon is not active")]
    Inactive,

    #[error("coupon is not yet valid")]
    NotStarted,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit has been reached")]
    UsageLimitReached,

    #[error("coupon has already been used on another order")]
    AlreadyUsed,

    /// The cart needs `missing` more units to qualify.
    #[error("add {missing} more item(s) to use this coupon")]
    MinQuantity { missing: u32 },

    #[error("minimum order value is {min}")]
    MinOrderValue { min: Money },

    #[error("coupon does not apply to any item in the cart")]
    ScopeMismatch,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
