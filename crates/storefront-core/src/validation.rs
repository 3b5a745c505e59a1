//! # Validation Module
//!
//! Input validation utilities for the storefront order engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront client                                            │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine entry point (Rust)                                    │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: input rules before any state is touched              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0, balance >= 0)                                  │
//! │  └── UNIQUE (coupon code, live redemption per user)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::validation::{normalize_coupon_code, validate_line_quantity};
//!
//! assert_eq!(normalize_coupon_code("  save10 ").unwrap(), "SAVE10");
//! assert!(validate_line_quantity(3, 12).is_ok());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted coupon code.
pub const MAX_COUPON_CODE_LEN: usize = 32;

/// Longest accepted return / rejection reason.
pub const MAX_REASON_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Trims and upper-cases a coupon code.
///
/// Codes are stored upper-case, so every lookup goes through this first.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::normalize_coupon_code;
///
/// assert_eq!(normalize_coupon_code("welcome50").unwrap(), "WELCOME50");
/// assert!(normalize_coupon_code("   ").is_err());
/// ```
pub fn normalize_coupon_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "coupon code".to_string(),
        });
    }

    if code.len() > MAX_COUPON_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "coupon code".to_string(),
            max: MAX_COUPON_CODE_LEN,
        });
    }

    Ok(code.to_uppercase())
}

/// Validates a cart size selection.
///
/// Every product in this catalog is sized, so a line without a size is
/// refused up front.
pub fn validate_size(size: &str) -> ValidationResult<String> {
    let size = size.trim();

    if size.is_empty() {
        return Err(ValidationError::Required {
            field: "size".to_string(),
        });
    }

    Ok(size.to_string())
}

/// Validates a free-text reason (return request, rejection).
///
/// ## Returns
/// The trimmed reason, or `None` when nothing but whitespace was given.
pub fn validate_reason(reason: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(Some(reason.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a per-line cart quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed `max` (the configured units-per-line cap)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item                                                         │
/// │                                                                         │
/// │  Customer picks quantity: 5                                            │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_line_quantity(5, 12) ← THIS FUNCTION                         │
/// │       │                                                                 │
/// │       ├── qty == 0?  → Error: "quantity must be between 1 and 12"      │
/// │       ├── qty > 12?  → Error: "quantity must be between 1 and 12"      │
/// │       └── OK → stock check, merge with existing line                   │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_line_quantity(qty: u32, max: u32) -> ValidationResult<()> {
    if qty == 0 || qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: max as i64,
        });
    }

    Ok(())
}

/// Validates a discount rate in basis points (0-10000).
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_coupon_code() {
        assert_eq!(normalize_coupon_code("save10").unwrap(), "SAVE10");
        assert_eq!(normalize_coupon_code("  Fest-25 ").unwrap(), "FEST-25");
        assert!(normalize_coupon_code("").is_err());
        assert!(normalize_coupon_code(&"A".repeat(40)).is_err());
    }

    #[test]
    fn test_validate_size() {
        assert_eq!(validate_size(" XL ").unwrap(), "XL");
        assert!(validate_size("").is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason(None).unwrap(), None);
        assert_eq!(validate_reason(Some("   ")).unwrap(), None);
        assert_eq!(
            validate_reason(Some(" torn seam ")).unwrap(),
            Some("torn seam".to_string())
        );
        assert!(validate_reason(Some(&"x".repeat(600))).is_err());
    }

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity(1, 12).is_ok());
        assert!(validate_line_quantity(12, 12).is_ok());
        assert!(validate_line_quantity(0, 12).is_err());
        assert!(validate_line_quantity(13, 12).is_err());
    }

    #[test]
    fn test_validate_discount_bps() {
        assert!(validate_discount_bps(1000).is_ok());
        assert!(validate_discount_bps(10000).is_ok());
        assert!(validate_discount_bps(10001).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
