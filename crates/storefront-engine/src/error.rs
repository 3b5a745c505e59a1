//! # Engine Error Types
//!
//! Every entry point returns `EngineResult<T>`.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  storefront-core rule fails ──── CoreError ──────┐                     │
//! │                                                   │                     │
//! │  collaborator fails ──────────── PortError ──────┼──► EngineError      │
//! │                                                   │        │            │
//! │  stale order/cart version ─────── Conflict ──────┘        │            │
//! │                                                            ▼            │
//! │                                               ErrorBody { code, message }
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use storefront_core::{CoreError, Money};

// =============================================================================
// Port Error
// =============================================================================

/// Failure reported by a collaborator behind a port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Optimistic version check failed on save.
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: String, id: String },

    /// Guarded wallet debit refused.
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Money, required: Money },

    /// A uniqueness guard fired (coupon redemption, order id).
    #[error("Duplicate {0}")]
    Duplicate(String),

    /// The collaborator could not be reached or failed internally.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

impl PortError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        PortError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        PortError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Result type for port calls.
pub type PortResult<T> = Result<T, PortError>;

// =============================================================================
// Engine Error
// =============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule refused the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// A collaborator failed.
    #[error(transparent)]
    Port(PortError),

    /// Someone else saved the same order or cart first. Safe to retry.
    #[error("Concurrent modification of {0}")]
    Conflict(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Conflict { entity, id } => EngineError::Conflict(format!("{entity} {id}")),
            other => EngineError::Port(other),
        }
    }
}

/// Result type for engine entry points.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Error Codes
// =============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyCart,
    ItemUnavailable,
    InsufficientStock,
    InsufficientBalance,
    CouponInvalid,
    NotFound,
    IllegalTransition,
    ReasonRequired,
    ValidationError,
    Conflict,
    ServiceUnavailable,
    ConfigError,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Domain(err) => match err {
                CoreError::EmptyCart => ErrorCode::EmptyCart,
                CoreError::ItemUnavailable { .. } => ErrorCode::ItemUnavailable,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
                CoreError::CouponInvalid(_) => ErrorCode::CouponInvalid,
                CoreError::OrderNotFound(_)
                | CoreError::ItemNotFound { .. }
                | CoreError::CartLineNotFound(_) => ErrorCode::NotFound,
                CoreError::IllegalTransition { .. } => ErrorCode::IllegalTransition,
                CoreError::ReasonRequired(_) => ErrorCode::ReasonRequired,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            EngineError::Port(err) => match err {
                PortError::NotFound { .. } => ErrorCode::NotFound,
                PortError::Conflict { .. } => ErrorCode::Conflict,
                PortError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
                PortError::Duplicate(_) => ErrorCode::Conflict,
                PortError::Unavailable(_) => ErrorCode::ServiceUnavailable,
            },
            EngineError::Conflict(_) => ErrorCode::Conflict,
            EngineError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// The domain error, if this failure was a business rule.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            EngineError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// What a caller-facing layer serializes for a failed request.
///
/// ```json
/// { "code": "COUPON_INVALID", "message": "Coupon invalid: coupon has expired" }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        if let EngineError::Port(PortError::Unavailable(detail)) = err {
            // collaborator internals stay in the log
            tracing::error!(detail = %detail, "Collaborator failure");
            return ErrorBody {
                code: ErrorCode::ServiceUnavailable,
                message: "Service temporarily unavailable".to_string(),
            };
        }
        ErrorBody {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::CouponRejection;

    #[test]
    fn test_port_conflict_becomes_engine_conflict() {
        let err: EngineError = PortError::conflict("Order", "o1").into();
        assert!(matches!(err, EngineError::Conflict(ref what) if what == "Order o1"));
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn test_error_body_serialization() {
        let err = EngineError::from(CoreError::CouponInvalid(CouponRejection::Expired));
        let body = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(body["code"], "COUPON_INVALID");
        assert_eq!(body["message"], "Coupon invalid: coupon has expired");
    }

    #[test]
    fn test_unavailable_hides_detail() {
        let err = EngineError::from(PortError::Unavailable("disk I/O error".into()));
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, ErrorCode::ServiceUnavailable);
        assert!(!body.message.contains("disk"));
    }
}
