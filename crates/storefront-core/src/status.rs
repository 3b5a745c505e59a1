//! # Item State Machine
//!
//! Every order line moves through a closed set of fulfillment states.
//! Legal moves are decided by [`check_transition`], and the order-level
//! status is always recomputed from the item states by [`reduce_order_status`].
//!
//! ## State Diagram
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pending ─► Processing ─► Shipped ─► Out for Delivery ─► Delivered      │
//! │     │           │            │              │                │          │
//! │     └───────────┴────────────┴──────────────┘                │          │
//! │                        │                                     ▼          │
//! │                        ▼                            Return Requested    │
//! │                   Cancelled ■                         │          │      │
//! │                                                       ▼          ▼      │
//! │                                                  Returned ■  Return     │
//! │                                                              Rejected ■ │
//! │                                                                         │
//! │  ■ = terminal. Forward moves may skip stages (admin only).             │
//! │  Cancel: customer or admin, any pre-Delivered state.                   │
//! │  Return request: customer (or admin) from Delivered.                   │
//! │  Return decision: admin only; rejection needs a reason.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::order::OrderStatus;

// =============================================================================
// Item Status
// =============================================================================

/// Fulfillment state of a single order line.
///
/// Serialized with the display names the storefront uses
/// (`"Out for Delivery"`, `"Return Requested"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ItemStatus {
    Pending,
    Processing,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
    #[serde(rename = "Return Requested")]
    ReturnRequested,
    Returned,
    #[serde(rename = "Return Rejected")]
    ReturnRejected,
}

impl ItemStatus {
    /// All nine states, in lifecycle order.
    pub const ALL: [ItemStatus; 9] = [
        ItemStatus::Pending,
        ItemStatus::Processing,
        ItemStatus::Shipped,
        ItemStatus::OutForDelivery,
        ItemStatus::Delivered,
        ItemStatus::Cancelled,
        ItemStatus::ReturnRequested,
        ItemStatus::Returned,
        ItemStatus::ReturnRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pending",
            ItemStatus::Processing => "Processing",
            ItemStatus::Shipped => "Shipped",
            ItemStatus::OutForDelivery => "Out for Delivery",
            ItemStatus::Delivered => "Delivered",
            ItemStatus::Cancelled => "Cancelled",
            ItemStatus::ReturnRequested => "Return Requested",
            ItemStatus::Returned => "Returned",
            ItemStatus::ReturnRejected => "Return Rejected",
        }
    }

    /// Parses a display name back into a status.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// No transition leaves these states.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Cancelled | ItemStatus::Returned | ItemStatus::ReturnRejected
        )
    }

    /// Still on the way to the customer (cancellable).
    #[inline]
    pub fn is_pre_delivery(&self) -> bool {
        self.forward_rank().is_some() && *self != ItemStatus::Delivered
    }

    /// Counts toward the order for refund purposes: not cancelled,
    /// returned or rejected.
    ///
    /// Delivered and Return Requested items are still active here.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Money for this line has gone back to the customer.
    #[inline]
    pub fn is_refunded(&self) -> bool {
        matches!(self, ItemStatus::Cancelled | ItemStatus::Returned)
    }

    /// Position on the happy path, `None` for the return/cancel branch.
    fn forward_rank(&self) -> Option<u8> {
        match self {
            ItemStatus::Pending => Some(0),
            ItemStatus::Processing => Some(1),
            ItemStatus::Shipped => Some(2),
            ItemStatus::OutForDelivery => Some(3),
            ItemStatus::Delivered => Some(4),
            _ => None,
        }
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Pending
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Transition Table
// =============================================================================

/// Who is asking for the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Admin,
}

/// The kind of move a legal status change represents.
///
/// The engine uses this to decide which side effects to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals current status. No side effects at all.
    NoOp,
    /// Forward along the fulfillment path.
    Advance,
    /// Pre-delivery cancellation. Restock + refund.
    Cancel,
    /// Delivered item flagged for return.
    RequestReturn,
    /// Return accepted. Restock + refund.
    AcceptReturn,
    /// Return refused. Needs a reason.
    RejectReturn,
}

impl Transition {
    /// Whether this move restocks the line and runs the refund calculator.
    #[inline]
    pub fn releases_item(&self) -> bool {
        matches!(self, Transition::Cancel | Transition::AcceptReturn)
    }
}

/// Decides whether `actor` may move an item from `from` to `to`.
///
/// ## Rules
/// - `from == to` is always a [`Transition::NoOp`]
/// - Nothing leaves a terminal state
/// - Forward progression is admin-only, may skip stages, never goes back
/// - Cancellation is open to both actors while the item is pre-Delivered
/// - Return requests start from Delivered only
/// - Return decisions are admin-only; a rejection needs a non-empty reason
///
/// ## Example
/// ```rust
/// use storefront_core::status::{check_transition, Actor, ItemStatus, Transition};
///
/// let t = check_transition(ItemStatus::Pending, ItemStatus::Cancelled, Actor::Customer, None);
/// assert_eq!(t.unwrap(), Transition::Cancel);
///
/// let t = check_transition(ItemStatus::Pending, ItemStatus::ReturnRequested, Actor::Customer, None);
/// assert!(t.is_err());
/// ```
pub fn check_transition(
    from: ItemStatus,
    to: ItemStatus,
    actor: Actor,
    reason: Option<&str>,
) -> CoreResult<Transition> {
    if from == to {
        return Ok(Transition::NoOp);
    }

    let illegal = || CoreError::IllegalTransition {
        from: from.to_string(),
        to: to.to_string(),
    };

    // a rejection without a reason is refused before legality is considered
    if to == ItemStatus::ReturnRejected && reason.map_or(true, |r| r.trim().is_empty()) {
        return Err(CoreError::ReasonRequired(to.to_string()));
    }

    if from.is_terminal() {
        return Err(illegal());
    }

    match to {
        ItemStatus::Cancelled if from.is_pre_delivery() => Ok(Transition::Cancel),

        ItemStatus::ReturnRequested if from == ItemStatus::Delivered => {
            Ok(Transition::RequestReturn)
        }

        ItemStatus::Returned if from == ItemStatus::ReturnRequested && actor == Actor::Admin => {
            Ok(Transition::AcceptReturn)
        }

        ItemStatus::ReturnRejected
            if from == ItemStatus::ReturnRequested && actor == Actor::Admin =>
        {
            Ok(Transition::RejectReturn)
        }

        _ => match (from.forward_rank(), to.forward_rank()) {
            (Some(current), Some(target)) if target > current && actor == Actor::Admin => {
                Ok(Transition::Advance)
            }
            _ => Err(illegal()),
        },
    }
}

// =============================================================================
// Global Status Reducer
// =============================================================================

/// Derives the order-level status from the item statuses.
///
/// ## Precedence
/// 1. Any Return Requested → `ReturnRequested`
/// 2. Any Pending/Processing/Shipped/Out for Delivery → `Pending`
/// 3. Otherwise → `Completed`
///
/// Never looks at payment state.
///
/// ## Example
/// ```rust
/// use storefront_core::order::OrderStatus;
/// use storefront_core::status::{reduce_order_status, ItemStatus};
///
/// let status = reduce_order_status([ItemStatus::Delivered, ItemStatus::Cancelled]);
/// assert_eq!(status, OrderStatus::Completed);
/// ```
pub fn reduce_order_status<I>(statuses: I) -> OrderStatus
where
    I: IntoIterator<Item = ItemStatus>,
{
    let mut any_open = false;

    for status in statuses {
        if status == ItemStatus::ReturnRequested {
            return OrderStatus::ReturnRequested;
        }
        if status.is_pre_delivery() {
            any_open = true;
        }
    }

    if any_open {
        OrderStatus::Pending
    } else {
        OrderStatus::Completed
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&OutForDelivery).unwrap();
        assert_eq!(json, "\"Out for Delivery\"");
        let parsed: ItemStatus = serde_json::from_str("\"Return Rejected\"").unwrap();
        assert_eq!(parsed, ReturnRejected);
        assert_eq!(ItemStatus::parse("Return Requested"), Some(ReturnRequested));
        assert_eq!(ItemStatus::parse("Lost"), None);
    }

    #[test]
    fn test_reducer_precedence() {
        assert_eq!(
            reduce_order_status([Delivered, ReturnRequested]),
            OrderStatus::ReturnRequested
        );
        assert_eq!(
            reduce_order_status([Delivered, Cancelled]),
            OrderStatus::Completed
        );
        assert_eq!(reduce_order_status([Pending, Delivered]), OrderStatus::Pending);
        // return request outranks open lines
        assert_eq!(
            reduce_order_status([Shipped, ReturnRequested]),
            OrderStatus::ReturnRequested
        );
        assert_eq!(
            reduce_order_status([Returned, ReturnRejected, Cancelled]),
            OrderStatus::Completed
        );
    }

    #[test]
    fn test_noop_always_allowed() {
        for status in ItemStatus::ALL {
            assert_eq!(
                check_transition(status, status, Actor::Customer, None).unwrap(),
                Transition::NoOp
            );
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [Cancelled, Returned, ReturnRejected] {
            for to in ItemStatus::ALL.into_iter().filter(|s| *s != from) {
                let result = check_transition(from, to, Actor::Admin, Some("reason"));
                assert!(
                    matches!(result, Err(CoreError::IllegalTransition { .. })),
                    "{from} -> {to} should be illegal"
                );
            }
        }
    }

    #[test]
    fn test_forward_progression() {
        assert_eq!(
            check_transition(Pending, Shipped, Actor::Admin, None).unwrap(),
            Transition::Advance
        );
        assert_eq!(
            check_transition(OutForDelivery, Delivered, Actor::Admin, None).unwrap(),
            Transition::Advance
        );
        // no going back
        assert!(check_transition(Shipped, Processing, Actor::Admin, None).is_err());
        assert!(check_transition(Delivered, Pending, Actor::Admin, None).is_err());
        // customers cannot push fulfillment
        assert!(check_transition(Pending, Processing, Actor::Customer, None).is_err());
    }

    #[test]
    fn test_cancellation_window() {
        for from in [Pending, Processing, Shipped, OutForDelivery] {
            assert_eq!(
                check_transition(from, Cancelled, Actor::Customer, None).unwrap(),
                Transition::Cancel
            );
        }
        assert!(check_transition(Delivered, Cancelled, Actor::Admin, None).is_err());
        assert!(check_transition(ReturnRequested, Cancelled, Actor::Admin, None).is_err());
    }

    #[test]
    fn test_return_flow() {
        assert!(matches!(
            check_transition(Pending, ReturnRequested, Actor::Customer, None),
            Err(CoreError::IllegalTransition { .. })
        ));
        assert_eq!(
            check_transition(Delivered, ReturnRequested, Actor::Customer, None).unwrap(),
            Transition::RequestReturn
        );
        assert_eq!(
            check_transition(ReturnRequested, Returned, Actor::Admin, None).unwrap(),
            Transition::AcceptReturn
        );
        // only admins decide returns
        assert!(check_transition(ReturnRequested, Returned, Actor::Customer, None).is_err());
        // returns must be requested first
        assert!(check_transition(Delivered, Returned, Actor::Admin, None).is_err());
    }

    #[test]
    fn test_rejection_requires_reason() {
        assert_eq!(
            check_transition(ReturnRequested, ReturnRejected, Actor::Admin, None),
            Err(CoreError::ReasonRequired("Return Rejected".to_string()))
        );
        assert!(matches!(
            check_transition(ReturnRequested, ReturnRejected, Actor::Admin, Some("  ")),
            Err(CoreError::ReasonRequired(_))
        ));
        assert_eq!(
            check_transition(ReturnRequested, ReturnRejected, Actor::Admin, Some("worn"))
                .unwrap(),
            Transition::RejectReturn
        );
        // the missing reason is reported even when the move is illegal anyway
        assert!(matches!(
            check_transition(Pending, ReturnRejected, Actor::Admin, None),
            Err(CoreError::ReasonRequired(_))
        ));
    }

    #[test]
    fn test_releases_item() {
        assert!(Transition::Cancel.releases_item());
        assert!(Transition::AcceptReturn.releases_item());
        assert!(!Transition::RejectReturn.releases_item());
        assert!(!Transition::NoOp.releases_item());
    }
}
