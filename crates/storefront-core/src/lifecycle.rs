//! # Order Lifecycle Mutations
//!
//! Pure, in-memory application of item and order transitions. Each
//! function mutates an order snapshot and returns the side effects the
//! caller must carry out (restock, wallet credit, notification).
//!
//! ## Item Transition Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  check_transition(from, to, actor, reason)                              │
//! │       │                                                                 │
//! │       ├── NoOp ───────────────────────────────► return, nothing changed │
//! │       │                                                                 │
//! │       ├── Cancel / AcceptReturn                                        │
//! │       │     ├── compute_refund (snapshot BEFORE status change)         │
//! │       │     ├── wallet credit if the money was collected               │
//! │       │     └── restock line                                            │
//! │       ▼                                                                 │
//! │  item.status = to                                                      │
//! │  apply_refund → settle_order (reducer + payment status)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::coupon::Coupon;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::order::{Order, OrderStatus, PaymentStatus};
use crate::refund::{apply_refund, compute_refund, refund_is_payable, settle_order, RefundBreakdown};
use crate::status::{check_transition, reduce_order_status, Actor, ItemStatus, Transition};
use crate::validation::validate_reason;
use crate::wallet::WalletTransaction;

// =============================================================================
// Side Effects
// =============================================================================

/// Units to put back into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRelease {
    pub product_id: String,
    pub size: Option<String>,
    pub quantity: u32,
}

/// Result of a single item transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemChange {
    pub transition: Transition,
    pub item_id: String,
    pub item_name: String,
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub reason: Option<String>,
    pub refund: Option<RefundBreakdown>,
    /// Credit to post before the order is saved.
    pub wallet_credit: Option<WalletTransaction>,
    pub restock: Option<StockRelease>,
}

impl ItemChange {
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.transition == Transition::NoOp
    }
}

/// Result of cancelling a whole order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCancellation {
    pub cancelled_items: Vec<String>,
    pub restock: Vec<StockRelease>,
    pub wallet_credit: Option<WalletTransaction>,
    /// Outstanding amount that was refunded (zero when nothing was paid).
    pub refunded: Money,
}

// =============================================================================
// Item Transitions
// =============================================================================

/// Moves one item to `to` on behalf of `actor`.
///
/// `coupon` is the order's coupon as resolved now, used only for the
/// revocation check. On error the order is left untouched.
pub fn apply_item_status(
    order: &mut Order,
    item_id: &str,
    to: ItemStatus,
    actor: Actor,
    reason: Option<&str>,
    coupon: Option<&Coupon>,
    now: DateTime<Utc>,
) -> CoreResult<ItemChange> {
    let reason = validate_reason(reason)?;
    let item = order.item(item_id)?;
    let from = item.status;
    let transition = check_transition(from, to, actor, reason.as_deref())?;

    let mut change = ItemChange {
        transition,
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        from,
        to,
        reason: reason.clone(),
        refund: None,
        wallet_credit: None,
        restock: None,
    };

    if transition == Transition::NoOp {
        return Ok(change);
    }

    if transition.releases_item() {
        let refund = compute_refund(order, item_id, coupon)?;
        if refund_is_payable(order, transition) && refund.amount.is_positive() {
            change.wallet_credit = Some(WalletTransaction::credit(
                order.customer.id.clone(),
                refund.amount,
                refund.description(to),
            ));
        }
        change.restock = Some(StockRelease {
            product_id: item.product_id.clone(),
            size: item.size.clone(),
            quantity: item.quantity,
        });
        change.refund = Some(refund);
    }

    let item = order.item_mut(item_id)?;
    item.status = to;
    match transition {
        Transition::RejectReturn => item.rejection_reason = reason.clone(),
        Transition::RequestReturn => item.return_reason = reason.clone(),
        _ => {}
    }

    if transition == Transition::RequestReturn && reason.is_some() {
        order.return_reason = reason;
    }

    if let Some(refund) = &change.refund {
        apply_refund(order, refund);
    }

    // COD turns Paid only when the whole order settles as Completed
    if to == ItemStatus::Delivered {
        order.delivered_at.get_or_insert(now);
    }

    settle_order(order);
    order.touch(now);
    Ok(change)
}

// =============================================================================
// Order-Level Operations
// =============================================================================

/// Cancels every remaining item of an order that has not been delivered.
///
/// ## Rules
/// - the order must reduce to Pending
/// - every non-cancelled item must still be pre-Delivered
/// - a paid order gets its whole outstanding total back
pub fn cancel_order(order: &mut Order, now: DateTime<Utc>) -> CoreResult<OrderCancellation> {
    let status = reduce_order_status(order.items.iter().map(|i| i.status));
    if status != OrderStatus::Pending {
        return Err(CoreError::IllegalTransition {
            from: status.to_string(),
            to: ItemStatus::Cancelled.to_string(),
        });
    }

    if let Some(blocking) = order
        .items
        .iter()
        .find(|i| i.status != ItemStatus::Cancelled && !i.status.is_pre_delivery())
    {
        return Err(CoreError::IllegalTransition {
            from: blocking.status.to_string(),
            to: ItemStatus::Cancelled.to_string(),
        });
    }

    let mut cancelled_items = Vec::new();
    let mut restock = Vec::new();
    for item in order
        .items
        .iter_mut()
        .filter(|i| i.status != ItemStatus::Cancelled)
    {
        restock.push(StockRelease {
            product_id: item.product_id.clone(),
            size: item.size.clone(),
            quantity: item.quantity,
        });
        cancelled_items.push(item.id.clone());
        item.status = ItemStatus::Cancelled;
    }

    let mut refunded = Money::zero();
    let mut wallet_credit = None;
    if order.payment_status == PaymentStatus::Paid {
        refunded = order.total_amount.clamp_non_negative();
        if refunded.is_positive() {
            wallet_credit = Some(WalletTransaction::credit(
                order.customer.id.clone(),
                refunded,
                format!("Refund Order #{}", order.short_ref()),
            ));
        }
        order.payment_status = PaymentStatus::Refunded;
    }

    order.total_amount = Money::zero();
    order.shipping_cost = Money::zero();
    order.cancelled_at = Some(now);
    order.reduce_status();
    order.touch(now);

    Ok(OrderCancellation {
        cancelled_items,
        restock,
        wallet_credit,
        refunded,
    })
}

/// Flags every delivered item of a completed order for return.
///
/// ## Returns
/// Ids of the items moved to Return Requested.
pub fn request_return(
    order: &mut Order,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<Vec<String>> {
    let reason = validate_reason(reason)?;
    let status = reduce_order_status(order.items.iter().map(|i| i.status));

    let delivered: Vec<String> = order
        .items
        .iter()
        .filter(|i| i.status == ItemStatus::Delivered)
        .map(|i| i.id.clone())
        .collect();

    if status != OrderStatus::Completed || delivered.is_empty() {
        return Err(CoreError::IllegalTransition {
            from: status.to_string(),
            to: OrderStatus::ReturnRequested.to_string(),
        });
    }

    for item in order
        .items
        .iter_mut()
        .filter(|i| i.status == ItemStatus::Delivered)
    {
        item.status = ItemStatus::ReturnRequested;
        item.return_reason = reason.clone();
    }
    order.return_reason = reason;
    order.reduce_status();
    order.touch(now);

    Ok(delivered)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::PaymentMethod;
    use crate::refund::fixtures::order;

    #[test]
    fn test_noop_has_no_side_effects() {
        let mut o = order(&[("a", 450, 500, 1)], 0, None);
        let before = o.clone();
        let change = apply_item_status(
            &mut o,
            "a",
            ItemStatus::Pending,
            Actor::Admin,
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(change.is_noop());
        assert!(change.refund.is_none());
        assert!(change.restock.is_none());
        assert!(change.wallet_credit.is_none());
        assert_eq!(o, before);
    }

    #[test]
    fn test_cancel_paid_item_posts_credit_and_restocks() {
        let mut o = order(&[("a", 450, 500, 1), ("b", 450, 500, 2)], 0, None);
        let change = apply_item_status(
            &mut o,
            "b",
            ItemStatus::Cancelled,
            Actor::Customer,
            None,
            None,
            Utc::now(),
        )
        .unwrap();

        let credit = change.wallet_credit.unwrap();
        assert_eq!(credit.amount, Money::from_major(900));
        assert_eq!(credit.user_id, "u1");
        assert_eq!(
            change.restock,
            Some(StockRelease {
                product_id: "prod-b".to_string(),
                size: Some("M".to_string()),
                quantity: 2,
            })
        );
        assert_eq!(o.total_amount, Money::from_major(450));
        assert_eq!(o.order_status, OrderStatus::Pending);
    }

    #[test]
    fn test_unpaid_cod_cancel_posts_nothing() {
        let mut o = order(&[("a", 450, 500, 1)], 50, None);
        o.payment_method = PaymentMethod::Cod;
        o.payment_status = PaymentStatus::Pending;
        let change = apply_item_status(
            &mut o,
            "a",
            ItemStatus::Cancelled,
            Actor::Customer,
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(change.wallet_credit.is_none());
        assert_eq!(change.refund.unwrap().amount, Money::from_major(500));
        assert_eq!(o.total_amount, Money::zero());
        assert_eq!(o.shipping_cost, Money::zero());
        assert_eq!(o.payment_status, PaymentStatus::Pending);
        assert_eq!(o.order_status, OrderStatus::Completed);
    }

    #[test]
    fn test_cod_delivery_then_return_is_refunded() {
        let now = Utc::now();
        let mut o = order(&[("a", 450, 500, 1), ("b", 300, 300, 1)], 0, None);
        o.payment_method = PaymentMethod::Cod;
        o.payment_status = PaymentStatus::Pending;

        for id in ["a", "b"] {
            apply_item_status(&mut o, id, ItemStatus::Delivered, Actor::Admin, None, None, now)
                .unwrap();
        }
        assert_eq!(o.payment_status, PaymentStatus::Paid);
        assert!(o.delivered_at.is_some());
        assert_eq!(o.order_status, OrderStatus::Completed);

        apply_item_status(
            &mut o,
            "a",
            ItemStatus::ReturnRequested,
            Actor::Customer,
            Some("too small"),
            None,
            now,
        )
        .unwrap();
        assert_eq!(o.order_status, OrderStatus::ReturnRequested);
        assert_eq!(o.items[0].return_reason.as_deref(), Some("too small"));

        let change =
            apply_item_status(&mut o, "a", ItemStatus::Returned, Actor::Admin, None, None, now)
                .unwrap();
        assert_eq!(change.wallet_credit.unwrap().amount, Money::from_major(450));
        assert_eq!(o.order_status, OrderStatus::Completed);
        assert_eq!(o.payment_status, PaymentStatus::Paid);
        assert_eq!(o.total_amount, Money::from_major(300));
    }

    #[test]
    fn test_cod_partial_delivery_does_not_pay_sibling_cancel() {
        let now = Utc::now();
        let mut o = order(&[("a", 450, 500, 1), ("b", 300, 300, 1)], 0, None);
        o.payment_method = PaymentMethod::Cod;
        o.payment_status = PaymentStatus::Pending;

        apply_item_status(&mut o, "a", ItemStatus::Delivered, Actor::Admin, None, None, now)
            .unwrap();
        assert_eq!(o.payment_status, PaymentStatus::Pending);
        assert_eq!(o.order_status, OrderStatus::Pending);

        let change =
            apply_item_status(&mut o, "b", ItemStatus::Cancelled, Actor::Customer, None, None, now)
                .unwrap();
        assert!(change.wallet_credit.is_none());
        assert_eq!(change.refund.unwrap().amount, Money::from_major(300));
        assert_eq!(o.total_amount, Money::from_major(450));
        // settles as Completed with the delivered line kept
        assert_eq!(o.order_status, OrderStatus::Completed);
        assert_eq!(o.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_cod_return_before_settlement_is_credited() {
        let now = Utc::now();
        let mut o = order(&[("a", 450, 500, 1), ("b", 300, 300, 1)], 0, None);
        o.payment_method = PaymentMethod::Cod;
        o.payment_status = PaymentStatus::Pending;

        apply_item_status(&mut o, "a", ItemStatus::Delivered, Actor::Admin, None, None, now)
            .unwrap();
        apply_item_status(
            &mut o,
            "a",
            ItemStatus::ReturnRequested,
            Actor::Customer,
            Some("too small"),
            None,
            now,
        )
        .unwrap();
        let change =
            apply_item_status(&mut o, "a", ItemStatus::Returned, Actor::Admin, None, None, now)
                .unwrap();

        assert_eq!(change.wallet_credit.unwrap().amount, Money::from_major(450));
        assert_eq!(o.order_status, OrderStatus::Pending);
        assert_eq!(o.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_reject_return_stores_reason() {
        let now = Utc::now();
        let mut o = order(&[("a", 450, 500, 1)], 0, None);
        o.items[0].status = ItemStatus::ReturnRequested;

        let err = apply_item_status(
            &mut o,
            "a",
            ItemStatus::ReturnRejected,
            Actor::Admin,
            None,
            None,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ReasonRequired(_)));

        let change = apply_item_status(
            &mut o,
            "a",
            ItemStatus::ReturnRejected,
            Actor::Admin,
            Some("worn"),
            None,
            now,
        )
        .unwrap();
        assert!(change.refund.is_none());
        assert_eq!(o.items[0].rejection_reason.as_deref(), Some("worn"));
        assert_eq!(o.order_status, OrderStatus::Completed);
        assert_eq!(o.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_return_of_pending_item_is_illegal() {
        let mut o = order(&[("a", 450, 500, 1)], 0, None);
        let before = o.clone();
        let err = apply_item_status(
            &mut o,
            "a",
            ItemStatus::ReturnRequested,
            Actor::Customer,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::IllegalTransition { .. }));
        assert_eq!(o, before);
    }

    #[test]
    fn test_cancel_order_refunds_remaining_total() {
        let now = Utc::now();
        let mut o = order(&[("a", 450, 500, 1), ("b", 450, 500, 1)], 0, Some("SAVE10"));
        apply_item_status(&mut o, "a", ItemStatus::Cancelled, Actor::Customer, None, None, now)
            .unwrap();

        let cancellation = cancel_order(&mut o, now).unwrap();
        assert_eq!(cancellation.cancelled_items, vec!["b".to_string()]);
        assert_eq!(cancellation.restock.len(), 1);
        assert_eq!(cancellation.refunded, Money::from_major(450));
        assert_eq!(
            cancellation.wallet_credit.unwrap().description,
            "Refund Order #ABC123"
        );
        assert_eq!(o.total_amount, Money::zero());
        assert_eq!(o.payment_status, PaymentStatus::Refunded);
        assert_eq!(o.order_status, OrderStatus::Completed);
        assert!(o.cancelled_at.is_some());
    }

    #[test]
    fn test_cancel_order_rejected_after_delivery() {
        let mut o = order(&[("a", 450, 500, 1), ("b", 450, 500, 1)], 0, None);
        o.items[0].status = ItemStatus::Delivered;
        assert!(matches!(
            cancel_order(&mut o, Utc::now()),
            Err(CoreError::IllegalTransition { .. })
        ));

        o.items[1].status = ItemStatus::Delivered;
        assert!(cancel_order(&mut o, Utc::now()).is_err());
    }

    #[test]
    fn test_request_return_moves_delivered_items() {
        let mut o = order(&[("a", 450, 500, 1), ("b", 450, 500, 1)], 0, None);
        assert!(request_return(&mut o, Some("wrong colour"), Utc::now()).is_err());

        o.items[0].status = ItemStatus::Delivered;
        o.items[1].status = ItemStatus::Cancelled;
        let moved = request_return(&mut o, Some("wrong colour"), Utc::now()).unwrap();
        assert_eq!(moved, vec!["a".to_string()]);
        assert_eq!(o.order_status, OrderStatus::ReturnRequested);
        assert_eq!(o.return_reason.as_deref(), Some("wrong colour"));
        assert_eq!(o.items[1].status, ItemStatus::Cancelled);
    }
}
