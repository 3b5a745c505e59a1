//! # Order Lifecycle Entry Points
//!
//! ## Item Transition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock(order)                                                            │
//! │   1. load order (ownership checked for customer calls)                 │
//! │   2. resolve the order's coupon (revocation check)                     │
//! │   3. apply_item_status ─── NoOp? ──► return, nothing else happens      │
//! │   4. post wallet credit             failure aborts, order untouched    │
//! │   5. save (version checked)         failure reverses the credit        │
//! │  ───────────────── committed ──────────────────────────────────────────  │
//! │   6. restock                        failure logged                     │
//! │   7. notify                         fire-and-forget                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::engine::OrderEngine;
use crate::error::EngineResult;
use crate::notify::ItemStatusNotice;
use storefront_core::lifecycle::{self, apply_item_status};
use storefront_core::{
    Actor, Coupon, CoreError, ItemStatus, Money, Order, RefundBreakdown, StockRelease,
    WalletTransaction,
};

/// What an item transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// The order as saved.
    pub order: Order,
    pub refund: Option<RefundBreakdown>,
    pub restocked: Vec<StockRelease>,
    /// The notice dispatched to the customer, if any.
    pub notice: Option<ItemStatusNotice>,
}

/// What a whole-order cancellation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    pub order: Order,
    /// Amount credited back to the wallet.
    pub refunded: Money,
    pub restocked: Vec<StockRelease>,
}

impl OrderEngine {
    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_order(&self, user_id: &str, order_id: &str) -> EngineResult<Order> {
        self.load_order(order_id, Some(user_id)).await
    }

    /// A customer's orders, newest first.
    pub async fn list_orders(&self, user_id: &str) -> EngineResult<Vec<Order>> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    // =========================================================================
    // Item Transitions
    // =========================================================================

    /// Customer cancels one item before delivery.
    pub async fn cancel_item(
        &self,
        user_id: &str,
        order_id: &str,
        item_id: &str,
    ) -> EngineResult<TransitionOutcome> {
        self.transition_item(
            Some(user_id),
            order_id,
            item_id,
            ItemStatus::Cancelled,
            Actor::Customer,
            None,
        )
        .await
    }

    /// Customer asks to return one delivered item.
    pub async fn return_item(
        &self,
        user_id: &str,
        order_id: &str,
        item_id: &str,
        reason: Option<&str>,
    ) -> EngineResult<TransitionOutcome> {
        self.transition_item(
            Some(user_id),
            order_id,
            item_id,
            ItemStatus::ReturnRequested,
            Actor::Customer,
            reason,
        )
        .await
    }

    /// Admin moves an item to any legal status.
    pub async fn set_item_status(
        &self,
        order_id: &str,
        item_id: &str,
        status: ItemStatus,
        reason: Option<&str>,
    ) -> EngineResult<TransitionOutcome> {
        self.transition_item(None, order_id, item_id, status, Actor::Admin, reason)
            .await
    }

    async fn transition_item(
        &self,
        owner: Option<&str>,
        order_id: &str,
        item_id: &str,
        to: ItemStatus,
        actor: Actor,
        reason: Option<&str>,
    ) -> EngineResult<TransitionOutcome> {
        let _guard = self.order_locks.lock(order_id).await;
        let mut order = self.load_order(order_id, owner).await?;
        let coupon = self.order_coupon(&order).await?;

        let change =
            apply_item_status(&mut order, item_id, to, actor, reason, coupon.as_ref(), Utc::now())?;

        if change.is_noop() {
            debug!(order_id = %order_id, item_id = %item_id, status = %to, "Status unchanged");
            return Ok(TransitionOutcome {
                order,
                refund: None,
                restocked: Vec::new(),
                notice: None,
            });
        }

        if let Some(credit) = &change.wallet_credit {
            self.wallet.post(credit).await?;
            info!(
                order_id = %order_id,
                item_id = %item_id,
                amount = %credit.amount,
                "Refund credited to wallet"
            );
        }

        self.save_order(&mut order, change.wallet_credit.as_ref()).await?;

        info!(
            order_id = %order_id,
            item_id = %item_id,
            from = %change.from,
            to = %change.to,
            order_status = %order.order_status,
            "Item status updated"
        );

        let restocked: Vec<StockRelease> = change.restock.iter().cloned().collect();
        self.restock(order_id, &restocked).await;

        let notice = ItemStatusNotice::for_change(&order, &change);
        self.dispatcher.dispatch(notice.clone());

        Ok(TransitionOutcome {
            order,
            refund: change.refund,
            restocked,
            notice: Some(notice),
        })
    }

    // =========================================================================
    // Order-Level Operations
    // =========================================================================

    /// Cancels every remaining item of a not-yet-delivered order.
    ///
    /// A paid order gets its outstanding total credited back and its coupon
    /// redemption released, so the coupon can be used again.
    pub async fn cancel_order(&self, user_id: &str, order_id: &str) -> EngineResult<CancelOutcome> {
        let _guard = self.order_locks.lock(order_id).await;
        let mut order = self.load_order(order_id, Some(user_id)).await?;

        let cancellation = lifecycle::cancel_order(&mut order, Utc::now())?;

        if let Some(credit) = &cancellation.wallet_credit {
            self.wallet.post(credit).await?;
        }
        self.save_order(&mut order, cancellation.wallet_credit.as_ref())
            .await?;

        info!(
            order_id = %order_id,
            items = cancellation.cancelled_items.len(),
            refunded = %cancellation.refunded,
            "Order cancelled"
        );

        self.restock(order_id, &cancellation.restock).await;

        if order.coupon_code.is_some() {
            if let Err(e) = self.coupons.release_for_order(order_id).await {
                warn!(order_id = %order_id, error = %e, "Coupon redemption release failed");
            }
        }

        Ok(CancelOutcome {
            order,
            refunded: cancellation.refunded,
            restocked: cancellation.restock,
        })
    }

    /// Flags every delivered item of a completed order for return.
    pub async fn request_return(
        &self,
        user_id: &str,
        order_id: &str,
        reason: Option<&str>,
    ) -> EngineResult<Order> {
        let _guard = self.order_locks.lock(order_id).await;
        let mut order = self.load_order(order_id, Some(user_id)).await?;

        let items = lifecycle::request_return(&mut order, reason, Utc::now())?;
        self.save_order(&mut order, None).await?;

        info!(order_id = %order_id, items = items.len(), "Return requested");
        Ok(order)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Loads an order; `owner` restricts it to one customer.
    ///
    /// Someone else's order is reported exactly like a missing one.
    async fn load_order(&self, order_id: &str, owner: Option<&str>) -> EngineResult<Order> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .filter(|o| owner.map_or(true, |user| o.customer.id == user))
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        Ok(order)
    }

    async fn order_coupon(&self, order: &Order) -> EngineResult<Option<Coupon>> {
        match order.coupon_code.as_deref() {
            Some(code) => Ok(self.coupons.resolve(code).await?),
            None => Ok(None),
        }
    }

    /// Versioned save. If it fails after a refund credit was posted, the
    /// credit is reversed so the ledger matches the unchanged order.
    async fn save_order(
        &self,
        order: &mut Order,
        posted_credit: Option<&WalletTransaction>,
    ) -> EngineResult<()> {
        match self.orders.save(order).await {
            Ok(version) => {
                order.version = version;
                Ok(())
            }
            Err(e) => {
                if let Some(credit) = posted_credit {
                    self.reverse_credit(&order.id, credit).await;
                }
                Err(e.into())
            }
        }
    }

    async fn reverse_credit(&self, order_id: &str, credit: &WalletTransaction) {
        let debit = WalletTransaction::debit(
            credit.user_id.clone(),
            credit.amount,
            format!("Reversal: {}", credit.description),
        );
        if let Err(e) = self.wallet.post(&debit).await {
            error!(
                order_id = %order_id,
                user_id = %credit.user_id,
                amount = %credit.amount,
                error = %e,
                "Refund credit could not be reversed after a failed save"
            );
        }
    }

    async fn restock(&self, order_id: &str, releases: &[StockRelease]) {
        for release in releases {
            if let Err(e) = self
                .catalog
                .adjust_stock(
                    &release.product_id,
                    release.size.as_deref(),
                    i64::from(release.quantity),
                )
                .await
            {
                warn!(
                    order_id = %order_id,
                    product_id = %release.product_id,
                    quantity = release.quantity,
                    error = %e,
                    "Restock failed"
                );
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
