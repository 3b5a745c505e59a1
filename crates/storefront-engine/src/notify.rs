//! # Customer Notifications
//!
//! Item status notices are fire-and-forget: the triggering transition has
//! already been saved when a notice is dispatched, and a failed notice is
//! only logged.
//!
//! ```text
//! transition saved ──► dispatcher.dispatch(notice)
//!                            │
//!                            ├── disabled?      → dropped (debug!)
//!                            ├── no runtime?    → dropped (warn!)
//!                            ▼
//!                      tokio::spawn ──► Notifier::notify_item_status
//!                                            │
//!                                            └── Err → warn!, nothing else
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::{PortError, PortResult};
use crate::ports::Notifier;
use storefront_core::{ItemChange, ItemStatus, Order};

/// What the customer is told about one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatusNotice {
    pub email: String,
    pub customer_name: String,
    /// Short order reference (last six characters, upper-cased).
    pub order_ref: String,
    pub item_name: String,
    pub status: ItemStatus,
    pub reason: Option<String>,
}

impl ItemStatusNotice {
    pub fn for_change(order: &Order, change: &ItemChange) -> Self {
        Self {
            email: order.customer.email.clone(),
            customer_name: order.customer.name.clone(),
            order_ref: order.short_ref(),
            item_name: change.item_name.clone(),
            status: change.to,
            reason: change.reason.clone(),
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    enabled: bool,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, enabled: bool) -> Self {
        Self { notifier, enabled }
    }

    /// Sends a notice in the background. Never blocks, never fails.
    pub fn dispatch(&self, notice: ItemStatusNotice) {
        if !self.enabled {
            debug!(order_ref = %notice.order_ref, "Notifications disabled, notice dropped");
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(order_ref = %notice.order_ref, "No async runtime, notice dropped");
                return;
            }
        };

        let notifier = Arc::clone(&self.notifier);
        handle.spawn(async move {
            if let Err(e) = notifier.notify_item_status(&notice).await {
                warn!(
                    order_ref = %notice.order_ref,
                    status = %notice.status,
                    error = %e,
                    "Item status notification failed"
                );
            }
        });
    }
}

// =============================================================================
// Notifiers
// =============================================================================

/// Writes notices to the log. The default when no mailer is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_item_status(&self, notice: &ItemStatusNotice) -> PortResult<()> {
        let payload = serde_json::to_string(notice)
            .map_err(|e| PortError::Unavailable(format!("notice encoding: {e}")))?;
        info!(
            email = %notice.email,
            order_ref = %notice.order_ref,
            status = %notice.status,
            payload = %payload,
            "Item status notice"
        );
        Ok(())
    }
}

/// Keeps every notice it receives. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<ItemStatusNotice>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    pub fn notices(&self) -> Vec<ItemStatusNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits briefly for `count` notices to arrive from spawned tasks.
    pub async fn wait_for(&self, count: usize) -> Vec<ItemStatusNotice> {
        for _ in 0..200 {
            if self.notices().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.notices()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_item_status(&self, notice: &ItemStatusNotice) -> PortResult<()> {
        if *self.fail.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(PortError::Unavailable("mailer offline".to_string()));
        }
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
