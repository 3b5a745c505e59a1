//! End-to-end order scenarios against the in-memory backend.

use std::sync::Arc;

use storefront_core::{
    Coupon, CoreError, CouponRejection, DiscountRule, ItemStatus, Money, Order, OrderStatus,
    PaymentMethod, PaymentStatus,
};
use storefront_engine::memory::fixtures;
use storefront_engine::ports::{CouponDirectory, OrderStore, Wallet};
use storefront_engine::{EngineConfig, EngineError, MemoryBackend, OrderEngine};

/// Two 500 kits, a 10% coupon (optionally with a quantity floor), checked out.
async fn two_kit_order(
    backend: &MemoryBackend,
    engine: &OrderEngine,
    min_quantity: u32,
    method: PaymentMethod,
) -> Order {
    backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
    backend.catalog.insert(fixtures::product("away", 500, &[("M", 10)])).await;
    let mut coupon = Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 });
    coupon.min_quantity = min_quantity;
    backend.coupons.insert(coupon).await;

    engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
    engine.add_to_cart("u1", "away", "M", 1).await.unwrap();
    let quote = engine.apply_coupon("u1", "SAVE10").await.unwrap();
    assert_eq!(quote.discount_amount, Money::from_major(100));

    engine
        .place_order(fixtures::request("u1", method))
        .await
        .unwrap()
}

fn domain(err: EngineError) -> CoreError {
    match err {
        EngineError::Domain(e) => e,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_discounted_order_and_proportional_cancel() {
    let backend = MemoryBackend::new();
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;

    assert_eq!(order.subtotal, Money::from_major(1000));
    assert_eq!(order.discount_amount, Money::from_major(100));
    assert_eq!(order.shipping_cost, Money::zero());
    assert_eq!(order.total_amount, Money::from_major(900));
    for item in &order.items {
        assert_eq!(item.price, Money::from_major(450));
        assert_eq!(item.original_price, Money::from_major(500));
    }

    let outcome = engine
        .cancel_item("u1", &order.id, &order.items[0].id)
        .await
        .unwrap();
    let refund = outcome.refund.unwrap();
    assert_eq!(refund.amount, Money::from_major(450));
    assert!(!refund.coupon_revoked);
    assert_eq!(outcome.order.total_amount, Money::from_major(450));
    assert_eq!(outcome.order.order_status, OrderStatus::Pending);
    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(450));
}

#[tokio::test]
async fn test_min_quantity_coupon_is_revoked_on_cancel() {
    let backend = MemoryBackend::new();
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 2, PaymentMethod::Online).await;

    let outcome = engine
        .cancel_item("u1", &order.id, &order.items[0].id)
        .await
        .unwrap();
    let refund = outcome.refund.unwrap();

    // survivor now costs its full 500
    assert!(refund.coupon_revoked);
    assert_eq!(refund.amount, Money::from_major(400));
    assert!(refund.amount < order.items[0].paid_total());
    assert_eq!(outcome.order.total_amount, Money::from_major(500));

    let ledger = backend.wallet.ledger("u1").await;
    assert!(ledger[0].description.contains("Coupon Reversal"));
}

#[tokio::test]
async fn test_last_item_refunds_shipping() {
    let backend = MemoryBackend::new();
    backend.catalog.insert(fixtures::product("scarf", 150, &[("M", 10)])).await;
    let engine = backend.engine();
    engine.add_to_cart("u1", "scarf", "M", 2).await.unwrap();
    let order = engine
        .place_order(fixtures::request("u1", PaymentMethod::Online))
        .await
        .unwrap();
    assert_eq!(order.total_amount, Money::from_major(350));

    let outcome = engine
        .cancel_item("u1", &order.id, &order.items[0].id)
        .await
        .unwrap();
    assert_eq!(outcome.refund.unwrap().amount, Money::from_major(350));
    assert_eq!(outcome.order.total_amount, Money::zero());
    assert_eq!(outcome.order.shipping_cost, Money::zero());
    assert_eq!(outcome.order.order_status, OrderStatus::Completed);
    assert_eq!(outcome.order.payment_status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_same_status_is_a_silent_noop() {
    let backend = MemoryBackend::new();
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;
    let stock_before = backend.catalog.size_stock("home", "M").await;

    let outcome = engine
        .set_item_status(&order.id, &order.items[0].id, ItemStatus::Pending, None)
        .await
        .unwrap();

    assert!(outcome.refund.is_none());
    assert!(outcome.notice.is_none());
    assert!(outcome.restocked.is_empty());
    assert_eq!(backend.catalog.size_stock("home", "M").await, stock_before);
    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::zero());
    let stored = backend.orders.get(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.version, order.version);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(backend.notifier.notices().is_empty());
}

#[tokio::test]
async fn test_cod_sibling_cancel_after_partial_delivery_credits_nothing() {
    let backend = MemoryBackend::new();
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Cod).await;

    let delivered = engine
        .set_item_status(&order.id, &order.items[0].id, ItemStatus::Delivered, None)
        .await
        .unwrap();
    assert_eq!(delivered.order.payment_status, PaymentStatus::Pending);

    let outcome = engine
        .cancel_item("u1", &order.id, &order.items[1].id)
        .await
        .unwrap();
    assert_eq!(outcome.refund.unwrap().amount, Money::from_major(450));
    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::zero());
    assert!(backend.wallet.ledger("u1").await.is_empty());
    assert_eq!(outcome.order.order_status, OrderStatus::Completed);
    assert_eq!(outcome.order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_transition_legality() {
    let backend = MemoryBackend::new();
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;
    let item = order.items[0].id.clone();

    let err = engine
        .return_item("u1", &order.id, &item, Some("wrong size"))
        .await
        .unwrap_err();
    assert!(matches!(domain(err), CoreError::IllegalTransition { .. }));

    engine
        .set_item_status(&order.id, &item, ItemStatus::Delivered, None)
        .await
        .unwrap();
    let err = engine.cancel_item("u1", &order.id, &item).await.unwrap_err();
    assert!(matches!(domain(err), CoreError::IllegalTransition { .. }));

    engine
        .return_item("u1", &order.id, &item, Some("wrong size"))
        .await
        .unwrap();
    let err = engine
        .set_item_status(&order.id, &item, ItemStatus::ReturnRejected, None)
        .await
        .unwrap_err();
    assert!(matches!(domain(err), CoreError::ReasonRequired(_)));

    let outcome = engine
        .set_item_status(
            &order.id,
            &item,
            ItemStatus::ReturnRejected,
            Some("worn and washed"),
        )
        .await
        .unwrap();
    let rejected = outcome.order.items.iter().find(|i| i.id == item).unwrap();
    assert_eq!(rejected.rejection_reason.as_deref(), Some("worn and washed"));
    assert!(outcome.refund.is_none());
}

#[tokio::test]
async fn test_return_flow_notifies_customer() {
    let backend = MemoryBackend::new();
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;
    let item = order.items[1].id.clone();

    engine
        .set_item_status(&order.id, &item, ItemStatus::Delivered, None)
        .await
        .unwrap();
    engine
        .return_item("u1", &order.id, &item, Some("too big"))
        .await
        .unwrap();
    let outcome = engine
        .set_item_status(&order.id, &item, ItemStatus::Returned, None)
        .await
        .unwrap();
    assert_eq!(outcome.refund.unwrap().amount, Money::from_major(450));

    let notices = backend.notifier.wait_for(3).await;
    assert_eq!(notices.len(), 3);
    assert!(notices.iter().all(|n| n.order_ref == order.short_ref()));
    assert!(notices.iter().any(|n| n.status == ItemStatus::Returned));
    assert!(notices
        .iter()
        .any(|n| n.status == ItemStatus::ReturnRequested
            && n.reason.as_deref() == Some("too big")));
}

#[tokio::test]
async fn test_notifications_can_be_disabled() {
    let backend = MemoryBackend::new();
    let mut config = EngineConfig::default();
    config.notifications.enabled = false;
    let engine = backend.engine_with(config);
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;

    let outcome = engine
        .cancel_item("u1", &order.id, &order.items[0].id)
        .await
        .unwrap();
    assert!(outcome.notice.is_some());
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(backend.notifier.notices().is_empty());
}

#[tokio::test]
async fn test_wallet_checkout_debits_and_refunds() {
    let backend = MemoryBackend::new();
    backend.wallet.fund("u1", Money::from_major(1000)).await;
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Wallet).await;

    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(100));
    let ledger = backend.wallet.ledger("u1").await;
    assert_eq!(
        ledger[1].description,
        format!("Order Purchase #{}", order.short_ref())
    );

    let outcome = engine.cancel_order("u1", &order.id).await.unwrap();
    assert_eq!(outcome.refunded, Money::from_major(900));
    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(1000));
}

#[tokio::test]
async fn test_coupon_single_use_and_release_on_cancel() {
    let backend = MemoryBackend::new();
    let engine = backend.engine();
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;

    engine.add_to_cart("u1", "home", "M", 2).await.unwrap();
    let err = engine.apply_coupon("u1", "SAVE10").await.unwrap_err();
    assert_eq!(
        domain(err),
        CoreError::CouponInvalid(CouponRejection::AlreadyUsed)
    );

    engine.cancel_order("u1", &order.id).await.unwrap();
    assert!(engine.apply_coupon("u1", "SAVE10").await.is_ok());
}

#[tokio::test]
async fn test_checkout_claim_catches_a_racing_redemption() {
    let backend = MemoryBackend::new();
    backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
    backend
        .coupons
        .insert(Coupon::new("SAVE10", DiscountRule::Percentage { bps: 1000 }))
        .await;
    backend.wallet.fund("u1", Money::from_major(1000)).await;
    let engine = backend.engine();

    engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
    engine.apply_coupon("u1", "SAVE10").await.unwrap();

    // another checkout of the same customer got there first
    backend.coupons.claim("u1", "SAVE10", "other-order").await.unwrap();

    let err = engine
        .place_order(fixtures::request("u1", PaymentMethod::Wallet))
        .await
        .unwrap_err();
    assert_eq!(
        domain(err),
        CoreError::CouponInvalid(CouponRejection::AlreadyUsed)
    );
    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(1000));
    assert!(backend.orders.list_for_user("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_usage_limit_deactivates_coupon() {
    let backend = MemoryBackend::new();
    backend.catalog.insert(fixtures::product("home", 500, &[("M", 10)])).await;
    let mut coupon = Coupon::new("ONCE", DiscountRule::Fixed {
        amount: Money::from_major(50),
    });
    coupon.usage_limit = Some(1);
    backend.coupons.insert(coupon).await;
    let engine = backend.engine();

    engine.add_to_cart("u1", "home", "M", 1).await.unwrap();
    engine.apply_coupon("u1", "ONCE").await.unwrap();
    engine
        .place_order(fixtures::request("u1", PaymentMethod::Online))
        .await
        .unwrap();

    engine.add_to_cart("u2", "home", "M", 1).await.unwrap();
    let err = engine.apply_coupon("u2", "ONCE").await.unwrap_err();
    assert_eq!(domain(err), CoreError::CouponInvalid(CouponRejection::Inactive));
}

#[tokio::test]
async fn test_stock_shortfall_fails_whole_order() {
    let backend = MemoryBackend::new();
    backend.catalog.insert(fixtures::product("home", 500, &[("M", 3)])).await;
    let engine = backend.engine();

    engine.add_to_cart("u1", "home", "M", 3).await.unwrap();
    engine.add_to_cart("u2", "home", "M", 2).await.unwrap();
    engine
        .place_order(fixtures::request("u1", PaymentMethod::Online))
        .await
        .unwrap();

    let err = engine
        .place_order(fixtures::request("u2", PaymentMethod::Online))
        .await
        .unwrap_err();
    assert!(matches!(
        domain(err),
        CoreError::InsufficientStock { available: 0, requested: 2, .. }
    ));
}

#[tokio::test]
async fn test_concurrent_cancels_refund_once() {
    let backend = MemoryBackend::new();
    let engine = Arc::new(backend.engine());
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;
    let item = order.items[0].id.clone();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let (engine, order_id, item) = (engine.clone(), order.id.clone(), item.clone());
        tasks.push(tokio::spawn(async move {
            engine.cancel_item("u1", &order_id, &item).await.unwrap()
        }));
    }
    let mut refunds = 0;
    for task in tasks {
        if task.await.unwrap().refund.is_some() {
            refunds += 1;
        }
    }

    assert_eq!(refunds, 1);
    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(450));
    assert_eq!(backend.catalog.size_stock("home", "M").await, Some(10));
}

#[tokio::test]
async fn test_concurrent_cancels_of_different_items() {
    let backend = MemoryBackend::new();
    let engine = Arc::new(backend.engine());
    let order = two_kit_order(&backend, &engine, 0, PaymentMethod::Online).await;

    let tasks: Vec<_> = order
        .items
        .iter()
        .map(|item| {
            let (engine, order_id, item_id) = (engine.clone(), order.id.clone(), item.id.clone());
            tokio::spawn(async move { engine.cancel_item("u1", &order_id, &item_id).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = backend.orders.get(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.total_amount, Money::zero());
    assert_eq!(stored.payment_status, PaymentStatus::Refunded);
    assert_eq!(backend.wallet.balance("u1").await.unwrap(), Money::from_major(900));
}
