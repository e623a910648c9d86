mod common;

use chrono::{Duration, Utc};
use common::{coin_bundle, TestApp};
use otmarket_api::entities::{order, Order, OrderStatus};
use otmarket_api::errors::ServiceError;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

async fn seed_order(app: &TestApp) -> Uuid {
    app.seed_account(1, 0).await;
    app.seed_character(10, 1, "Sir Knight").await;
    let item = app.seed_item("coins", dec!(10.00), 10, coin_bundle()).await;
    app.services.cart.add_item(1, item.id, 1, None).await.unwrap();
    app.services.checkout.checkout(1, 10).await.unwrap().order_id
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn owners_see_their_orders_others_do_not() {
    let app = TestApp::new().await;
    let order_id = seed_order(&app).await;
    app.seed_account(2, 0).await;

    let detail = app.services.orders.get_for_account(order_id, 1).await.unwrap();
    assert_eq!(detail.items.len(), 1);

    assert!(matches!(
        app.services.orders.get_for_account(order_id, 2).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        app.services.orders.get_for_account(Uuid::new_v4(), 1).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn admin_status_override_respects_the_transition_table() {
    let app = TestApp::new().await;
    let order_id = seed_order(&app).await;

    // pending -> delivered skips approval and must be refused.
    assert!(matches!(
        app.services
            .orders
            .admin_update_status(order_id, OrderStatus::Delivered)
            .await,
        Err(ServiceError::Conflict(_))
    ));

    // pending -> approved -> refunded is a legal support path.
    app.services
        .orders
        .admin_update_status(order_id, OrderStatus::Approved)
        .await
        .unwrap();
    let refunded = app
        .services
        .orders
        .admin_update_status(order_id, OrderStatus::Refunded)
        .await
        .unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);

    // Terminal; nothing moves it again.
    assert!(matches!(
        app.services
            .orders
            .admin_update_status(order_id, OrderStatus::Pending)
            .await,
        Err(ServiceError::Conflict(_))
    ));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn expiry_sweep_cancels_only_stale_pending_orders() {
    let app = TestApp::new().await;
    let fresh_id = seed_order(&app).await;

    // Age a second order past the cutoff by rewriting its created_at.
    let item = app.seed_item("more coins", dec!(5.00), 10, coin_bundle()).await;
    app.services.cart.add_item(1, item.id, 1, None).await.unwrap();
    let stale_id = app.services.checkout.checkout(1, 10).await.unwrap().order_id;
    let stale = Order::find_by_id(stale_id).one(&app.db).await.unwrap().unwrap();
    let mut model: order::ActiveModel = stale.into();
    model.created_at = Set(Utc::now() - Duration::hours(72));
    model.update(&app.db).await.unwrap();

    let expired = app.services.orders.expire_stale_pending_orders(48).await.unwrap();
    assert_eq!(expired, 1);

    let stale = Order::find_by_id(stale_id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(stale.status, OrderStatus::Cancelled);
    let fresh = Order::find_by_id(fresh_id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(fresh.status, OrderStatus::Pending);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn undelivered_report_finds_approved_orders_without_delivery() {
    let app = TestApp::new().await;
    let order_id = seed_order(&app).await;

    // Approved by an admin, but never delivered (e.g. delivery crashed).
    app.services
        .orders
        .admin_update_status(order_id, OrderStatus::Approved)
        .await
        .unwrap();

    let report = app.services.orders.undelivered_report().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].id, order_id);

    // A manual redelivery clears it off the list.
    app.services.reconciliation.redeliver(order_id).await.unwrap();
    let report = app.services.orders.undelivered_report().await.unwrap();
    assert!(report.is_empty());

    let order = Order::find_by_id(order_id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn order_history_pages_newest_first() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    app.seed_character(10, 1, "Sir Knight").await;
    let item = app.seed_item("coins", dec!(5.00), 100, coin_bundle()).await;

    for _ in 0..3 {
        app.services.cart.add_item(1, item.id, 1, None).await.unwrap();
        app.services.checkout.checkout(1, 10).await.unwrap();
    }

    let page = app.services.orders.list_for_account(1, 1, 2).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.orders.len(), 2);

    let page2 = app.services.orders.list_for_account(1, 2, 2).await.unwrap();
    assert_eq!(page2.orders.len(), 1);
}
