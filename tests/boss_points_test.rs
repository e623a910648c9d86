mod common;

use common::{armor_bundle, TestApp};
use otmarket_api::entities::{
    BossPointsPurchase, Order, OrderStatus, PaymentMethod, PlayerDepotItem,
};
use otmarket_api::errors::ServiceError;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn purchase_debits_points_and_delivers() {
    let app = TestApp::new().await;
    app.seed_account(1, 500).await;
    app.seed_character(10, 1, "Sir Knight").await;
    let item = app
        .seed_item_full("boss armor", dec!(10.00), 5, armor_bundle(), None, Some(300))
        .await;

    let result = app
        .services
        .boss_points
        .purchase(1, 10, item.id, None)
        .await
        .unwrap();

    assert_eq!(result.points_spent, 300);
    assert_eq!(result.remaining_balance, 200);
    assert_eq!(result.status, OrderStatus::Delivered);
    assert_eq!(app.services.boss_points.balance(1).await.unwrap(), 200);

    // Order ledger row shares the purchase id and carries no money total.
    let order = Order::find_by_id(result.order_id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(order.payment_method, PaymentMethod::BossPoints);
    assert_eq!(order.total, dec!(0));
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(
        BossPointsPurchase::find_by_id(result.purchase_id)
            .one(&app.db)
            .await
            .unwrap()
            .unwrap()
            .points_spent,
        300
    );

    // Both armor pieces landed in the depot and stock went down by one.
    assert_eq!(PlayerDepotItem::find().count(&app.db).await.unwrap(), 2);
    assert_eq!(app.services.catalog.get(item.id).await.unwrap().stock, 4);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn insufficient_balance_changes_nothing() {
    let app = TestApp::new().await;
    app.seed_account(1, 100).await;
    app.seed_character(10, 1, "Sir Knight").await;
    let item = app
        .seed_item_full("boss armor", dec!(10.00), 5, armor_bundle(), None, Some(300))
        .await;

    let err = app
        .services
        .boss_points
        .purchase(1, 10, item.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InsufficientBalance {
            required: 300,
            balance: 100
        }
    ));

    assert_eq!(app.services.boss_points.balance(1).await.unwrap(), 100);
    assert_eq!(Order::find().count(&app.db).await.unwrap(), 0);
    assert_eq!(PlayerDepotItem::find().count(&app.db).await.unwrap(), 0);
    assert_eq!(app.services.catalog.get(item.id).await.unwrap().stock, 5);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn non_redeemable_items_cannot_be_bought_with_points() {
    let app = TestApp::new().await;
    app.seed_account(1, 1000).await;
    app.seed_character(10, 1, "Sir Knight").await;
    let item = app
        .seed_item("money only", dec!(10.00), 5, armor_bundle())
        .await;

    assert!(matches!(
        app.services.boss_points.purchase(1, 10, item.id, None).await,
        Err(ServiceError::InvalidSelection(_))
    ));
    assert_eq!(app.services.boss_points.balance(1).await.unwrap(), 1000);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn last_unit_goes_to_one_buyer_only() {
    let app = TestApp::new().await;
    app.seed_account(1, 500).await;
    app.seed_account(2, 500).await;
    app.seed_character(10, 1, "First").await;
    app.seed_character(20, 2, "Second").await;
    let item = app
        .seed_item_full("unique boss drop", dec!(10.00), 1, armor_bundle(), None, Some(100))
        .await;

    app.services.boss_points.purchase(1, 10, item.id, None).await.unwrap();

    assert!(matches!(
        app.services.boss_points.purchase(2, 20, item.id, None).await,
        Err(ServiceError::OutOfStock { .. })
    ));
    assert_eq!(app.services.boss_points.balance(2).await.unwrap(), 500);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn shop_lists_only_redeemable_in_stock_items() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;

    app.seed_item_full("redeemable", dec!(5.00), 3, armor_bundle(), None, Some(50))
        .await;
    app.seed_item_full("sold out", dec!(5.00), 0, armor_bundle(), None, Some(50))
        .await;
    app.seed_item("money only", dec!(5.00), 3, armor_bundle()).await;

    let shop = app.services.boss_points.shop().await.unwrap();
    assert_eq!(shop.len(), 1);
    assert_eq!(shop[0].name, "redeemable");
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn purchase_requires_own_character() {
    let app = TestApp::new().await;
    app.seed_account(1, 500).await;
    app.seed_account(2, 0).await;
    app.seed_character(20, 2, "Other Player").await;
    let item = app
        .seed_item_full("boss armor", dec!(10.00), 5, armor_bundle(), None, Some(100))
        .await;

    assert!(matches!(
        app.services.boss_points.purchase(1, 20, item.id, None).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert_eq!(app.services.boss_points.balance(1).await.unwrap(), 500);
}
