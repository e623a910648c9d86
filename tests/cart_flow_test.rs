mod common;

use common::{armor_bundle, coin_bundle, TestApp};
use otmarket_api::entities::UNLIMITED_STOCK;
use otmarket_api::errors::ServiceError;
use otmarket_api::models::WeaponVariant;
use rust_decimal_macros::dec;

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn adding_same_item_twice_merges_into_one_line() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let item = app.seed_item("crystal coins", dec!(9.99), 50, coin_bundle()).await;

    app.services.cart.add_item(1, item.id, 2, None).await.unwrap();
    let line = app.services.cart.add_item(1, item.id, 3, None).await.unwrap();

    assert_eq!(line.quantity, 5);
    assert_eq!(app.cart_line_count(1).await, 1);

    let cart = app.services.cart.get_cart(1).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, 5);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn stock_check_uses_resulting_quantity_not_increment() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let item = app.seed_item("rare armor", dec!(20.00), 4, armor_bundle()).await;

    app.services.cart.add_item(1, item.id, 3, None).await.unwrap();

    // 3 already in cart; adding 2 would need 5 of 4.
    let err = app.services.cart.add_item(1, item.id, 2, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::OutOfStock { available: 4, .. }));

    // But one more still fits.
    let line = app.services.cart.add_item(1, item.id, 1, None).await.unwrap();
    assert_eq!(line.quantity, 4);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn unlimited_stock_accepts_any_quantity() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let item = app
        .seed_item("event coins", dec!(1.00), UNLIMITED_STOCK, coin_bundle())
        .await;

    let line = app.services.cart.add_item(1, item.id, 500, None).await.unwrap();
    assert_eq!(line.quantity, 500);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn cart_total_is_exact_decimal_math() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let item = app.seed_item("odd priced", dec!(33.33), 10, coin_bundle()).await;

    app.services.cart.add_item(1, item.id, 3, None).await.unwrap();

    let cart = app.services.cart.get_cart(1).await.unwrap();
    assert_eq!(cart.total, dec!(99.99));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn weapon_choice_item_requires_a_valid_variant() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let item = app
        .seed_item_full(
            "weapon pack",
            dec!(15.00),
            10,
            armor_bundle(),
            Some(vec![
                WeaponVariant {
                    item_id: 2400,
                    name: "magic sword".to_string(),
                },
                WeaponVariant {
                    item_id: 2431,
                    name: "stonecutter axe".to_string(),
                },
            ]),
            None,
        )
        .await;

    // No choice at all.
    assert!(matches!(
        app.services.cart.add_item(1, item.id, 1, None).await,
        Err(ServiceError::InvalidSelection(_))
    ));
    // A weapon the item does not offer.
    assert!(matches!(
        app.services.cart.add_item(1, item.id, 1, Some(1234)).await,
        Err(ServiceError::InvalidSelection(_))
    ));
    // A valid choice.
    let line = app
        .services
        .cart
        .add_item(1, item.id, 1, Some(2431))
        .await
        .unwrap();
    assert_eq!(line.chosen_variant, Some(2431));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn update_to_zero_removes_the_line() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let item = app.seed_item("coins", dec!(5.00), 10, coin_bundle()).await;

    let line = app.services.cart.add_item(1, item.id, 2, None).await.unwrap();
    let updated = app.services.cart.update_item(1, line.id, 0).await.unwrap();

    assert!(updated.is_none());
    assert_eq!(app.cart_line_count(1).await, 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn other_accounts_lines_are_invisible() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    app.seed_account(2, 0).await;
    let item = app.seed_item("coins", dec!(5.00), 10, coin_bundle()).await;

    let line = app.services.cart.add_item(1, item.id, 2, None).await.unwrap();

    // Account 2 cannot update account 1's line.
    assert!(matches!(
        app.services.cart.update_item(2, line.id, 5).await,
        Err(ServiceError::NotFound(_))
    ));
    // An idempotent remove scoped to account 2 leaves the line alone.
    app.services.cart.remove_item(2, line.id).await.unwrap();
    assert_eq!(app.cart_line_count(1).await, 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn remove_and_clear_are_idempotent() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let item = app.seed_item("coins", dec!(5.00), 10, coin_bundle()).await;

    let line = app.services.cart.add_item(1, item.id, 1, None).await.unwrap();
    app.services.cart.remove_item(1, line.id).await.unwrap();
    app.services.cart.remove_item(1, line.id).await.unwrap();

    app.services.cart.clear(1).await.unwrap();
    app.services.cart.clear(1).await.unwrap();
    assert_eq!(app.cart_line_count(1).await, 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn deactivated_items_drop_out_of_the_cart_view() {
    let app = TestApp::new().await;
    app.seed_account(1, 0).await;
    let keep = app.seed_item("keep", dec!(5.00), 10, coin_bundle()).await;
    let gone = app.seed_item("gone", dec!(5.00), 10, coin_bundle()).await;

    app.services.cart.add_item(1, keep.id, 1, None).await.unwrap();
    app.services.cart.add_item(1, gone.id, 1, None).await.unwrap();

    app.services
        .catalog
        .update_item(
            gone.id,
            otmarket_api::services::catalog::UpdateCatalogItemInput {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let cart = app.services.cart.get_cart(1).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].catalog_item_id, keep.id);
    assert_eq!(cart.total, dec!(5.00));
}
