use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthSession;
use crate::errors::ServiceError;
use crate::handlers::common::{
    created_response, no_content_response, success_response, validate_input, PaginationParams,
};
use crate::services::catalog::ListItemsQuery;
use crate::AppState;

/// Storefront and account-facing marketplace routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/:id", get(get_item))
        .route("/cart", get(get_cart).post(add_cart_item).delete(clear_cart))
        .route(
            "/cart/:id",
            axum::routing::put(update_cart_item).delete(remove_cart_item),
        )
        .route("/checkout", post(checkout))
        .route("/process-payment", post(process_payment))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/deliveries", get(list_deliveries))
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListItemsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.catalog.list_active(&query).await?;
    Ok(success_response(items))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.get_active(id).await?;
    Ok(success_response(item))
}

#[derive(Debug, Deserialize, Validate)]
struct AddCartItemRequest {
    catalog_item_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    quantity: i32,
    chosen_variant: Option<i32>,
}

async fn add_cart_item(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let line = state
        .services
        .cart
        .add_item(
            session.account_id,
            payload.catalog_item_id,
            payload.quantity,
            payload.chosen_variant,
        )
        .await?;
    Ok(created_response(line))
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(session.account_id).await?;
    Ok(success_response(cart))
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateCartItemRequest {
    #[validate(range(min = 0, message = "quantity must not be negative"))]
    quantity: i32,
}

async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let line = state
        .services
        .cart
        .update_item(session.account_id, id, payload.quantity)
        .await?;
    Ok(success_response(line))
}

async fn remove_cart_item(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.remove_item(session.account_id, id).await?;
    Ok(no_content_response())
}

async fn clear_cart(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.clear(session.account_id).await?;
    Ok(no_content_response())
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    character_id: i32,
}

async fn checkout(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let confirmation = state
        .services
        .checkout
        .checkout(session.account_id, payload.character_id)
        .await?;
    Ok(created_response(confirmation))
}

#[derive(Debug, Deserialize, Validate)]
struct ProcessPaymentRequest {
    character_id: i32,
    #[validate(length(min = 1, message = "card token must not be empty"))]
    card_token: String,
}

async fn process_payment(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(payload): Json<ProcessPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let result = state
        .services
        .checkout
        .process_card_payment(session.account_id, payload.character_id, &payload.card_token)
        .await?;
    Ok(success_response(result))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = pagination.clamped();
    let orders = state
        .services
        .orders
        .list_for_account(session.account_id, page, per_page)
        .await?;
    Ok(success_response(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_for_account(id, session.account_id)
        .await?;
    Ok(success_response(order))
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<impl IntoResponse, ServiceError> {
    let deliveries = state
        .services
        .delivery
        .history_for_account(session.account_id)
        .await?;
    Ok(success_response(deliveries))
}
