use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::entities::OrderStatus;
use crate::errors::ServiceError;
use crate::handlers::common::{
    created_response, no_content_response, success_response, PaginationParams,
};
use crate::services::catalog::{CreateCatalogItemInput, DeleteOutcome, UpdateCatalogItemInput};
use crate::AppState;

/// Back-office routes; every handler requires the admin claim.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/orders", get(list_orders))
        .route("/orders/undelivered", get(undelivered_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/redeliver", post(redeliver_order))
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.catalog.list_all().await?;
    Ok(success_response(items))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.get(id).await?;
    Ok(success_response(item))
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Json(input): Json<CreateCatalogItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.create_item(input).await?;
    Ok(created_response(item))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCatalogItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.update_item(id, input).await?;
    Ok(success_response(item))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, ServiceError> {
    match state.services.catalog.delete_item(id).await? {
        DeleteOutcome::Deleted => Ok(no_content_response().into_response()),
        DeleteOutcome::Deactivated => Ok(success_response(serde_json::json!({
            "status": "deactivated",
            "reason": "item is referenced by existing orders"
        }))
        .into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct OrderListQuery {
    status: Option<OrderStatus>,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Query(query): Query<OrderListQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = pagination.clamped();
    let orders = state
        .services
        .orders
        .admin_list(query.status, page, per_page)
        .await?;
    Ok(success_response(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.admin_get(id).await?;
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: OrderStatus,
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .admin_update_status(id, payload.status)
        .await?;
    Ok(success_response(order))
}

async fn undelivered_orders(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.undelivered_report().await?;
    Ok(success_response(orders))
}

async fn redeliver_order(
    State(state): State<Arc<AppState>>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.reconciliation.redeliver(id).await?;
    let order = state.services.orders.admin_get(id).await?;
    Ok(success_response(order))
}
