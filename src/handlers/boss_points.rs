use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/balance", get(balance))
        .route("/shop", get(shop))
        .route("/characters", get(characters))
        .route("/purchase", post(purchase))
}

async fn balance(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<impl IntoResponse, ServiceError> {
    let balance = state.services.boss_points.balance(session.account_id).await?;
    Ok(success_response(serde_json::json!({ "balance": balance })))
}

async fn shop(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.boss_points.shop().await?;
    Ok(success_response(items))
}

async fn characters(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<impl IntoResponse, ServiceError> {
    let characters = state
        .services
        .boss_points
        .characters(session.account_id)
        .await?;
    Ok(success_response(characters))
}

#[derive(Debug, Deserialize)]
struct PurchaseRequest {
    catalog_item_id: Uuid,
    character_id: i32,
    chosen_variant: Option<i32>,
}

async fn purchase(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(payload): Json<PurchaseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .services
        .boss_points
        .purchase(
            session.account_id,
            payload.character_id,
            payload.catalog_item_id,
            payload.chosen_variant,
        )
        .await?;
    Ok(success_response(result))
}
