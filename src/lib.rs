//! Marketplace backend for an Open Tibia game server: catalog, cart,
//! checkout, payment reconciliation, and in-game depot delivery.

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Extension, Json, Router};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use auth::AuthService;
use config::AppConfig;
use db::DbPool;
use events::EventSender;
use services::AppServices;

/// Shared application state threaded through every handler.
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
}

/// Build the full application router.
pub fn app_router(state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let cors = build_cors(&state.config);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .nest("/marketplace", handlers::marketplace::routes())
        .nest("/marketplace", handlers::webhooks::routes())
        .nest("/admin/marketplace", handlers::admin::routes())
        .nest("/boss-points", handlers::boss_points::routes())
        .layer(Extension(auth_service))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .with_state(state)
}

/// CORS from config; only development falls back to a permissive policy.
fn build_cors(config: &AppConfig) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<axum::http::HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None if config.is_development() => CorsLayer::permissive(),
        None => CorsLayer::new(),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> axum::response::Response {
    match state.db.ping().await {
        Ok(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "health check failed to reach database");
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "degraded", "database": "unreachable" })),
            )
                .into_response()
        }
    }
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}
