//! Gateway webhook endpoint.
//!
//! The notification body is only a hint: the handler pulls the payment id
//! out of it, optionally checks an HMAC signature, and hands the id to
//! reconciliation, which re-fetches the authoritative state server-to-server.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, routing::post, Router};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-signature";

/// Notification envelope: `{"type": "payment", "data": {"id": "..."}}`.
/// The id may arrive as a number or a string.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    id: Option<serde_json::Value>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/mp/webhook", post(handle_webhook))
}

#[instrument(skip_all)]
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = &state.config.gateway_webhook_secret {
        verify_signature(secret, &headers, &body)?;
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("malformed webhook body: {}", e)))?;

    match envelope.kind.as_deref() {
        Some("payment") => {}
        other => {
            // Gateways send topic types we do not care about; acknowledge
            // them so they stop retrying.
            info!(kind = ?other, "ignoring non-payment webhook");
            return Ok(success_response(serde_json::json!({ "status": "ignored" })));
        }
    }

    let payment_id = envelope
        .data
        .and_then(|d| d.id)
        .and_then(|id| match id {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .ok_or_else(|| {
            ServiceError::ValidationError("webhook payload carries no payment id".into())
        })?;

    state.services.reconciliation.on_payment_event(&payment_id).await?;
    Ok(success_response(serde_json::json!({ "status": "processed" })))
}

/// HMAC-SHA256 over the raw body, hex-encoded in the signature header.
/// Comparison goes through the Mac verifier, which is constant-time.
fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), ServiceError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing webhook signature".into()))?;

    let provided = hex::decode(provided.trim())
        .map_err(|_| ServiceError::Unauthorized("malformed webhook signature".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("invalid webhook secret".into()))?;
    mac.update(body);
    mac.verify_slice(&provided).map_err(|_| {
        warn!("webhook signature mismatch");
        ServiceError::Unauthorized("invalid webhook signature".into())
    })
}
