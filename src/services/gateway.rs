//! Payment gateway adapter: a pure translation boundary to the hosted
//! payment provider. No business state lives here; provider-side validation
//! failures surface as typed errors, never as panics across the boundary.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Payment status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Approved,
    Rejected,
    Cancelled,
    Pending,
    InProcess,
    /// Anything the provider adds later; treated like `Pending`.
    #[serde(other)]
    Unknown,
}

impl GatewayPaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            "pending" => Self::Pending,
            "in_process" => Self::InProcess,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Pending => "pending",
            Self::InProcess => "in_process",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub order_id: Uuid,
    pub total: Decimal,
    pub payer_email: String,
    pub description: String,
    pub currency: String,
}

/// Hosted checkout session handle returned by the provider.
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySession {
    pub session_id: String,
    pub redirect_url: String,
    pub sandbox_redirect_url: Option<String>,
}

/// Authoritative payment detail, always fetched server-to-server.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetail {
    pub payment_id: String,
    pub status: GatewayPaymentStatus,
    pub status_detail: Option<String>,
    pub amount: Decimal,
    /// Our order id, echoed back by the provider.
    pub external_reference: Option<String>,
    /// Raw provider payload, persisted verbatim into the payment log.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CardChargeRequest {
    pub order_id: Uuid,
    pub token: String,
    pub amount: Decimal,
    pub payer_email: String,
    pub description: String,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment session scoped to one order.
    async fn create_session(
        &self,
        req: &CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError>;

    /// Fetch full payment detail by provider payment id.
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetail, ServiceError>;

    /// Charge a tokenized card synchronously.
    async fn charge_card(&self, req: &CardChargeRequest) -> Result<PaymentDetail, ServiceError>;
}

/// REST client for a Mercado-Pago-shaped provider API.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: String,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        // The short timeout is what turns a stalled provider into a 502
        // instead of a hung checkout; a client without it is not usable.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("gateway client init: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn map_transport_error(err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::GatewayUnavailable("gateway request timed out".into())
        } else if err.is_connect() {
            ServiceError::GatewayUnavailable("gateway unreachable".into())
        } else {
            ServiceError::GatewayUnavailable(format!("gateway transport error: {}", err))
        }
    }

    /// 4xx means the provider understood and declined; 5xx means it is down.
    async fn check_response(
        response: reqwest::Response,
    ) -> Result<serde_json::Value, ServiceError> {
        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayUnavailable(format!("unreadable response: {}", e)))?;

        if status.is_success() {
            return Ok(body);
        }

        let provider_message = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("request declined")
            .to_string();

        if status.is_client_error() {
            warn!(status = %status, message = %provider_message, "gateway declined request");
            Err(ServiceError::GatewayRejected(provider_message))
        } else {
            Err(ServiceError::GatewayUnavailable(provider_message))
        }
    }

    fn parse_payment_detail(body: serde_json::Value) -> Result<PaymentDetail, ServiceError> {
        let payment_id = match body.get("id") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => {
                return Err(ServiceError::GatewayUnavailable(
                    "payment response missing id".into(),
                ))
            }
        };

        let status = body
            .get("status")
            .and_then(|s| s.as_str())
            .map(GatewayPaymentStatus::parse)
            .unwrap_or(GatewayPaymentStatus::Unknown);

        let status_detail = body
            .get("status_detail")
            .and_then(|s| s.as_str())
            .map(str::to_string);

        let amount = body
            .get("transaction_amount")
            .and_then(|a| a.as_str().map(str::to_string).or_else(|| Some(a.to_string())))
            .and_then(|a| a.parse::<Decimal>().ok())
            .unwrap_or(Decimal::ZERO);

        let external_reference = body
            .get("external_reference")
            .and_then(|r| r.as_str())
            .map(str::to_string);

        Ok(PaymentDetail {
            payment_id,
            status,
            status_detail,
            amount,
            external_reference,
            raw: body,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, req), fields(order_id = %req.order_id))]
    async fn create_session(
        &self,
        req: &CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        let payload = serde_json::json!({
            "items": [{
                "title": req.description,
                "quantity": 1,
                "currency_id": req.currency,
                "unit_price": req.total,
            }],
            "payer": { "email": req.payer_email },
            "external_reference": req.order_id.to_string(),
        });

        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let body = Self::check_response(response).await?;

        let session_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::GatewayUnavailable("preference response missing id".into())
            })?;
        let redirect_url = body
            .get("init_point")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::GatewayUnavailable("preference response missing init_point".into())
            })?;
        let sandbox_redirect_url = body
            .get("sandbox_init_point")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(GatewaySession {
            session_id,
            redirect_url,
            sandbox_redirect_url,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetail, ServiceError> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let body = Self::check_response(response).await?;
        Self::parse_payment_detail(body)
    }

    #[instrument(skip(self, req), fields(order_id = %req.order_id))]
    async fn charge_card(&self, req: &CardChargeRequest) -> Result<PaymentDetail, ServiceError> {
        let payload = serde_json::json!({
            "token": req.token,
            "transaction_amount": req.amount,
            "description": req.description,
            "payer": { "email": req.payer_email },
            "external_reference": req.order_id.to_string(),
        });

        let response = self
            .client
            .post(format!("{}/v1/payments", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let body = Self::check_response(response).await?;
        Self::parse_payment_detail(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn status_parsing_covers_provider_vocabulary() {
        assert_eq!(
            GatewayPaymentStatus::parse("approved"),
            GatewayPaymentStatus::Approved
        );
        assert_eq!(
            GatewayPaymentStatus::parse("rejected"),
            GatewayPaymentStatus::Rejected
        );
        assert_eq!(
            GatewayPaymentStatus::parse("in_process"),
            GatewayPaymentStatus::InProcess
        );
        assert_eq!(
            GatewayPaymentStatus::parse("charged_back"),
            GatewayPaymentStatus::Unknown
        );
    }

    #[test]
    fn payment_detail_parses_numeric_id_and_amount() {
        let body = serde_json::json!({
            "id": 123456789,
            "status": "approved",
            "status_detail": "accredited",
            "transaction_amount": 150.00,
            "external_reference": "5b2c8f1e-0000-0000-0000-000000000000"
        });

        let detail = HttpPaymentGateway::parse_payment_detail(body).unwrap();
        assert_eq!(detail.payment_id, "123456789");
        assert_eq!(detail.status, GatewayPaymentStatus::Approved);
        assert_eq!(detail.status_detail.as_deref(), Some("accredited"));
        assert_eq!(detail.amount, dec!(150.00));
        assert!(detail.external_reference.is_some());
    }

    #[test]
    fn payment_detail_parses_string_id() {
        let body = serde_json::json!({
            "id": "pay_abc",
            "status": "pending",
            "transaction_amount": 10,
        });

        let detail = HttpPaymentGateway::parse_payment_detail(body).unwrap();
        assert_eq!(detail.payment_id, "pay_abc");
        assert_eq!(detail.status, GatewayPaymentStatus::Pending);
        assert_eq!(detail.external_reference, None);
    }

    #[test]
    fn payment_detail_without_id_is_an_error() {
        let body = serde_json::json!({ "status": "approved" });
        assert!(HttpPaymentGateway::parse_payment_detail(body).is_err());
    }

    #[test]
    fn client_construction_surfaces_builder_errors() {
        let gateway = HttpPaymentGateway::new(
            "https://api.gateway.invalid/".to_string(),
            "token".to_string(),
            std::time::Duration::from_secs(5),
        );
        assert!(gateway.is_ok());
    }
}
