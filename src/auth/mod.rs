//! Bearer-token verification.
//!
//! Sessions are issued by the site's external auth layer; this crate only
//! verifies the JWT and exposes the claims to handlers through extractors.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Game account id, stringified.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub admin: bool,
    pub exp: usize,
    pub iat: usize,
}

/// Verifies tokens minted by the external session layer. Shares one secret
/// with it (HS256).
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ServiceError::Unauthorized(format!("invalid session token: {}", e)))
    }

    /// Mint a token. The production issuer lives in the session layer; this
    /// exists for local tooling and the test harness.
    pub fn issue_token(
        &self,
        account_id: i32,
        email: Option<String>,
        admin: bool,
        ttl_secs: i64,
    ) -> Result<String, ServiceError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: account_id.to_string(),
            email,
            admin,
            exp: (now + ttl_secs) as usize,
            iat: now as usize,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {}", e)))
    }
}

/// Authenticated account session, extracted from the `Authorization: Bearer`
/// header of any route that requires login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account_id: i32,
    pub email: Option<String>,
    pub is_admin: bool,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or_else(|| ServiceError::InternalError("auth service not configured".into()))?;

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("expected bearer token".into()))?
            .trim();

        let claims = auth_service.validate_token(token)?;
        let account_id = claims
            .sub
            .parse::<i32>()
            .map_err(|_| ServiceError::Unauthorized("malformed subject claim".into()))?;

        Ok(AuthSession {
            account_id,
            email: claims.email,
            is_admin: claims.admin,
        })
    }
}

/// Admin-only session; rejects authenticated non-admin callers with 403.
#[derive(Debug, Clone)]
pub struct AdminSession(pub AuthSession);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = AuthSession::from_request_parts(parts, state).await?;
        if !session.is_admin {
            return Err(ServiceError::Forbidden(
                "administrator privileges required".into(),
            ));
        }
        Ok(AdminSession(session))
    }
}
