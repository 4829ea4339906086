//! Caller identity extractor
//!
//! Wraps the pure signature checks from `aeth_common::api` for axum.
//! Only handlers that take [`AuthenticatedUser`] require identity.

use aeth_common::api::{now_millis, validate_signature, validate_timestamp, SIGNATURE_WINDOW_MS};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{ApiError, AppState};

pub const USER_HEADER: &str = "x-aeth-user";
pub const TIMESTAMP_HEADER: &str = "x-aeth-timestamp";
pub const SIGNATURE_HEADER: &str = "x-aeth-signature";

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);

        let user_id = header(parts, USER_HEADER)?.trim().to_string();
        if user_id.is_empty() {
            return Err(ApiError::Unauthorized("Empty user id".to_string()));
        }

        // Secret 0 disables signature checking
        if app.shared_secret == 0 {
            return Ok(Self { user_id });
        }

        let timestamp: i64 = header(parts, TIMESTAMP_HEADER)?
            .trim()
            .parse()
            .map_err(|_| ApiError::Unauthorized("Malformed timestamp".to_string()))?;
        validate_timestamp(timestamp, now_millis(), SIGNATURE_WINDOW_MS)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        let signature = header(parts, SIGNATURE_HEADER)?;
        validate_signature(signature.trim(), &user_id, timestamp, app.shared_secret).map_err(|e| {
            tracing::debug!(user_id = %user_id, error = %e, "Signature rejected");
            ApiError::Unauthorized(e.to_string())
        })?;

        Ok(Self { user_id })
    }
}

fn header<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing header: {}", name)))
}
