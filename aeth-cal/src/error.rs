//! Error types for aeth-cal
//!
//! Two layers:
//! - [`CalibrationError`]: pipeline taxonomy returned by the services
//! - [`ApiError`]: HTTP mapping with a JSON `{"error": {code, message}}` body
//!
//! A free-text judgment that cannot be parsed is not an error value. The
//! evaluator logs it and scores that question as zero coverage.

use crate::services::completion::CompletionError;
use aeth_common::api::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Calibration pipeline error
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Caller input incomplete
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// Completion text could not be parsed into the expected structure
    /// (includes transport failures and timeouts)
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Parsed structure violates graph or probe-shape invariants
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Session or cache entry absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Evaluation precondition violated (session without probes)
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// Session already completed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Completion call failed where no structured output is expected
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// aeth-common error (database, serialization, config)
    #[error(transparent)]
    Common(#[from] aeth_common::Error),
}

impl From<sqlx::Error> for CalibrationError {
    fn from(err: sqlx::Error) -> Self {
        CalibrationError::Common(aeth_common::Error::Database(err))
    }
}

/// Result type for pipeline operations
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid caller identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Pipeline error
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Calibration(err) => match err {
                CalibrationError::MissingParameter(_) => {
                    (StatusCode::BAD_REQUEST, "MISSING_PARAMETER")
                }
                CalibrationError::Generation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "GENERATION_FAILED")
                }
                CalibrationError::Validation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "VALIDATION_FAILED")
                }
                CalibrationError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CalibrationError::Evaluation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "EVALUATION_FAILED")
                }
                CalibrationError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                CalibrationError::Completion(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "COMPLETION_FAILED")
                }
                CalibrationError::Common(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": ErrorResponse::new(code, self.to_string()),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            status_of(CalibrationError::MissingParameter("topic".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CalibrationError::NotFound("session".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CalibrationError::Conflict("completed".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CalibrationError::Generation("bad json".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::Unauthorized("no user".into())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_generation_and_validation_codes_differ() {
        let generation: ApiError = CalibrationError::Generation("x".into()).into();
        let validation: ApiError = CalibrationError::Validation("y".into()).into();

        assert_eq!(generation.status_and_code().1, "GENERATION_FAILED");
        assert_eq!(validation.status_and_code().1, "VALIDATION_FAILED");
    }
}
