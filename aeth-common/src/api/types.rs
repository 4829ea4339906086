//! Shared API response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error payload returned by every Aetheliz service
///
/// Serialized inside an `{"error": ...}` envelope by the service's error type.
///
/// # Examples
///
/// ```
/// use aeth_common::api::types::ErrorResponse;
///
/// let error = ErrorResponse::new("NOT_FOUND", "Session not found");
/// let json = serde_json::to_value(&error).unwrap();
/// assert_eq!(json["code"], "NOT_FOUND");
/// assert!(json.get("details").is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable category (e.g. `GENERATION_FAILED`)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: Value) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
