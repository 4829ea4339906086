//! Caller identity signatures
//!
//! Session and cookie handling live in the upstream identity provider. By
//! the time a request reaches a service it carries three headers:
//! - `x-aeth-user`: opaque user id
//! - `x-aeth-timestamp`: Unix epoch milliseconds
//! - `x-aeth-signature`: hex SHA-256 of `"{user}:{timestamp}:{secret}"`
//!
//! The shared secret is stored in the `settings` table. A secret of 0
//! disables signature checking; the user header is still required.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum age (and future skew) of a signed timestamp
pub const SIGNATURE_WINDOW_MS: i64 = 30_000;

/// Authentication error types
#[derive(Debug, Clone)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Signature does not match calculated value
    InvalidSignature { provided: String, calculated: String },

    /// Database error loading shared secret
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::InvalidTimestamp { reason, .. } => {
                write!(f, "Invalid timestamp: {}", reason)
            }
            ApiAuthError::InvalidSignature { .. } => write!(f, "Invalid signature"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Load shared secret from database settings
///
/// - Key: `api_shared_secret`
/// - Value: i64
/// - Special value 0: disables signature checking
///
/// A missing row is generated and stored.
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'api_shared_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and store a random non-zero shared secret
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let secret: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let val = rng.gen::<i64>();
            if val != 0 {
                break val;
            }
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('api_shared_secret', ?)")
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

/// Validate that `timestamp` lies within `window_ms` of `now` in either direction
///
/// # Examples
///
/// ```
/// use aeth_common::api::auth::validate_timestamp;
///
/// let now = 1_730_000_000_000i64;
/// assert!(validate_timestamp(now - 500, now, 1000).is_ok());
/// assert!(validate_timestamp(now - 2000, now, 1000).is_err());
/// assert!(validate_timestamp(now + 2000, now, 1000).is_err());
/// ```
pub fn validate_timestamp(timestamp: i64, now: i64, window_ms: i64) -> Result<(), ApiAuthError> {
    let diff = now - timestamp;

    if diff > window_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("Timestamp {}ms too old (max {}ms past)", diff, window_ms),
        });
    }

    if diff < -window_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.abs(),
                window_ms
            ),
        });
    }

    Ok(())
}

/// Calculate the identity signature for a user id and timestamp
///
/// # Examples
///
/// ```
/// use aeth_common::api::auth::calculate_signature;
///
/// let sig = calculate_signature("user-1", 1730000000000, 42);
/// assert_eq!(sig.len(), 64);
/// assert_ne!(sig, calculate_signature("user-2", 1730000000000, 42));
/// ```
pub fn calculate_signature(user_id: &str, timestamp: i64, shared_secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", user_id, timestamp, shared_secret).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate a provided signature (case-insensitive hex)
pub fn validate_signature(
    provided: &str,
    user_id: &str,
    timestamp: i64,
    shared_secret: i64,
) -> Result<(), ApiAuthError> {
    let calculated = calculate_signature(user_id, timestamp, shared_secret);
    if provided.eq_ignore_ascii_case(&calculated) {
        Ok(())
    } else {
        Err(ApiAuthError::InvalidSignature {
            provided: provided.to_string(),
            calculated,
        })
    }
}
