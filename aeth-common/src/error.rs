//! Shared error type for the Aetheliz crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Storage, configuration and bootstrap failures
///
/// Pipeline-level categories (generation, validation, conflicts) live in the
/// service crate and wrap this type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder or config file access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bootstrap TOML, settings value, or missing credential
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON column encode failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row that no longer decodes (bad id, status, timestamp or JSON blob)
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
