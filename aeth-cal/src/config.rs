//! Configuration resolution for aeth-cal
//!
//! Completion API key priority: Database → ENV → TOML.

use aeth_common::config::TomlConfig;
use aeth_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Environment variable holding the completion API key
pub const API_KEY_ENV: &str = "AETH_COMPLETION_API_KEY";

/// Resolve the completion service API key
///
/// Several populated sources are not an error; the highest priority wins
/// and a warning names them all.
pub async fn resolve_completion_api_key(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    let db_key = crate::db::settings::get_completion_api_key(db).await?;
    let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .completion
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let candidates = [
        ("database", db_key),
        ("environment", env_key),
        ("TOML", toml_key),
    ];

    let present: Vec<&str> = candidates
        .iter()
        .filter(|(_, key)| key.is_some())
        .map(|(source, _)| *source)
        .collect();
    if present.len() > 1 {
        warn!(
            "Completion API key found in multiple sources: {}. Using {}.",
            present.join(", "),
            present[0]
        );
    }

    for (source, key) in candidates {
        if let Some(key) = key {
            info!("Completion API key loaded from {}", source);
            return Ok(key);
        }
    }

    Err(Error::Config(format!(
        "Completion API key not configured. Set one of:\n\
         1. Database: settings key '{}'\n\
         2. Environment: {}=your-key\n\
         3. TOML config: [completion] api_key = \"your-key\"",
        crate::db::settings::COMPLETION_API_KEY,
        API_KEY_ENV
    )))
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
