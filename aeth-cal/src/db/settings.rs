//! Settings table accessors (key-value)

use aeth_common::{Error, Result};
use sqlx::SqlitePool;

/// Key for the completion service API key
pub const COMPLETION_API_KEY: &str = "completion_api_key";
/// Key bounding `retry_on_lock` total wait
pub const MAX_LOCK_WAIT_MS: &str = "database_max_lock_wait_ms";

const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

pub async fn get_completion_api_key(db: &SqlitePool) -> Result<Option<String>> {
    let key: Option<String> = get_setting(db, COMPLETION_API_KEY).await?;
    Ok(key.filter(|k| !k.trim().is_empty()))
}

/// Maximum total wait for lock-contended writes (default 5000ms)
pub async fn get_max_lock_wait_ms(db: &SqlitePool) -> Result<u64> {
    get_setting(db, MAX_LOCK_WAIT_MS)
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS))
}

async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    row.map(|(value,)| {
        value
            .parse::<T>()
            .map_err(|e| Error::Config(format!("Setting '{}' is invalid: {}", key, e)))
    })
    .transpose()
}

#[cfg(test)]
async fn set_setting<T: std::fmt::Display>(db: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}
