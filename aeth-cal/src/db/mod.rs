//! Database access for aeth-cal
//!
//! One SQLite file (`aetheliz.db` in the root folder) holds the settings,
//! the graph cache, and calibration sessions.

pub mod graph_cache;
pub mod sessions;
pub mod settings;

use aeth_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating if needed) the database and its tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    // Concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create aeth-cal tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topic_graphs (
            fingerprint TEXT PRIMARY KEY,
            topic TEXT NOT NULL,
            education_stage TEXT NOT NULL,
            nodes TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS probe_sessions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            status TEXT NOT NULL,
            topic TEXT NOT NULL,
            metadata TEXT NOT NULL,
            stability_score REAL,
            created_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_probe_sessions_owner ON probe_sessions(owner_id, created_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, topic_graphs, probe_sessions)");

    Ok(())
}
