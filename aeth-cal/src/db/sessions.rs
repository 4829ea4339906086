//! Calibration session persistence
//!
//! Graph, probes, answers, and results live in one JSON `metadata` column;
//! `status` and `stability_score` are real columns so that the completion
//! transition can be a single conditional update.

use aeth_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::settings::get_max_lock_wait_ms;
use crate::models::{Session, SessionMetadata, SessionStatus, SessionSummary};
use crate::utils::retry_on_lock;

/// Insert a freshly created session
pub async fn insert_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    let id = session.id.to_string();
    let metadata = serialize_metadata(&session.metadata())?;
    let created_at = session.created_at.to_rfc3339();
    let max_wait_ms = get_max_lock_wait_ms(pool).await?;

    retry_on_lock("insert_session", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO probe_sessions (id, owner_id, status, topic, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&session.owner_id)
        .bind(session.status.as_str())
        .bind(&session.topic)
        .bind(&metadata)
        .bind(&created_at)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await
}

/// Persist the completion transition of an in-memory completed session
///
/// Answers, results, score, and status are written by one statement that
/// only matches an in-progress row. Returns `false` when no row matched,
/// i.e. the session was already completed (or does not exist).
pub async fn complete_session(pool: &SqlitePool, session: &Session) -> Result<bool> {
    let id = session.id.to_string();
    let metadata = serialize_metadata(&session.metadata())?;
    let completed_at = session.completed_at.unwrap_or_else(Utc::now).to_rfc3339();
    let max_wait_ms = get_max_lock_wait_ms(pool).await?;

    let updated = retry_on_lock("complete_session", max_wait_ms, || async {
        let result = sqlx::query(
            r#"
            UPDATE probe_sessions
            SET status = ?, metadata = ?, stability_score = ?, completed_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(SessionStatus::Completed.as_str())
        .bind(&metadata)
        .bind(session.stability_score)
        .bind(&completed_at)
        .bind(&id)
        .bind(SessionStatus::InProgress.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    })
    .await?;

    Ok(updated == 1)
}

pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, owner_id, status, topic, metadata, stability_score, created_at, completed_at
        FROM probe_sessions
        WHERE id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| session_from_row(&row)).transpose()
}

/// A caller's sessions, newest first
pub async fn list_sessions_for_owner(pool: &SqlitePool, owner_id: &str) -> Result<Vec<SessionSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, topic, status, stability_score, created_at
        FROM probe_sessions
        WHERE owner_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SessionSummary {
                session_id: parse_id(row.get("id"))?,
                topic: row.get("topic"),
                status: parse_status(row.get("status"))?,
                stability_score: row.get("stability_score"),
                created_at: parse_timestamp(row.get("created_at"), "created_at")?,
            })
        })
        .collect()
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    let metadata: String = row.get("metadata");
    let metadata: SessionMetadata = serde_json::from_str(&metadata)
        .map_err(|e| Error::Corrupt(format!("Session metadata: {}", e)))?;

    let completed_at: Option<String> = row.get("completed_at");
    let completed_at = completed_at
        .map(|s| parse_timestamp(s, "completed_at"))
        .transpose()?;

    Ok(Session {
        id: parse_id(row.get("id"))?,
        owner_id: row.get("owner_id"),
        status: parse_status(row.get("status"))?,
        topic: row.get("topic"),
        graph: metadata.graph,
        probes: metadata.probes,
        answers: metadata.answers,
        results: metadata.results,
        stability_score: row.get("stability_score"),
        created_at: parse_timestamp(row.get("created_at"), "created_at")?,
        completed_at,
    })
}

fn serialize_metadata(metadata: &SessionMetadata) -> Result<String> {
    Ok(serde_json::to_string(metadata)?)
}

fn parse_id(value: String) -> Result<Uuid> {
    Uuid::parse_str(&value).map_err(|e| Error::Corrupt(format!("Session id '{}': {}", value, e)))
}

fn parse_status(value: String) -> Result<SessionStatus> {
    SessionStatus::parse(&value)
        .ok_or_else(|| Error::Corrupt(format!("Unknown session status '{}'", value)))
}

fn parse_timestamp(value: String, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("Column {}: {}", column, e)))
}
