//! Content-addressed graph cache
//!
//! Keyed by topic fingerprint. No eviction and no invalidation: once a
//! fingerprint is populated every later lookup returns the same graph.

use aeth_common::{Error, Result};
use sqlx::SqlitePool;

use crate::db::settings::get_max_lock_wait_ms;
use crate::models::{ConceptGraph, ConceptNode};
use crate::utils::retry_on_lock;

/// Graph cache backed by the `topic_graphs` table
#[derive(Clone)]
pub struct GraphCache {
    pool: SqlitePool,
}

impl GraphCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<ConceptGraph>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT topic, education_stage, nodes FROM topic_graphs WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        let Some((topic, education_stage, nodes)) = row else {
            return Ok(None);
        };

        let nodes: Vec<ConceptNode> = serde_json::from_str(&nodes).map_err(|e| {
            Error::Corrupt(format!(
                "Cached graph {} has unreadable nodes: {}",
                fingerprint, e
            ))
        })?;

        Ok(Some(ConceptGraph {
            topic,
            education_stage,
            fingerprint: fingerprint.to_string(),
            nodes,
        }))
    }

    /// Store a validated graph; a concurrent writer for the same key is overwritten
    pub async fn put(&self, graph: &ConceptGraph) -> Result<()> {
        let nodes = serde_json::to_string(&graph.nodes)?;
        let created_at = chrono::Utc::now().to_rfc3339();
        let max_wait_ms = get_max_lock_wait_ms(&self.pool).await?;

        retry_on_lock("cache_graph", max_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO topic_graphs (fingerprint, topic, education_stage, nodes, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(fingerprint) DO UPDATE SET
                    topic = excluded.topic,
                    education_stage = excluded.education_stage,
                    nodes = excluded.nodes
                "#,
            )
            .bind(&graph.fingerprint)
            .bind(&graph.topic)
            .bind(&graph.education_stage)
            .bind(&nodes)
            .bind(&created_at)
            .execute(&self.pool)
            .await?;

            Ok(())
        })
        .await?;

        tracing::debug!(fingerprint = %graph.fingerprint, "Graph cached");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM topic_graphs")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::time::Duration;

    fn graph(topic: &str) -> ConceptGraph {
        ConceptGraph::new(
            topic,
            "High School",
            vec![ConceptNode {
                id: "n1".into(),
                name: "Forces".into(),
                description: "Push or pull".into(),
                prerequisites: vec![],
            }],
        )
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = GraphCache::new(test_pool().await);
        let g = graph("Mechanics");

        assert!(cache.get(&g.fingerprint).await.unwrap().is_none());
        cache.put(&g).await.unwrap();

        let cached = cache.get(&g.fingerprint).await.unwrap().unwrap();
        assert_eq!(cached, g);
    }

    #[tokio::test]
    async fn test_case_variants_share_an_entry() {
        let cache = GraphCache::new(test_pool().await);
        cache.put(&graph("Mechanics")).await.unwrap();

        let fingerprint = aeth_common::topic_fingerprint("MECHANICS", "High School");
        let cached = cache.get(&fingerprint).await.unwrap().unwrap();
        assert_eq!(cached.topic, "Mechanics");
    }

    #[tokio::test]
    async fn test_put_same_key_overwrites() {
        let cache = GraphCache::new(test_pool().await);
        let mut g = graph("Mechanics");
        cache.put(&g).await.unwrap();

        g.nodes[0].name = "Newton's laws".into();
        cache.put(&g).await.unwrap();

        assert_eq!(cache.count().await, 1);
        let cached = cache.get(&g.fingerprint).await.unwrap().unwrap();
        assert_eq!(cached.nodes[0].name, "Newton's laws");
    }

    #[tokio::test]
    async fn test_put_waits_out_a_held_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("aetheliz.db"))
            .create_if_missing(true)
            .busy_timeout(Duration::ZERO);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        let mut writer = pool.acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *writer).await.unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            sqlx::query("COMMIT").execute(&mut *writer).await.unwrap();
        });

        let cache = GraphCache::new(pool);
        cache.put(&graph("Mechanics")).await.unwrap();
        release.await.unwrap();

        assert_eq!(cache.count().await, 1);
    }
}
