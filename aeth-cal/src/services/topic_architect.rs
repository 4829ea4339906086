//! Topic Architect: decompose a topic into a bounded prerequisite DAG
//!
//! Cache hit short-circuits. On a miss the completion output is parsed,
//! normalized, and validated before anything is written to the cache, so a
//! failed generation never leaves a partial entry behind.
//!
//! Concurrent misses for the same fingerprint are serialized by a
//! per-fingerprint lock: the first caller generates, the others wait and
//! then read its cache entry. The lock's map entry lives only as long as
//! some caller holds it.

use aeth_common::topic_fingerprint;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use crate::db::graph_cache::GraphCache;
use crate::error::{CalibrationError, CalibrationResult};
use crate::models::concept_graph::{normalize_nodes, validate_nodes};
use crate::models::{ConceptGraph, ConceptNode, GraphSource, MAX_GRAPH_NODES};
use crate::services::completion::{complete_within, CompletionClient};
use crate::utils::parse_structured;

/// A graph plus where it came from
#[derive(Debug, Clone)]
pub struct ArchitectOutcome {
    pub graph: ConceptGraph,
    pub source: GraphSource,
}

#[derive(Debug, Deserialize)]
struct Decomposition {
    nodes: Vec<ConceptNode>,
}

type FlightMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

pub struct TopicArchitect {
    client: Arc<dyn CompletionClient>,
    cache: GraphCache,
    in_flight: FlightMap,
    call_timeout: Duration,
}

impl TopicArchitect {
    pub fn new(client: Arc<dyn CompletionClient>, cache: GraphCache, call_timeout: Duration) -> Self {
        Self {
            client,
            cache,
            in_flight: Mutex::new(HashMap::new()),
            call_timeout,
        }
    }

    /// Return the cached graph for `(topic, education_stage)` or generate one
    ///
    /// # Errors
    /// - `MissingParameter` for a blank topic or stage
    /// - `Generation` when the completion fails, times out, or is unparseable
    /// - `Validation` when parsed nodes break the DAG, size, or reference rules
    pub async fn build_graph(
        &self,
        topic: &str,
        education_stage: &str,
    ) -> CalibrationResult<ArchitectOutcome> {
        let topic = topic.trim();
        let education_stage = education_stage.trim();
        if topic.is_empty() {
            return Err(CalibrationError::MissingParameter("topic".to_string()));
        }
        if education_stage.is_empty() {
            return Err(CalibrationError::MissingParameter("education_stage".to_string()));
        }

        let fingerprint = topic_fingerprint(topic, education_stage);

        if let Some(graph) = self.cache.get(&fingerprint).await? {
            tracing::debug!(fingerprint = %fingerprint, "Graph cache hit");
            return Ok(ArchitectOutcome { graph, source: GraphSource::Cache });
        }

        let flight = self.join_flight(&fingerprint)?;
        let _turn = flight.lock.lock().await;

        // A caller we waited on may have filled the entry
        let outcome = match self.cache.get(&fingerprint).await? {
            Some(graph) => {
                tracing::debug!(fingerprint = %fingerprint, "Graph cached while waiting");
                ArchitectOutcome { graph, source: GraphSource::Cache }
            }
            None => self.generate(topic, education_stage, &fingerprint).await?,
        };
        Ok(outcome)
    }

    async fn generate(
        &self,
        topic: &str,
        education_stage: &str,
        fingerprint: &str,
    ) -> CalibrationResult<ArchitectOutcome> {
        tracing::info!(fingerprint = %fingerprint, topic, education_stage, "Graph cache miss, generating");

        let prompt = decomposition_prompt(topic, education_stage);
        let raw = complete_within(self.client.as_ref(), &prompt, self.call_timeout)
            .await
            .map_err(|e| CalibrationError::Generation(e.to_string()))?;

        let decomposition: Decomposition = parse_structured(&raw).map_err(|e| {
            tracing::warn!(fingerprint = %fingerprint, error = %e, "Unparseable decomposition");
            CalibrationError::Generation(e.to_string())
        })?;

        let nodes = normalize_nodes(decomposition.nodes);
        if let Err(e) = validate_nodes(&nodes) {
            tracing::warn!(fingerprint = %fingerprint, error = %e, "Decomposition rejected");
            return Err(e);
        }

        let graph = ConceptGraph::new(topic, education_stage, nodes);
        self.cache.put(&graph).await?;

        tracing::info!(
            fingerprint = %fingerprint,
            node_count = graph.nodes.len(),
            "Graph generated and cached"
        );

        Ok(ArchitectOutcome { graph, source: GraphSource::Generated })
    }

    fn join_flight(&self, fingerprint: &str) -> CalibrationResult<Flight<'_>> {
        let mut map = self
            .in_flight
            .lock()
            .map_err(|_| CalibrationError::Generation("In-flight map poisoned".to_string()))?;
        let lock = map.entry(fingerprint.to_string()).or_default().clone();
        Ok(Flight {
            map: &self.in_flight,
            fingerprint: fingerprint.to_string(),
            lock,
        })
    }
}

/// A caller's membership in a fingerprint's flight
///
/// Dropping the last membership removes the map entry, including when the
/// owning future is cancelled or returns early.
struct Flight<'a> {
    map: &'a FlightMap,
    fingerprint: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if let Ok(mut map) = self.map.lock() {
            // One reference in the map, one here
            if Arc::strong_count(&self.lock) <= 2 {
                map.remove(&self.fingerprint);
            }
        }
    }
}

fn decomposition_prompt(topic: &str, education_stage: &str) -> String {
    format!(
        r#"You are a curriculum decomposition engine.

Decompose the topic "{topic}" for education level "{education_stage}".

Return ONLY valid JSON in this format:

{{
  "nodes": [
    {{
      "id": "n1",
      "name": "Concept Name",
      "description": "Short explanation",
      "prerequisites": []
    }}
  ]
}}

Rules:
- Use atomic conceptual units
- Build a directed acyclic dependency structure
- prerequisites must reference other node ids
- Maximum {max} nodes
- No extra text
"#,
        topic = topic,
        education_stage = education_stage,
        max = MAX_GRAPH_NODES,
    )
}
