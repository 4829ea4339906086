//! Concept graph: a topic decomposed into atomic concepts with prerequisites

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{CalibrationError, CalibrationResult};

/// Generation policy cap on graph size
pub const MAX_GRAPH_NODES: usize = 10;

/// One atomic unit of a topic's decomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptNode {
    /// Unique within the graph
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ids of other nodes in the same graph
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// Where a returned graph came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphSource {
    Cache,
    Generated,
}

/// Full decomposition result for a (topic, education stage) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptGraph {
    pub topic: String,
    pub education_stage: String,
    pub fingerprint: String,
    pub nodes: Vec<ConceptNode>,
}

impl ConceptGraph {
    /// Build a graph from already-validated nodes
    pub fn new(topic: &str, education_stage: &str, nodes: Vec<ConceptNode>) -> Self {
        Self {
            topic: topic.to_string(),
            education_stage: education_stage.to_string(),
            fingerprint: aeth_common::topic_fingerprint(topic, education_stage),
            nodes,
        }
    }

    pub fn node(&self, id: &str) -> Option<&ConceptNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Names of a node's prerequisites, in prerequisite order
    pub fn prerequisite_names(&self, node: &ConceptNode) -> Vec<String> {
        node.prerequisites
            .iter()
            .filter_map(|id| self.node(id).map(|n| n.name.clone()))
            .collect()
    }
}

/// Normalize generated nodes: trim ids and drop repeated prerequisite entries
///
/// Whitespace around ids is the most common drift in generated output and
/// carries no meaning. Prerequisites keep first-occurrence order.
pub fn normalize_nodes(nodes: Vec<ConceptNode>) -> Vec<ConceptNode> {
    nodes
        .into_iter()
        .map(|node| {
            let mut seen = HashSet::new();
            let prerequisites = node
                .prerequisites
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| seen.insert(p.clone()))
                .collect();
            ConceptNode {
                id: node.id.trim().to_string(),
                name: node.name.trim().to_string(),
                description: node.description.trim().to_string(),
                prerequisites,
            }
        })
        .collect()
}

/// Validate node set against the graph invariants
///
/// - at least one and at most [`MAX_GRAPH_NODES`] nodes
/// - non-empty, unique ids
/// - every prerequisite resolves to a node in the same set
/// - prerequisite edges form a DAG (topological sort succeeds)
pub fn validate_nodes(nodes: &[ConceptNode]) -> CalibrationResult<()> {
    if nodes.is_empty() {
        return Err(CalibrationError::Validation(
            "Decomposition returned no nodes".to_string(),
        ));
    }

    if nodes.len() > MAX_GRAPH_NODES {
        return Err(CalibrationError::Validation(format!(
            "Decomposition returned {} nodes (max {})",
            nodes.len(),
            MAX_GRAPH_NODES
        )));
    }

    let mut dag: DiGraph<&str, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for node in nodes {
        if node.id.is_empty() {
            return Err(CalibrationError::Validation(format!(
                "Node '{}' has an empty id",
                node.name
            )));
        }
        if indices.insert(node.id.as_str(), dag.add_node(node.id.as_str())).is_some() {
            return Err(CalibrationError::Validation(format!(
                "Duplicate node id '{}'",
                node.id
            )));
        }
    }

    // Edge direction: prerequisite -> dependent
    for node in nodes {
        let dependent = indices[node.id.as_str()];
        for prerequisite in &node.prerequisites {
            let Some(&source) = indices.get(prerequisite.as_str()) else {
                return Err(CalibrationError::Validation(format!(
                    "Node '{}' references unknown prerequisite '{}'",
                    node.id, prerequisite
                )));
            };
            dag.add_edge(source, dependent, ());
        }
    }

    petgraph::algo::toposort(&dag, None).map_err(|cycle| {
        CalibrationError::Validation(format!(
            "Prerequisite cycle through node '{}'",
            dag[cycle.node_id()]
        ))
    })?;

    Ok(())
}
