//! Data models for aeth-cal (calibration service)
//!
//! - Concept graphs: topic decomposition into a prerequisite DAG
//! - Probes: per-node question sets
//! - Sessions: a student's calibration run and its state machine
//! - Results: per-node scores and classifications

pub mod concept_graph;
pub mod node_result;
pub mod probe;
pub mod session;

pub use concept_graph::{ConceptGraph, ConceptNode, GraphSource, MAX_GRAPH_NODES};
pub use node_result::{Classification, NodeResult};
pub use probe::{answer_key, NodeProbe, ProbeSet, Question};
pub use session::{Session, SessionMetadata, SessionStatus, SessionSummary};
