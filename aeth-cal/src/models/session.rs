//! Calibration session state machine
//!
//! IN_PROGRESS → COMPLETED, exactly once, via evaluation. Never reopened.
//!
//! A session owns snapshots of its graph and probes: regenerating the same
//! topic later never alters an existing session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{CalibrationError, CalibrationResult};
use crate::models::{ConceptGraph, NodeResult, ProbeSet};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

/// Structured blob stored in the `metadata` column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub topic: String,
    pub graph: ConceptGraph,
    pub probes: ProbeSet,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<NodeResult>>,
}

/// A student's calibration run
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: String,
    pub status: SessionStatus,
    pub topic: String,
    pub graph: ConceptGraph,
    pub probes: ProbeSet,
    /// `"{node_id}-{question_index}"` → raw answer; written once, at submission
    pub answers: BTreeMap<String, String>,
    /// Present only once completed
    pub results: Option<Vec<NodeResult>>,
    /// Aggregate score in [0, 1]; present only once completed
    pub stability_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Row of a caller's session history
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub topic: String,
    pub status: SessionStatus,
    pub stability_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create an in-progress session from freshly built graph and probes
    pub fn new(owner_id: &str, topic: &str, graph: ConceptGraph, probes: ProbeSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            status: SessionStatus::InProgress,
            topic: topic.to_string(),
            graph,
            probes,
            answers: BTreeMap::new(),
            results: None,
            stability_score: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Apply the single completion transition in memory
    ///
    /// Answers, results, score, and status change together. Persisting the
    /// result is the caller's job (see `db::sessions::complete_session`).
    pub fn complete(
        &mut self,
        answers: BTreeMap<String, String>,
        results: Vec<NodeResult>,
        stability_score: f64,
    ) -> CalibrationResult<()> {
        if self.is_completed() {
            return Err(CalibrationError::Conflict(format!(
                "Session {} is already completed",
                self.id
            )));
        }

        self.answers = answers;
        self.results = Some(results);
        self.stability_score = Some(stability_score);
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            topic: self.topic.clone(),
            graph: self.graph.clone(),
            probes: self.probes.clone(),
            answers: self.answers.clone(),
            results: self.results.clone(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            topic: self.topic.clone(),
            status: self.status,
            stability_score: self.stability_score,
            created_at: self.created_at,
        }
    }
}
