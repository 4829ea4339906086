//! Calibration pipeline: architect → probes → session → evaluation
//!
//! Composes the services around the session store. Failures before the
//! session insert leave nothing persisted; failures during submission leave
//! the session in progress.

use aeth_common::config::TomlConfig;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::graph_cache::GraphCache;
use crate::db::sessions;
use crate::error::{CalibrationError, CalibrationResult};
use crate::models::{ConceptNode, NodeResult, ProbeSet, Session, SessionStatus, SessionSummary};
use crate::services::completion::CompletionClient;
use crate::services::evaluator::{Evaluation, Evaluator};
use crate::services::probe_generator::ProbeGenerator;
use crate::services::repair_tutor::RepairTutor;
use crate::services::topic_architect::{ArchitectOutcome, TopicArchitect};

/// Tunables taken from the `[completion]` and `[evaluation]` config sections
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub call_timeout: Duration,
    pub judgment_concurrency: usize,
    pub default_education_stage: String,
}

impl PipelineSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            call_timeout: Duration::from_secs(config.completion.timeout_secs),
            judgment_concurrency: config.evaluation.judgment_concurrency,
            default_education_stage: config.evaluation.default_education_stage.clone(),
        }
    }
}

/// Completed-session report; `overall_score` is absent while in progress
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub overall_score: Option<f64>,
    pub status: SessionStatus,
    pub nodes: Vec<NodeResult>,
}

pub struct CalibrationPipeline {
    db: SqlitePool,
    architect: TopicArchitect,
    probe_generator: ProbeGenerator,
    evaluator: Evaluator,
    tutor: RepairTutor,
    default_education_stage: String,
}

impl CalibrationPipeline {
    pub fn new(db: SqlitePool, client: Arc<dyn CompletionClient>, settings: PipelineSettings) -> Self {
        let timeout = settings.call_timeout;
        Self {
            architect: TopicArchitect::new(client.clone(), GraphCache::new(db.clone()), timeout),
            probe_generator: ProbeGenerator::new(client.clone(), timeout),
            evaluator: Evaluator::new(client.clone(), timeout, settings.judgment_concurrency),
            tutor: RepairTutor::new(client, timeout),
            default_education_stage: settings.default_education_stage,
            db,
        }
    }

    pub async fn build_graph(&self, topic: &str, education_stage: &str) -> CalibrationResult<ArchitectOutcome> {
        self.architect.build_graph(topic, education_stage).await
    }

    pub async fn generate_probes(&self, topic: &str, nodes: &[ConceptNode]) -> CalibrationResult<ProbeSet> {
        self.probe_generator.build_probes(topic, nodes).await
    }

    /// Build graph and probes, then persist a new in-progress session
    pub async fn create_session(
        &self,
        owner_id: &str,
        topic: &str,
        education_stage: Option<&str>,
    ) -> CalibrationResult<Uuid> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CalibrationError::MissingParameter("topic".to_string()));
        }
        let education_stage = education_stage
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_education_stage.as_str());

        let outcome = self.architect.build_graph(topic, education_stage).await?;
        let probes = self
            .probe_generator
            .build_probes(topic, &outcome.graph.nodes)
            .await?;

        // The session keeps its own copy of the graph
        let session = Session::new(owner_id, topic, outcome.graph, probes);
        sessions::insert_session(&self.db, &session).await?;

        tracing::info!(
            session_id = %session.id,
            owner_id,
            topic,
            graph_source = ?outcome.source,
            "Calibration session created"
        );

        Ok(session.id)
    }

    pub async fn session_probes(&self, session_id: Uuid) -> CalibrationResult<ProbeSet> {
        Ok(self.load(session_id).await?.probes)
    }

    /// Evaluate answers and complete the session, exactly once
    ///
    /// # Errors
    /// - `NotFound` for an unknown session
    /// - `Conflict` when the session is (or concurrently became) completed
    pub async fn submit(
        &self,
        session_id: Uuid,
        answers: BTreeMap<String, String>,
    ) -> CalibrationResult<Evaluation> {
        let mut session = self.load(session_id).await?;
        if session.is_completed() {
            return Err(CalibrationError::Conflict(format!(
                "Session {} is already completed",
                session_id
            )));
        }

        let evaluation = self.evaluator.evaluate(&session, &answers).await?;
        session.complete(answers, evaluation.results.clone(), evaluation.aggregate_score)?;

        if !sessions::complete_session(&self.db, &session).await? {
            tracing::warn!(session_id = %session_id, "Session completed by a concurrent submission");
            return Err(CalibrationError::Conflict(format!(
                "Session {} is already completed",
                session_id
            )));
        }

        tracing::info!(
            session_id = %session_id,
            stability_score = evaluation.aggregate_score,
            "Calibration session completed"
        );

        Ok(evaluation)
    }

    pub async fn report(&self, session_id: Uuid) -> CalibrationResult<Report> {
        let session = self.load(session_id).await?;
        Ok(Report {
            overall_score: session.stability_score,
            status: session.status,
            nodes: session.results.unwrap_or_default(),
        })
    }

    /// Repair content for one node of a session's graph
    pub async fn repair(&self, session_id: Uuid, node_id: &str) -> CalibrationResult<String> {
        let session = self.load(session_id).await?;
        let node = session.graph.node(node_id).ok_or_else(|| {
            CalibrationError::NotFound(format!("Node {} in session {}", node_id, session_id))
        })?;

        let missing: Vec<String> = session
            .results
            .as_ref()
            .and_then(|results| results.iter().find(|r| r.node_id == node_id))
            .map(|r| r.missing_concepts.clone())
            .unwrap_or_default();
        let prerequisites = session.graph.prerequisite_names(node);

        self.tutor
            .explain(&session.topic, node, &prerequisites, &missing)
            .await
    }

    pub async fn history(&self, owner_id: &str) -> CalibrationResult<Vec<SessionSummary>> {
        Ok(sessions::list_sessions_for_owner(&self.db, owner_id).await?)
    }

    async fn load(&self, session_id: Uuid) -> CalibrationResult<Session> {
        sessions::load_session(&self.db, session_id)
            .await?
            .ok_or_else(|| CalibrationError::NotFound(format!("Session {}", session_id)))
    }
}
