//! Evaluator: score a submitted answer set into per-node stability
//!
//! Per node: `(correct MCQs + sum of free-text coverage) / question count`,
//! zero for a node without questions. Aggregate is the mean node score.
//!
//! Free-text judgments fan out concurrently and are re-attributed by
//! `(node, question index)`, so the result equals a sequential pass. A
//! judgment that fails, times out, or cannot be parsed scores zero coverage
//! with no missing concepts; it never aborts the evaluation.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CalibrationError, CalibrationResult};
use crate::models::{answer_key, Classification, NodeProbe, NodeResult, Question, Session};
use crate::services::completion::{complete_within, CompletionClient};
use crate::utils::parse_structured;

/// Evaluation output, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub results: Vec<NodeResult>,
    pub aggregate_score: f64,
}

/// Structured judgment requested from the completion service
///
/// Absent or null fields read as zero coverage and no missing concepts.
#[derive(Debug, Clone, Default, Deserialize)]
struct Judgment {
    #[serde(default, alias = "coverage_score", alias = "coverageScore")]
    score: Option<f64>,
    #[serde(default, alias = "missingConcepts")]
    missing_concepts: Option<Vec<String>>,
}

impl Judgment {
    fn coverage(&self) -> f64 {
        match self.score {
            Some(score) if score.is_finite() => score.clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    fn missing_concepts(&self) -> &[String] {
        self.missing_concepts.as_deref().unwrap_or_default()
    }
}

/// One free-text question awaiting judgment
struct PendingJudgment {
    probe_index: usize,
    question_index: usize,
    node_id: String,
    prompt: String,
}

pub struct Evaluator {
    client: Arc<dyn CompletionClient>,
    call_timeout: Duration,
    concurrency: usize,
}

impl Evaluator {
    pub fn new(client: Arc<dyn CompletionClient>, call_timeout: Duration, concurrency: usize) -> Self {
        Self {
            client,
            call_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Score `answers` against the session's frozen probes
    ///
    /// Does not touch the session; the caller applies and persists the
    /// completion transition.
    pub async fn evaluate(
        &self,
        session: &Session,
        answers: &BTreeMap<String, String>,
    ) -> CalibrationResult<Evaluation> {
        if session.probes.is_empty() {
            return Err(CalibrationError::Evaluation(format!(
                "Session {} has no probes",
                session.id
            )));
        }

        let pending = self.pending_judgments(session, answers);
        let judged = pending.len();

        let judgments: HashMap<(usize, usize), Judgment> = stream::iter(pending)
            .map(|p| async move {
                let judgment = self.judge(session, &p).await;
                ((p.probe_index, p.question_index), judgment)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let results: Vec<NodeResult> = session
            .probes
            .iter()
            .enumerate()
            .map(|(probe_index, probe)| score_node(probe, probe_index, answers, &judgments))
            .collect();

        let aggregate_score = aggregate(results.iter().map(|r| r.score));

        tracing::info!(
            session_id = %session.id,
            nodes = results.len(),
            judgments = judged,
            aggregate_score,
            "Evaluation finished"
        );

        Ok(Evaluation { results, aggregate_score })
    }

    /// Free-text questions with a non-blank answer
    ///
    /// A blank or absent answer skips the judgment call and scores zero.
    fn pending_judgments(
        &self,
        session: &Session,
        answers: &BTreeMap<String, String>,
    ) -> Vec<PendingJudgment> {
        let mut pending = Vec::new();

        for (probe_index, probe) in session.probes.iter().enumerate() {
            let node = session.graph.node(&probe.node_id);
            let description = node.map(|n| n.description.as_str()).unwrap_or_default();
            let prerequisites = node
                .map(|n| session.graph.prerequisite_names(n))
                .unwrap_or_default();

            for (question_index, question) in probe.questions.iter().enumerate() {
                let Question::FreeText { prompt: question_text } = question else {
                    continue;
                };
                let Some(answer) = answers
                    .get(&answer_key(&probe.node_id, question_index))
                    .map(|a| a.trim())
                    .filter(|a| !a.is_empty())
                else {
                    continue;
                };

                pending.push(PendingJudgment {
                    probe_index,
                    question_index,
                    node_id: probe.node_id.clone(),
                    prompt: judgment_prompt(
                        &probe.node_name,
                        description,
                        &prerequisites,
                        question_text,
                        answer,
                    ),
                });
            }
        }

        pending
    }

    async fn judge(&self, session: &Session, pending: &PendingJudgment) -> Judgment {
        let raw = match complete_within(self.client.as_ref(), &pending.prompt, self.call_timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    node_id = %pending.node_id,
                    question_index = pending.question_index,
                    error = %e,
                    "Judgment call failed, scoring zero coverage"
                );
                return Judgment::default();
            }
        };

        parse_structured::<Judgment>(&raw).unwrap_or_else(|e| {
            tracing::warn!(
                session_id = %session.id,
                node_id = %pending.node_id,
                question_index = pending.question_index,
                error = %e,
                "Unparseable judgment, scoring zero coverage"
            );
            Judgment::default()
        })
    }
}

fn score_node(
    probe: &NodeProbe,
    probe_index: usize,
    answers: &BTreeMap<String, String>,
    judgments: &HashMap<(usize, usize), Judgment>,
) -> NodeResult {
    let mut mcq_score = 0.0;
    let mut explanation_score = 0.0;
    let mut missing_concepts = Vec::new();
    let mut seen = HashSet::new();

    for (question_index, question) in probe.questions.iter().enumerate() {
        match question {
            Question::MultipleChoice { correct_option, .. } => {
                let answer = answers.get(&answer_key(&probe.node_id, question_index));
                if answer == Some(correct_option) {
                    mcq_score += 1.0;
                }
            }
            Question::FreeText { .. } => {
                if let Some(judgment) = judgments.get(&(probe_index, question_index)) {
                    explanation_score += judgment.coverage();
                    for concept in judgment.missing_concepts() {
                        let concept = concept.trim();
                        if !concept.is_empty() && seen.insert(concept.to_string()) {
                            missing_concepts.push(concept.to_string());
                        }
                    }
                }
            }
        }
    }

    let score = node_score(mcq_score + explanation_score, probe.questions.len());

    NodeResult {
        node_id: probe.node_id.clone(),
        node_name: probe.node_name.clone(),
        score,
        classification: Classification::from_score(score),
        missing_concepts,
    }
}

/// Zero when the node has no questions
fn node_score(earned: f64, total_weight: usize) -> f64 {
    if total_weight == 0 {
        0.0
    } else {
        earned / total_weight as f64
    }
}

/// Mean of node scores, zero for none
fn aggregate(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = scores.fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn judgment_prompt(
    node_name: &str,
    description: &str,
    prerequisites: &[String],
    question: &str,
    answer: &str,
) -> String {
    let prerequisites = if prerequisites.is_empty() {
        "(none)".to_string()
    } else {
        prerequisites.join(", ")
    };

    format!(
        r#"You are a calibration engine.

Concept: {node_name}
Description: {description}
Prerequisites: {prerequisites}

Question:
{question}

Student Answer:
"{answer}"

Evaluate concept coverage against the prerequisites.

Return ONLY JSON:

{{
  "score": number between 0 and 1,
  "missing_concepts": ["..."]
}}
"#
    )
}
