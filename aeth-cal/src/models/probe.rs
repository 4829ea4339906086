//! Probes: fixed-shape question sets attached to concept nodes

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{CalibrationError, CalibrationResult};
use crate::models::ConceptNode;

/// Multiple-choice questions per node
pub const MCQ_PER_NODE: usize = 2;
/// Free-text questions per node
pub const SHORT_PER_NODE: usize = 1;
/// Options per multiple-choice question
pub const OPTIONS_PER_MCQ: usize = 4;

/// One assessment item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Question {
    #[serde(rename = "mcq")]
    MultipleChoice {
        #[serde(rename = "question")]
        prompt: String,
        options: Vec<String>,
        #[serde(rename = "correct_answer")]
        correct_option: String,
    },
    /// Judged semantically; carries no answer key
    #[serde(rename = "short")]
    FreeText {
        #[serde(rename = "question")]
        prompt: String,
    },
}

impl Question {
    pub fn prompt(&self) -> &str {
        match self {
            Question::MultipleChoice { prompt, .. } | Question::FreeText { prompt } => prompt,
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, Question::MultipleChoice { .. })
    }
}

/// A node's question set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProbe {
    pub node_id: String,
    #[serde(default)]
    pub node_name: String,
    pub questions: Vec<Question>,
}

/// Ordered probes for one concept graph
pub type ProbeSet = Vec<NodeProbe>;

/// Answer map key: `"{node_id}-{question_index}"`
///
/// The index is the position in the node's full question list, not within
/// the multiple-choice or free-text subset.
pub fn answer_key(node_id: &str, question_index: usize) -> String {
    format!("{}-{}", node_id, question_index)
}

/// Validate a generated probe set against its source nodes and reorder it
///
/// Checks one-to-one node coverage and the fixed question shape, fills the
/// denormalized `node_name` from the source node, and returns probes in
/// source node order.
pub fn validate_probe_set(nodes: &[ConceptNode], probes: ProbeSet) -> CalibrationResult<ProbeSet> {
    let expected: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut by_id: HashMap<String, NodeProbe> = HashMap::with_capacity(probes.len());
    for probe in probes {
        let node_id = probe.node_id.trim().to_string();
        if !expected.contains(node_id.as_str()) {
            return Err(CalibrationError::Validation(format!(
                "Probe references unknown node '{}'",
                node_id
            )));
        }
        validate_questions(&node_id, &probe.questions)?;
        if by_id.insert(node_id.clone(), NodeProbe { node_id: node_id.clone(), ..probe }).is_some() {
            return Err(CalibrationError::Validation(format!(
                "Node '{}' has more than one probe",
                node_id
            )));
        }
    }

    nodes
        .iter()
        .map(|node| {
            let mut probe = by_id.remove(&node.id).ok_or_else(|| {
                CalibrationError::Validation(format!("No probe generated for node '{}'", node.id))
            })?;
            probe.node_name = node.name.clone();
            Ok(probe)
        })
        .collect()
}

fn validate_questions(node_id: &str, questions: &[Question]) -> CalibrationResult<()> {
    let mcq_count = questions.iter().filter(|q| q.is_multiple_choice()).count();
    let short_count = questions.len() - mcq_count;

    if mcq_count != MCQ_PER_NODE || short_count != SHORT_PER_NODE {
        return Err(CalibrationError::Validation(format!(
            "Node '{}' has {} multiple-choice and {} free-text questions (expected {} and {})",
            node_id, mcq_count, short_count, MCQ_PER_NODE, SHORT_PER_NODE
        )));
    }

    for (index, question) in questions.iter().enumerate() {
        if question.prompt().trim().is_empty() {
            return Err(CalibrationError::Validation(format!(
                "Question {} of node '{}' has no text",
                index, node_id
            )));
        }

        if let Question::MultipleChoice { options, correct_option, .. } = question {
            let distinct: HashSet<&str> = options.iter().map(String::as_str).collect();
            if options.len() != OPTIONS_PER_MCQ || distinct.len() != OPTIONS_PER_MCQ {
                return Err(CalibrationError::Validation(format!(
                    "Question {} of node '{}' needs {} distinct options",
                    index, node_id, OPTIONS_PER_MCQ
                )));
            }
            if !distinct.contains(correct_option.as_str()) {
                return Err(CalibrationError::Validation(format!(
                    "Question {} of node '{}': correct answer is not one of the options",
                    index, node_id
                )));
            }
        }
    }

    Ok(())
}
