//! Repair tutor: targeted explanation for a weak or broken node
//!
//! Output is returned verbatim; there is no structured contract to parse.

use std::sync::Arc;
use std::time::Duration;

use crate::error::CalibrationResult;
use crate::models::ConceptNode;
use crate::services::completion::{complete_within, CompletionClient};

pub struct RepairTutor {
    client: Arc<dyn CompletionClient>,
    call_timeout: Duration,
}

impl RepairTutor {
    pub fn new(client: Arc<dyn CompletionClient>, call_timeout: Duration) -> Self {
        Self { client, call_timeout }
    }

    /// Explain `node`, focused on `missing_concepts` when any were recorded
    pub async fn explain(
        &self,
        topic: &str,
        node: &ConceptNode,
        prerequisites: &[String],
        missing_concepts: &[String],
    ) -> CalibrationResult<String> {
        let prompt = repair_prompt(topic, node, prerequisites, missing_concepts);
        let content = complete_within(self.client.as_ref(), &prompt, self.call_timeout).await?;

        tracing::debug!(node_id = %node.id, chars = content.len(), "Repair content generated");
        Ok(content)
    }
}

fn repair_prompt(
    topic: &str,
    node: &ConceptNode,
    prerequisites: &[String],
    missing_concepts: &[String],
) -> String {
    let focus = if missing_concepts.is_empty() {
        "Explain the concept and how it builds on its prerequisites.".to_string()
    } else {
        format!(
            "Explain only these missing dependencies clearly: {}.",
            missing_concepts.join(", ")
        )
    };
    let prerequisites = if prerequisites.is_empty() {
        "(none)".to_string()
    } else {
        prerequisites.join(", ")
    };

    format!(
        "Teach the concept \"{name}\" from the topic \"{topic}\".\n\
         Description: {description}\n\
         Prerequisites: {prerequisites}\n\
         {focus}\n\
         Use structured step-by-step explanation.\n\
         Keep it concise and focused.\n",
        name = node.name,
        topic = topic,
        description = node.description,
        prerequisites = prerequisites,
        focus = focus,
    )
}
