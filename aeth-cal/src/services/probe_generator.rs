//! Probe Generator: one batch completion call per graph
//!
//! Probes are never cached. Every session gets a fresh set.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CalibrationError, CalibrationResult};
use crate::models::probe::{validate_probe_set, MCQ_PER_NODE, OPTIONS_PER_MCQ, SHORT_PER_NODE};
use crate::models::{ConceptNode, NodeProbe, ProbeSet};
use crate::services::completion::{complete_within, CompletionClient};
use crate::utils::parse_structured;

#[derive(Debug, Deserialize)]
struct GeneratedProbes {
    probes: Vec<NodeProbe>,
}

pub struct ProbeGenerator {
    client: Arc<dyn CompletionClient>,
    call_timeout: Duration,
}

impl ProbeGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, call_timeout: Duration) -> Self {
        Self { client, call_timeout }
    }

    /// Generate and validate probes covering every node exactly once
    ///
    /// Returned probes follow `nodes` order with `node_name` filled in.
    pub async fn build_probes(&self, topic: &str, nodes: &[ConceptNode]) -> CalibrationResult<ProbeSet> {
        if topic.trim().is_empty() {
            return Err(CalibrationError::MissingParameter("topic".to_string()));
        }
        if nodes.is_empty() {
            return Err(CalibrationError::MissingParameter("nodes".to_string()));
        }

        let prompt = probe_prompt(topic, nodes)?;
        let raw = complete_within(self.client.as_ref(), &prompt, self.call_timeout)
            .await
            .map_err(|e| CalibrationError::Generation(e.to_string()))?;

        let generated: GeneratedProbes = parse_structured(&raw).map_err(|e| {
            tracing::warn!(topic, error = %e, "Unparseable probe set");
            CalibrationError::Generation(e.to_string())
        })?;

        let probes = validate_probe_set(nodes, generated.probes).map_err(|e| {
            tracing::warn!(topic, error = %e, "Probe set rejected");
            e
        })?;

        tracing::info!(topic, node_count = probes.len(), "Probes generated");
        Ok(probes)
    }
}

fn probe_prompt(topic: &str, nodes: &[ConceptNode]) -> CalibrationResult<String> {
    let nodes_json = serde_json::to_string(nodes)
        .map_err(|e| CalibrationError::Generation(format!("Failed to serialize nodes: {}", e)))?;

    Ok(format!(
        r#"You are a calibration question generator.

Topic: {topic}

Nodes:
{nodes_json}

For each node, generate:
- {mcq} MCQs ({options} options each, all distinct)
- {short} short explanation question

Return ONLY JSON in this format:

{{
  "probes": [
    {{
      "node_id": "n1",
      "questions": [
        {{
          "type": "mcq",
          "question": "...",
          "options": ["A", "B", "C", "D"],
          "correct_answer": "A"
        }},
        {{
          "type": "short",
          "question": "Explain ..."
        }}
      ]
    }}
  ]
}}

correct_answer must be copied exactly from options.
"#,
        topic = topic,
        nodes_json = nodes_json,
        mcq = MCQ_PER_NODE,
        options = OPTIONS_PER_MCQ,
        short = SHORT_PER_NODE,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::completion::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for Recorder {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn generator(reply: &str) -> (ProbeGenerator, Arc<Recorder>) {
        let client = Arc::new(Recorder {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        (ProbeGenerator::new(client.clone(), Duration::from_secs(5)), client)
    }

    fn nodes() -> Vec<ConceptNode> {
        ["n1", "n2"]
            .iter()
            .map(|id| ConceptNode {
                id: id.to_string(),
                name: format!("Concept {}", id),
                description: String::new(),
                prerequisites: Vec::new(),
            })
            .collect()
    }

    fn probe_json(node_id: &str) -> String {
        format!(
            r#"{{"node_id": "{}", "questions": [
                {{"type": "mcq", "question": "Q1", "options": ["A","B","C","D"], "correct_answer": "A"}},
                {{"type": "mcq", "question": "Q2", "options": ["A","B","C","D"], "correct_answer": "C"}},
                {{"type": "short", "question": "Explain"}}
            ]}}"#,
            node_id
        )
    }

    #[tokio::test]
    async fn test_single_batched_call_covering_all_nodes() {
        let reply = format!(r#"{{"probes": [{}, {}]}}"#, probe_json("n2"), probe_json("n1"));
        let (generator, client) = generator(&reply);

        let probes = generator.build_probes("Mechanics", &nodes()).await.unwrap();

        let ids: Vec<&str> = probes.iter().map(|p| p.node_id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
        assert_eq!(probes[1].node_name, "Concept n2");

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("You are a calibration question generator"));
        assert!(prompts[0].contains("\"id\":\"n2\""));
    }

    #[tokio::test]
    async fn test_missing_node_is_validation_error() {
        let reply = format!(r#"{{"probes": [{}]}}"#, probe_json("n1"));
        let (generator, _) = generator(&reply);

        let err = generator.build_probes("Mechanics", &nodes()).await.unwrap_err();
        assert!(matches!(err, CalibrationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_garbage_is_generation_error() {
        let (generator, _) = generator("not json at all");
        let err = generator.build_probes("Mechanics", &nodes()).await.unwrap_err();
        assert!(matches!(err, CalibrationError::Generation(_)));
    }

    #[tokio::test]
    async fn test_empty_inputs_are_missing_parameters() {
        let (generator, client) = generator("{}");

        assert!(matches!(
            generator.build_probes("Mechanics", &[]).await,
            Err(CalibrationError::MissingParameter(_))
        ));
        assert!(matches!(
            generator.build_probes("", &nodes()).await,
            Err(CalibrationError::MissingParameter(_))
        ));
        assert!(client.prompts.lock().unwrap().is_empty());
    }
}
