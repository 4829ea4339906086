//! Build graph endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::json::ApiJson;
use crate::error::CalibrationError;
use crate::models::{ConceptNode, GraphSource};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ArchitectRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub education_stage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArchitectResponse {
    pub source: GraphSource,
    pub fingerprint: String,
    pub graph: Vec<ConceptNode>,
}

/// POST /api/architect
///
/// **Request:** `{"topic": "...", "education_stage": "..."}`
/// **Response:** `{"source": "cache"|"generated", "fingerprint": "...", "graph": [nodes]}`
///
/// **Errors:**
/// - 400: topic or education_stage missing
/// - 500: generation (`GENERATION_FAILED`) or validation (`VALIDATION_FAILED`) failure
pub async fn build_graph(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ArchitectRequest>,
) -> ApiResult<Json<ArchitectResponse>> {
    let topic = required(request.topic, "topic")?;
    let education_stage = required(request.education_stage, "education_stage")?;

    let outcome = state.pipeline.build_graph(&topic, &education_stage).await?;

    Ok(Json(ArchitectResponse {
        source: outcome.source,
        fingerprint: outcome.graph.fingerprint,
        graph: outcome.graph.nodes,
    }))
}

/// Non-blank string field or `MissingParameter`
pub(crate) fn required(value: Option<String>, name: &str) -> Result<String, CalibrationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CalibrationError::MissingParameter(name.to_string()))
}

pub fn architect_routes() -> Router<AppState> {
    Router::new().route("/api/architect", post(build_graph))
}
