//! Probe session endpoints
//!
//! Session-scoped routes are keyed by session id only. Creating a session
//! and listing history need caller identity.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::api::architect::required;
use crate::api::auth::AuthenticatedUser;
use crate::api::json::ApiJson;
use crate::error::CalibrationError;
use crate::models::{ConceptNode, ProbeSet, SessionSummary};
use crate::services::Report;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<ConceptNode>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub education_stage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub answers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RepairQuery {
    pub session_id: Option<String>,
    pub node_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProbesResponse {
    pub probes: ProbeSet,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub node_id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub sessions: Vec<SessionSummary>,
}

/// POST /api/probe/generate
///
/// Standalone probe generation for an already decomposed graph.
pub async fn generate_probes(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> ApiResult<Json<ProbesResponse>> {
    let topic = required(request.topic, "topic")?;
    let nodes = request
        .nodes
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CalibrationError::MissingParameter("nodes".to_string()))?;

    let probes = state.pipeline.generate_probes(&topic, &nodes).await?;
    Ok(Json(ProbesResponse { probes }))
}

/// POST /api/probe/create-session
///
/// **Request:** `{"topic": "...", "education_stage": "..."?}` plus identity headers
/// **Response:** `{"session_id": "..."}`
pub async fn create_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateSessionRequest>,
) -> ApiResult<Json<CreateSessionResponse>> {
    let topic = required(request.topic, "topic")?;

    let session_id = state
        .pipeline
        .create_session(&user.user_id, &topic, request.education_stage.as_deref())
        .await?;

    Ok(Json(CreateSessionResponse { session_id }))
}

/// GET /api/probe/session?id=
pub async fn get_session_probes(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<ProbesResponse>> {
    let session_id = parse_session_id(query.id, "id")?;
    let probes = state.pipeline.session_probes(session_id).await?;
    Ok(Json(ProbesResponse { probes }))
}

/// POST /api/probe/submit
///
/// **Request:** `{"session_id": "...", "answers": {"n1-0": "...", ...}}`
/// **Response:** `{"success": true}`
///
/// **Errors:**
/// - 404: unknown session
/// - 409: session already completed
pub async fn submit_answers(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SubmitRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    let session_id = parse_session_id(request.session_id, "session_id")?;
    let answers = request
        .answers
        .ok_or_else(|| CalibrationError::MissingParameter("answers".to_string()))?;

    state.pipeline.submit(session_id, answers).await?;
    Ok(Json(SubmitResponse { success: true }))
}

/// GET /api/probe/report?id=
pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Report>> {
    let session_id = parse_session_id(query.id, "id")?;
    Ok(Json(state.pipeline.report(session_id).await?))
}

/// GET /api/probe/repair?session_id=&node_id=
pub async fn get_repair(
    State(state): State<AppState>,
    Query(query): Query<RepairQuery>,
) -> ApiResult<Json<RepairResponse>> {
    let session_id = parse_session_id(query.session_id, "session_id")?;
    let node_id = required(query.node_id, "node_id")?;

    let content = state.pipeline.repair(session_id, &node_id).await?;
    Ok(Json(RepairResponse { node_id, content }))
}

/// GET /api/probe/history
pub async fn get_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<HistoryResponse>> {
    let sessions = state.pipeline.history(&user.user_id).await?;
    Ok(Json(HistoryResponse { sessions }))
}

fn parse_session_id(value: Option<String>, name: &str) -> ApiResult<Uuid> {
    let value = required(value, name)?;
    Uuid::parse_str(value.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid {}: {}", name, value)))
}

pub fn probe_routes() -> Router<AppState> {
    Router::new()
        .route("/api/probe/generate", post(generate_probes))
        .route("/api/probe/create-session", post(create_session))
        .route("/api/probe/session", get(get_session_probes))
        .route("/api/probe/submit", post(submit_answers))
        .route("/api/probe/report", get(get_report))
        .route("/api/probe/repair", get(get_repair))
        .route("/api/probe/history", get(get_history))
}
