//! Shared fixtures for aeth-cal integration tests

#![allow(dead_code)]

use aeth_cal::services::{
    CalibrationPipeline, CompletionClient, CompletionError, PipelineSettings,
};
use aeth_cal::AppState;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

pub const GRAPH_MARKER: &str = "curriculum decomposition engine";
pub const PROBES_MARKER: &str = "calibration question generator";
pub const JUDGMENT_MARKER: &str = "You are a calibration engine";
pub const REPAIR_MARKER: &str = "Teach the concept";

/// Answers containing these words get the matching canned judgment
pub const GOOD_ANSWER: &str = "GOOD explanation";
pub const PARTIAL_ANSWER: &str = "PARTIAL explanation";
pub const STALL_ANSWER: &str = "STALL explanation";

pub const TWO_NODE_GRAPH: &str = r#"```json
{"nodes": [
  {"id": "n1", "name": "Vectors", "description": "Magnitude and direction", "prerequisites": []},
  {"id": "n2", "name": "Forces", "description": "Interactions that change motion", "prerequisites": ["n1"]}
]}
```"#;

pub fn probes_for(node_ids: &[&str]) -> String {
    let probes: Vec<String> = node_ids
        .iter()
        .map(|id| {
            format!(
                r#"{{"node_id": "{id}", "questions": [
                    {{"type": "mcq", "question": "First about {id}?", "options": ["A","B","C","D"], "correct_answer": "A"}},
                    {{"type": "mcq", "question": "Second about {id}?", "options": ["A","B","C","D"], "correct_answer": "B"}},
                    {{"type": "short", "question": "Explain {id}"}}
                ]}}"#
            )
        })
        .collect();
    format!(r#"{{"probes": [{}]}}"#, probes.join(","))
}

/// Completion test double that answers by prompt kind
pub struct ScriptedClient {
    pub graph_reply: Mutex<String>,
    pub probes_reply: Mutex<String>,
    pub repair_reply: String,
    calls: Mutex<HashMap<&'static str, usize>>,
    total: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            graph_reply: Mutex::new(TWO_NODE_GRAPH.to_string()),
            probes_reply: Mutex::new(probes_for(&["n1", "n2"])),
            repair_reply: "Step 1: review vectors.".to_string(),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        })
    }

    pub fn with_graph(self: Arc<Self>, reply: &str) -> Arc<Self> {
        *self.graph_reply.lock().unwrap() = reply.to_string();
        self
    }

    pub fn with_probes(self: Arc<Self>, reply: &str) -> Arc<Self> {
        *self.probes_reply.lock().unwrap() = reply.to_string();
        self
    }

    pub fn calls(&self, kind: &str) -> usize {
        self.calls.lock().unwrap().get(kind).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn record(&self, kind: &'static str) {
        *self.calls.lock().unwrap().entry(kind).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if prompt.contains(GRAPH_MARKER) {
            self.record(GRAPH_MARKER);
            return Ok(self.graph_reply.lock().unwrap().clone());
        }
        if prompt.contains(PROBES_MARKER) {
            self.record(PROBES_MARKER);
            return Ok(self.probes_reply.lock().unwrap().clone());
        }
        if prompt.contains(JUDGMENT_MARKER) {
            self.record(JUDGMENT_MARKER);
            if prompt.contains(STALL_ANSWER) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if prompt.contains(GOOD_ANSWER) {
                return Ok(r#"{"score": 1.0, "missing_concepts": []}"#.to_string());
            }
            if prompt.contains(PARTIAL_ANSWER) {
                return Ok(r#"```json
{"score": 0.2, "missing_concepts": ["Vectors"]}
```"#
                    .to_string());
            }
            return Ok("The answer seems reasonable.".to_string());
        }
        if prompt.contains(REPAIR_MARKER) {
            self.record(REPAIR_MARKER);
            return Ok(self.repair_reply.clone());
        }
        Err(CompletionError::Api(400, "unexpected prompt".to_string()))
    }
}

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    aeth_cal::db::init_tables(&pool)
        .await
        .expect("Failed to initialize tables");
    pool
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        call_timeout: Duration::from_millis(200),
        judgment_concurrency: 4,
        default_education_stage: "Undergraduate".to_string(),
    }
}

pub async fn create_pipeline(client: Arc<ScriptedClient>) -> (CalibrationPipeline, SqlitePool) {
    let pool = memory_pool().await;
    let pipeline = CalibrationPipeline::new(pool.clone(), client, test_settings());
    (pipeline, pool)
}

/// Router with signature checking disabled unless `shared_secret` is non-zero
pub async fn create_test_app(client: Arc<ScriptedClient>, shared_secret: i64) -> (Router, SqlitePool) {
    let (pipeline, pool) = create_pipeline(client).await;
    let state = AppState::new(Arc::new(pipeline), shared_secret);
    (aeth_cal::build_router(state), pool)
}

/// Send a request through a clone of the router and decode the JSON body
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn post(app: &Router, uri: &str, body: Value, user: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-aeth-user", user);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn get(app: &Router, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-aeth-user", user);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}
