//! Integration tests for aeth-cal HTTP endpoints

mod helpers;

use aeth_common::api::{calculate_signature, now_millis};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::*;
use serde_json::{json, Value};

async fn create_session(app: &axum::Router, topic: &str) -> String {
    let (status, body) = post(
        app,
        "/api/probe/create-session",
        json!({ "topic": topic }),
        Some("student-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create-session failed: {}", body);
    body["session_id"].as_str().unwrap().to_string()
}

fn full_answers(explanation: &str) -> Value {
    json!({
        "n1-0": "A", "n1-1": "B", "n1-2": explanation,
        "n2-0": "A", "n2-1": "B", "n2-2": explanation,
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool) = create_test_app(ScriptedClient::new(), 0).await;

    let (status, body) = get(&app, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "aeth-cal");
}

#[tokio::test]
async fn test_architect_generates_then_serves_cache() {
    let client = ScriptedClient::new();
    let (app, _pool) = create_test_app(client.clone(), 0).await;
    let request = json!({ "topic": "Mechanics", "education_stage": "High School" });

    let (status, first) = post(&app, "/api/architect", request.clone(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source"], "generated");
    assert_eq!(first["graph"].as_array().unwrap().len(), 2);
    assert_eq!(first["graph"][1]["prerequisites"], json!(["n1"]));

    let (status, second) = post(&app, "/api/architect", request, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["source"], "cache");
    assert_eq!(second["fingerprint"], first["fingerprint"]);
    assert_eq!(second["graph"], first["graph"]);

    assert_eq!(client.calls(GRAPH_MARKER), 1);
}

#[tokio::test]
async fn test_architect_missing_parameters_is_400() {
    let (app, _pool) = create_test_app(ScriptedClient::new(), 0).await;

    let (status, body) = post(&app, "/api/architect", json!({ "topic": "Optics" }), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_PARAMETER");
}

#[tokio::test]
async fn test_architect_generation_and_validation_failures_are_distinct() {
    let garbage = ScriptedClient::new().with_graph("I'd rather not.");
    let (app, _pool) = create_test_app(garbage, 0).await;
    let (status, body) = post(
        &app,
        "/api/architect",
        json!({ "topic": "Optics", "education_stage": "High School" }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "GENERATION_FAILED");

    let cyclic = ScriptedClient::new().with_graph(
        r#"{"nodes": [
            {"id": "a", "name": "A", "prerequisites": ["b"]},
            {"id": "b", "name": "B", "prerequisites": ["a"]}
        ]}"#,
    );
    let (app, _pool) = create_test_app(cyclic, 0).await;
    let (status, body) = post(
        &app,
        "/api/architect",
        json!({ "topic": "Optics", "education_stage": "High School" }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_unreadable_body_uses_error_envelope() {
    let client = ScriptedClient::new();
    let (app, _pool) = create_test_app(client.clone(), 0).await;

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/architect")
        .header("content-type", "application/json")
        .body(Body::from("{\"topic\": \"Optics\""))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let untyped = Request::builder()
        .method("POST")
        .uri("/api/probe/submit")
        .body(Body::from(r#"{"session_id": "x", "answers": {}}"#))
        .unwrap();
    let (status, body) = send(&app, untyped).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = post(
        &app,
        "/api/probe/submit",
        json!({ "session_id": "x", "answers": ["not", "a", "map"] }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    assert_eq!(client.total_calls(), 0);
}

#[tokio::test]
async fn test_generate_probes_endpoint() {
    let (app, _pool) = create_test_app(ScriptedClient::new(), 0).await;
    let nodes = json!([
        { "id": "n1", "name": "Vectors", "description": "", "prerequisites": [] },
        { "id": "n2", "name": "Forces", "description": "", "prerequisites": ["n1"] }
    ]);

    let (status, body) = post(
        &app,
        "/api/probe/generate",
        json!({ "topic": "Mechanics", "nodes": nodes }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let probes = body["probes"].as_array().unwrap();
    assert_eq!(probes.len(), 2);
    assert_eq!(probes[0]["node_name"], "Vectors");
    assert_eq!(probes[0]["questions"][0]["type"], "mcq");
    assert_eq!(probes[0]["questions"][2]["type"], "short");
}

#[tokio::test]
async fn test_create_session_requires_identity() {
    let client = ScriptedClient::new();
    let (app, _pool) = create_test_app(client.clone(), 0).await;

    let (status, body) = post(
        &app,
        "/api/probe/create-session",
        json!({ "topic": "Mechanics" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(client.total_calls(), 0);
}

#[tokio::test]
async fn test_signed_identity_accepted_and_bad_signature_rejected() {
    let secret = 424242;
    let (app, _pool) = create_test_app(ScriptedClient::new(), secret).await;
    let timestamp = now_millis();

    let signed = Request::builder()
        .uri("/api/probe/history")
        .header("x-aeth-user", "student-9")
        .header("x-aeth-timestamp", timestamp.to_string())
        .header(
            "x-aeth-signature",
            calculate_signature("student-9", timestamp, secret),
        )
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, signed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"], json!([]));

    let forged = Request::builder()
        .uri("/api/probe/history")
        .header("x-aeth-user", "student-9")
        .header("x-aeth-timestamp", timestamp.to_string())
        .header(
            "x-aeth-signature",
            calculate_signature("someone-else", timestamp, secret),
        )
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stale_ts = timestamp - 120_000;
    let stale = Request::builder()
        .uri("/api/probe/history")
        .header("x-aeth-user", "student-9")
        .header("x-aeth-timestamp", stale_ts.to_string())
        .header(
            "x-aeth-signature",
            calculate_signature("student-9", stale_ts, secret),
        )
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, stale).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let client = ScriptedClient::new();
    let (app, _pool) = create_test_app(client.clone(), 0).await;
    let session_id = create_session(&app, "Mechanics").await;

    let (status, body) = get(&app, &format!("/api/probe/session?id={}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let node_ids: Vec<&str> = body["probes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["node_id"].as_str().unwrap())
        .collect();
    assert_eq!(node_ids, vec!["n1", "n2"]);

    let (status, report) = get(&app, &format!("/api/probe/report?id={}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "in_progress");
    assert_eq!(report["overall_score"], Value::Null);
    assert_eq!(report["nodes"], json!([]));

    let (status, body) = post(
        &app,
        "/api/probe/submit",
        json!({ "session_id": session_id, "answers": full_answers(GOOD_ANSWER) }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, report) = get(&app, &format!("/api/probe/report?id={}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "completed");
    assert_eq!(report["overall_score"], 1.0);
    assert_eq!(report["nodes"][0]["classification"], "Stable");
    assert_eq!(report["nodes"][1]["node_name"], "Forces");

    assert_eq!(client.calls(JUDGMENT_MARKER), 2);
}

#[tokio::test]
async fn test_resubmission_is_conflict_and_score_unchanged() {
    let client = ScriptedClient::new();
    let (app, _pool) = create_test_app(client.clone(), 0).await;
    let session_id = create_session(&app, "Mechanics").await;

    let (status, _) = post(
        &app,
        "/api/probe/submit",
        json!({ "session_id": session_id, "answers": full_answers(PARTIAL_ANSWER) }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, before) = get(&app, &format!("/api/probe/report?id={}", session_id), None).await;

    let (status, body) = post(
        &app,
        "/api/probe/submit",
        json!({ "session_id": session_id, "answers": full_answers(GOOD_ANSWER) }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, after) = get(&app, &format!("/api/probe/report?id={}", session_id), None).await;
    assert_eq!(after["overall_score"], before["overall_score"]);
    assert_eq!(client.calls(JUDGMENT_MARKER), 2);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (app, _pool) = create_test_app(ScriptedClient::new(), 0).await;
    let unknown = uuid::Uuid::new_v4();

    let (status, _) = get(&app, &format!("/api/probe/session?id={}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, &format!("/api/probe/report?id={}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(
        &app,
        "/api/probe/submit",
        json!({ "session_id": unknown, "answers": {} }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_and_missing_session_ids() {
    let (app, _pool) = create_test_app(ScriptedClient::new(), 0).await;

    let (status, body) = get(&app, "/api/probe/report", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_PARAMETER");

    let (status, body) = get(&app, "/api/probe/report?id=not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_repair_endpoint() {
    let client = ScriptedClient::new();
    let (app, _pool) = create_test_app(client.clone(), 0).await;
    let session_id = create_session(&app, "Mechanics").await;

    let (status, body) = get(
        &app,
        &format!("/api/probe/repair?session_id={}&node_id=n2", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["node_id"], "n2");
    assert_eq!(body["content"], "Step 1: review vectors.");

    let (status, _) = get(
        &app,
        &format!("/api/probe/repair?session_id={}&node_id=n99", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(client.calls(REPAIR_MARKER), 1);
}

#[tokio::test]
async fn test_history_is_scoped_to_caller() {
    let (app, _pool) = create_test_app(ScriptedClient::new(), 0).await;
    create_session(&app, "Mechanics").await;
    create_session(&app, "Optics").await;

    let (status, body) = get(&app, "/api/probe/history", Some("student-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 2);

    let (status, body) = get(&app, "/api/probe/history", Some("student-2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"], json!([]));
}
