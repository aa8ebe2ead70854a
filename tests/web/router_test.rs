//! HTTP routes served over in-process doubles.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use dynq::engine::ExecutionService;
use dynq::generation::GenerationSettings;
use dynq::sql::Compiler;
use dynq::store::DynamicQueryStore;
use dynq::web::{router, AppState};

use common::{completed, orchestrator, progress, RecordingEngine, ScriptedCompletion};

struct Harness {
    app: Router,
    store: Arc<dyn DynamicQueryStore>,
    engine: Arc<RecordingEngine>,
}

fn harness(completion: ScriptedCompletion) -> Harness {
    let (store, orchestrator) = orchestrator(Arc::new(completion), GenerationSettings::default());
    let engine = Arc::new(RecordingEngine::returning(json!({ "columns": [], "data": [] })));
    let state = AppState {
        store: Arc::clone(&store),
        orchestrator,
        execution: ExecutionService::new(engine.clone()),
        compiler: Compiler::new(),
    };
    Harness {
        app: router(Arc::new(state)),
        store,
        engine,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_json(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_create_then_fetch() {
    let h = harness(ScriptedCompletion::new());

    let (status, body) = send_json(
        &h.app,
        with_json(
            Method::POST,
            "/api/dynamic-queries",
            json!({ "name": "Churn", "prompt": "customers who left" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Success");
    let id = body["data"].as_str().unwrap().to_string();

    let (status, body) = send_json(&h.app, get(&format!("/api/dynamic-queries/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Churn");
    assert_eq!(body["data"]["status"], "in_progress");
    assert_eq!(body["data"]["query"], Value::Null);

    let (status, body) = send_json(&h.app, get("/api/dynamic-queries")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_requires_name_and_prompt() {
    let h = harness(ScriptedCompletion::new());

    let (status, body) = send_json(
        &h.app,
        with_json(
            Method::POST,
            "/api/dynamic-queries",
            json!({ "name": " ", "prompt": "anything" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    let (status, _) = send_json(
        &h.app,
        with_json(Method::POST, "/api/dynamic-queries", json!({ "name": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_and_unknown_ids() {
    let h = harness(ScriptedCompletion::new());

    let (status, body) = send_json(&h.app, get("/api/dynamic-queries/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    let unknown = uuid::Uuid::new_v4();
    let (status, body) =
        send_json(&h.app, get(&format!("/api/dynamic-queries/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");

    let (status, _) = send_json(
        &h.app,
        get(&format!("/api/dynamic-queries/{}/generate", unknown)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename() {
    let h = harness(ScriptedCompletion::new());
    let record = h.store.create("Draft", "orders by day").await.unwrap();

    let (status, body) = send_json(
        &h.app,
        with_json(
            Method::PUT,
            &format!("/api/dynamic-queries/{}", record.id),
            json!({ "name": "Daily orders" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Daily orders");
    assert_eq!(body["data"]["prompt"], "orders by day");
}

#[tokio::test]
async fn test_blocking_generate_then_results() {
    let h = harness(
        ScriptedCompletion::new().with_completion("resp_1", r#"{"sql_query":"SELECT 1;"}"#),
    );
    let record = h.store.create("One", "the number one").await.unwrap();

    let (status, _) = send_json(
        &h.app,
        get(&format!("/api/dynamic-queries/{}/results", record.id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/dynamic-queries/{}/generate", record.id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "complete");

    let (status, body) = send_json(
        &h.app,
        get(&format!("/api/dynamic-queries/{}/results", record.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "columns": [], "data": [] }));
    assert_eq!(h.engine.statements(), vec!["SELECT 1"]);
}

#[tokio::test]
async fn test_streaming_generate() {
    let h = harness(ScriptedCompletion::new().with_stream(vec![
        progress("response.created"),
        completed("resp_1", r#"{"sql_query":"SELECT 1"}"#),
    ]));
    let record = h.store.create("One", "the number one").await.unwrap();

    let response = h
        .app
        .clone()
        .oneshot(get(&format!("/api/dynamic-queries/{}/generate", record.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(
        body,
        concat!(
            ": connected\n\n",
            "event: current_type\ndata: \"response.created\"\n\n",
            "event: response_completed\ndata: {\"sql_query\":\"SELECT 1\"}\n\n",
            "event: done\n\n",
        )
    );

    let stored = h.store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.query.as_deref(), Some("SELECT 1"));
}

#[tokio::test]
async fn test_system_sql() {
    let h = harness(ScriptedCompletion::new());

    let (status, body) = send(&h.app, get("/api/dynamic-queries/sql")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("SELECT\n  t1.Email AS Email,"), "{}", body);
    assert!(body.contains(") AS t2 ON t1.AddressId = t2.Id"), "{}", body);
}

#[tokio::test]
async fn test_compile_posted_spec() {
    let h = harness(ScriptedCompletion::new());
    let spec = json!({
        "table": { "table": "users", "isPrimary": true },
        "columns": [
            { "table": { "table": "users", "isPrimary": true }, "column": "email", "label": "Email" }
        ]
    });

    let (status, body) = send(
        &h.app,
        with_json(Method::POST, "/api/query-specs/compile", spec),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "SELECT\n  t1.email AS Email\nFROM users AS t1");

    let unresolved = json!({
        "table": { "table": "users", "isPrimary": true },
        "columns": [{ "table": { "table": "orders" }, "column": "id" }]
    });
    let (status, body) = send_json(
        &h.app,
        with_json(Method::POST, "/api/query-specs/compile", unresolved),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("'orders'"));
}
