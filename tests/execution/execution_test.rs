//! Running stored queries through the execution service.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use serde_json::json;

use dynq::engine::{EngineError, ExecutionError, ExecutionService};
use dynq::store::{DynamicQueryStore, SqliteStore};

use common::RecordingEngine;

fn result_document() -> serde_json::Value {
    json!({
        "columns": [{ "name": "Email", "type": "varchar", "label": "Email" }],
        "data": [{ "Email": "ada@example.com" }],
    })
}

#[tokio::test]
async fn test_run_strips_trailing_separator() {
    let engine = Arc::new(RecordingEngine::returning(result_document()));
    let service = ExecutionService::new(engine.clone());
    let store = SqliteStore::open_in_memory().unwrap();
    let record = store.create("Emails", "all emails").await.unwrap();
    let record = store
        .complete(record.id, "SELECT email FROM crm.public.customers;\n", "resp_1")
        .await
        .unwrap();

    let value = service.run(&record).await.unwrap();

    assert_eq!(value, result_document());
    assert_eq!(
        engine.statements(),
        vec!["SELECT email FROM crm.public.customers"]
    );
}

#[tokio::test]
async fn test_only_one_separator_is_removed() {
    let engine = Arc::new(RecordingEngine::returning(json!(1)));
    let service = ExecutionService::new(engine.clone());

    service.execute("SELECT 1;;").await.unwrap();

    assert_eq!(engine.statements(), vec!["SELECT 1;"]);
}

#[tokio::test]
async fn test_statement_without_separator_is_verbatim() {
    let engine = Arc::new(RecordingEngine::returning(json!(1)));
    let service = ExecutionService::new(engine.clone());

    service.execute("SELECT 1  \n").await.unwrap();

    assert_eq!(engine.statements(), vec!["SELECT 1  \n"]);
}

#[tokio::test]
async fn test_record_without_query() {
    let engine = Arc::new(RecordingEngine::returning(json!(1)));
    let service = ExecutionService::new(engine.clone());
    let store = SqliteStore::open_in_memory().unwrap();
    let record = store.create("Pending", "not generated yet").await.unwrap();

    let err = service.run(&record).await.unwrap_err();

    assert!(matches!(err, ExecutionError::NotGenerated(id) if id == record.id));
    assert!(engine.statements().is_empty());
}

#[tokio::test]
async fn test_engine_errors_propagate() {
    let engine = Arc::new(RecordingEngine::failing(
        "TABLE_NOT_FOUND",
        "Table 'crm.public.nope' does not exist",
    ));
    let service = ExecutionService::new(engine);

    let err = service.execute("SELECT * FROM crm.public.nope").await.unwrap_err();

    assert!(matches!(err, EngineError::Query { ref name, .. } if name == "TABLE_NOT_FOUND"));
    assert_eq!(
        err.to_string(),
        "query failed (TABLE_NOT_FOUND): Table 'crm.public.nope' does not exist"
    );
}
