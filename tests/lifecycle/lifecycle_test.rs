//! DynamicQuery lifecycle: create, complete, rename.

use dynq::store::{DynamicQueryStore, QueryStatus, SqliteStore, StoreError};
use uuid::Uuid;

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

#[tokio::test]
async fn test_create_starts_in_progress() {
    let store = store();
    let record = store
        .create("Churn", "customers who cancelled last month")
        .await
        .unwrap();

    assert_eq!(record.status, QueryStatus::InProgress);
    assert_eq!(record.name, "Churn");
    assert_eq!(record.prompt, "customers who cancelled last month");
    assert!(record.query.is_none());
    assert!(record.response_id.is_none());
    assert!(!record.is_complete());

    let fetched = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn test_complete_sets_query_and_response_together() {
    let store = store();
    let record = store.create("Revenue", "revenue per region").await.unwrap();

    let done = store
        .complete(record.id, "SELECT 1", "resp_1")
        .await
        .unwrap();

    assert_eq!(done.status, QueryStatus::Complete);
    assert_eq!(done.query.as_deref(), Some("SELECT 1"));
    assert_eq!(done.response_id.as_deref(), Some("resp_1"));
    assert_eq!(done.created_at, record.created_at);
    assert!(done.updated_at >= record.updated_at);
}

#[tokio::test]
async fn test_rename_preserves_generation_state() {
    let store = store();
    let record = store.create("Draft", "orders by day").await.unwrap();
    store
        .complete(record.id, "SELECT 2", "resp_2")
        .await
        .unwrap();

    let renamed = store.rename(record.id, "Daily orders").await.unwrap();

    assert_eq!(renamed.name, "Daily orders");
    assert_eq!(renamed.prompt, "orders by day");
    assert_eq!(renamed.status, QueryStatus::Complete);
    assert_eq!(renamed.query.as_deref(), Some("SELECT 2"));
    assert_eq!(renamed.response_id.as_deref(), Some("resp_2"));
}

#[tokio::test]
async fn test_rename_in_progress_stays_in_progress() {
    let store = store();
    let record = store.create("Draft", "orders by day").await.unwrap();

    let renamed = store.rename(record.id, "Still drafting").await.unwrap();

    assert_eq!(renamed.status, QueryStatus::InProgress);
    assert!(renamed.query.is_none());
}

#[tokio::test]
async fn test_regeneration_overwrites_last_result() {
    let store = store();
    let record = store.create("Top products", "best sellers").await.unwrap();

    store.complete(record.id, "SELECT 1", "resp_a").await.unwrap();
    let second = store.complete(record.id, "SELECT 2", "resp_b").await.unwrap();

    assert_eq!(second.query.as_deref(), Some("SELECT 2"));
    assert_eq!(second.response_id.as_deref(), Some("resp_b"));
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transitions_on_missing_record() {
    let store = store();
    let id = Uuid::new_v4();

    assert!(store.get(id).await.unwrap().is_none());
    assert!(matches!(
        store.rename(id, "x").await,
        Err(StoreError::NotFound(missing)) if missing == id
    ));
    assert!(matches!(
        store.complete(id, "SELECT 1", "resp").await,
        Err(StoreError::NotFound(missing)) if missing == id
    ));
}
