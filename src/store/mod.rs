//! Durable storage for DynamicQuery records.
//!
//! The store exposes the lifecycle transitions as its only write operations:
//!
//! ```text
//! create(name, prompt)          -> InProgress, no query, no response id
//! complete(id, query, response) -> Complete   (query and response id set together)
//! rename(id, name)              -> name only; status and query untouched
//! ```
//!
//! Concurrent generations for the same record are not serialized; the last
//! `complete` wins.

mod record;
mod sqlite;

pub use record::{DynamicQuery, QueryStatus};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use uuid::Uuid;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("dynamic query {0} not found")]
    NotFound(Uuid),

    #[error("Failed to determine data directory")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for DynamicQuery records.
#[async_trait]
pub trait DynamicQueryStore: Send + Sync {
    /// Create a record in the `InProgress` state.
    async fn create(&self, name: &str, prompt: &str) -> StoreResult<DynamicQuery>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<DynamicQuery>>;

    /// All records, newest first.
    async fn list(&self) -> StoreResult<Vec<DynamicQuery>>;

    /// Change the name only.
    async fn rename(&self, id: Uuid, name: &str) -> StoreResult<DynamicQuery>;

    /// Record a successful generation: query text, response id and the
    /// `Complete` status are written in one statement.
    async fn complete(&self, id: Uuid, query: &str, response_id: &str)
        -> StoreResult<DynamicQuery>;
}
