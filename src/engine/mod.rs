//! Analytic engine boundary and the execution service.
//!
//! Generated queries produce a single scalar: a JSON document with
//! `columns` metadata and `data` rows. [`ExecutionService`] runs a record's
//! stored query and returns that scalar as a JSON value.

mod trino;

pub use trino::TrinoClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::store::DynamicQuery;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("query failed ({name}): {message}")]
    Query { name: String, message: String },

    #[error("query returned no rows")]
    NoRows,

    #[error("malformed engine response: {0}")]
    Malformed(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// An engine that runs one SQL statement and returns its first column of
/// its first row.
#[async_trait]
pub trait AnalyticEngine: Send + Sync {
    async fn query_scalar(&self, sql: &str) -> EngineResult<Value>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("dynamic query {0} has no generated SQL yet")]
    NotGenerated(Uuid),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Runs stored queries against the analytic engine.
#[derive(Clone)]
pub struct ExecutionService {
    engine: Arc<dyn AnalyticEngine>,
}

impl ExecutionService {
    pub fn new(engine: Arc<dyn AnalyticEngine>) -> Self {
        Self { engine }
    }

    /// Strip one trailing `;` and any whitespace after it. Statements
    /// without a separator are passed through untouched.
    pub fn prepare(sql: &str) -> &str {
        match sql.trim_end().strip_suffix(';') {
            Some(stripped) => stripped,
            None => sql,
        }
    }

    /// Run arbitrary SQL and return the scalar result.
    pub async fn execute(&self, sql: &str) -> EngineResult<Value> {
        self.engine.query_scalar(Self::prepare(sql)).await
    }

    /// Run a record's stored query.
    ///
    /// Status is not checked: any stored query runs, and a record without
    /// one fails with [`ExecutionError::NotGenerated`].
    pub async fn run(&self, record: &DynamicQuery) -> Result<Value, ExecutionError> {
        let sql = record
            .query
            .as_deref()
            .ok_or(ExecutionError::NotGenerated(record.id))?;
        info!(query_id = %record.id, "executing dynamic query");
        Ok(self.execute(sql).await?)
    }
}
