//! Generation orchestrator.
//!
//! Turns a DynamicQuery's prompt into SQL through the completion service and
//! records the result. Two entry points share one request builder:
//!
//! - [`Orchestrator::generate`] waits for the finished response.
//! - [`Orchestrator::stream`] relays provider events to the caller as SSE
//!   frames while the response is produced (see [`stream`]).
//!
//! A generation only ever moves a record to `Complete`. Any failure is
//! logged and the record stays `InProgress`, so a caller may simply retry.

pub mod instructions;
pub mod stream;

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::completion::{CompletionClient, CompletionError, CompletionRequest, ToolSource};
use crate::sse::SseFrame;
use crate::store::{DynamicQuery, DynamicQueryStore, StoreError};

pub use instructions::{parse_output, GeneratedQuery};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("dynamic query {0} not found")]
    NotFound(Uuid),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("completion output failed validation: {0}")]
    InvalidOutput(String),

    #[error("instruction encoding failed: {0}")]
    Instructions(#[from] toon_format::ToonError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Model and tool configuration for generation requests.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub tool_server_label: String,
    pub tool_server_description: String,
    pub tool_server_url: String,
    /// Emit an `error` SSE event before a stream ends on failure.
    pub emit_error_events: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-5-mini".to_string(),
            tool_server_label: "warehouse_mcp".to_string(),
            tool_server_description:
                "Catalog browser for the analytic engine: lists catalogs, schemas and tables."
                    .to_string(),
            tool_server_url: "http://localhost:6174/mcp".to_string(),
            emit_error_events: false,
        }
    }
}

/// Coordinates the store and the completion service.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn DynamicQueryStore>,
    completion: Arc<dyn CompletionClient>,
    settings: GenerationSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn DynamicQueryStore>,
        completion: Arc<dyn CompletionClient>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            completion,
            settings,
        }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Build the provider request for a record.
    ///
    /// A record that already has a response id continues that provider
    /// conversation.
    pub fn request_for(&self, record: &DynamicQuery) -> GenerationResult<CompletionRequest> {
        Ok(CompletionRequest {
            model: self.settings.model.clone(),
            instructions: instructions::render()?,
            input: record.prompt.clone(),
            output_schema: instructions::output_schema(),
            tools: vec![ToolSource {
                server_label: self.settings.tool_server_label.clone(),
                server_description: self.settings.tool_server_description.clone(),
                server_url: self.settings.tool_server_url.clone(),
                allowed_tools: instructions::CATALOG_TOOLS
                    .iter()
                    .map(|t| t.to_string())
                    .collect(),
            }],
            previous_response_id: record.response_id.clone(),
        })
    }

    async fn load(&self, id: Uuid) -> GenerationResult<DynamicQuery> {
        self.store
            .get(id)
            .await?
            .ok_or(GenerationError::NotFound(id))
    }

    /// Generate SQL for a record and wait for the result.
    ///
    /// Returns the updated record. On any error the record is left as it was.
    pub async fn generate(&self, id: Uuid) -> GenerationResult<DynamicQuery> {
        let record = self.load(id).await?;
        info!(query_id = %id, "generating dynamic query");

        let request = self.request_for(&record)?;
        let completion = self.completion.complete(&request).await.map_err(|e| {
            warn!(query_id = %id, error = %e, "completion failed");
            e
        })?;
        info!(query_id = %id, response_id = %completion.id, "completion received");

        let output = parse_output(&completion.output_text).map_err(|e| {
            warn!(query_id = %id, error = %e, "discarding completion output");
            e
        })?;

        let updated = self
            .store
            .complete(id, &output.sql_query, &completion.id)
            .await?;
        info!(query_id = %id, "dynamic query complete");
        Ok(updated)
    }

    /// Start a streaming generation for a record.
    ///
    /// Fails before any frame is produced only when the record does not
    /// exist or the instructions cannot be encoded; everything after that is
    /// reported inside the stream.
    pub async fn stream(&self, id: Uuid) -> GenerationResult<BoxStream<'static, SseFrame>> {
        let record = self.load(id).await?;
        let request = self.request_for(&record)?;
        Ok(stream::relay(
            Arc::clone(&self.store),
            Arc::clone(&self.completion),
            record.id,
            request,
            self.settings.emit_error_events,
        )
        .boxed())
    }
}
