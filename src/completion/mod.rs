//! Completion service boundary.
//!
//! The generation orchestrator talks to the language-model provider only
//! through [`CompletionClient`], either as a single blocking round trip or as
//! a lazy stream of [`ProviderEvent`]s. [`ResponsesClient`] implements it over
//! an OpenAI-compatible Responses API; tests substitute a scripted double.

mod openai;

pub use openai::ResponsesClient;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Event type the provider emits once a streamed response is finished.
pub const RESPONSE_COMPLETED: &str = "response.completed";

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion service error: {0}")]
    Provider(String),

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

pub type CompletionResult<T> = Result<T, CompletionError>;

/// Strict JSON schema the provider's final output must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

/// A remote tool server the model may call during generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSource {
    pub server_label: String,
    pub server_description: String,
    pub server_url: String,
    /// Tools the model may see; all of them run without approval.
    pub allowed_tools: Vec<String>,
}

/// One generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub instructions: String,
    pub input: String,
    pub output_schema: OutputSchema,
    pub tools: Vec<ToolSource>,
    /// Continue the provider-side conversation of an earlier response.
    pub previous_response_id: Option<String>,
}

/// A finished provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Provider correlation id.
    pub id: String,
    /// Concatenated output text; expected to match the output schema.
    pub output_text: String,
}

/// An incremental event of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Any non-terminal event, identified by its type tag.
    Progress { event_type: String },
    /// The terminal `response.completed` event.
    Completed(Completion),
}

impl ProviderEvent {
    pub fn progress(event_type: &str) -> Self {
        ProviderEvent::Progress {
            event_type: event_type.into(),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            ProviderEvent::Progress { event_type } => event_type,
            ProviderEvent::Completed(_) => RESPONSE_COMPLETED,
        }
    }
}

/// Lazy, finite sequence of provider events. A yielded error ends the stream.
pub type EventStream = BoxStream<'static, CompletionResult<ProviderEvent>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit a request and wait for the finished response.
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<Completion>;

    /// Submit a request and receive its events as they are produced.
    async fn stream(&self, request: &CompletionRequest) -> CompletionResult<EventStream>;
}
