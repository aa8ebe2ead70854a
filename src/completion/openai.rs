//! OpenAI Responses API client.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

use super::{
    Completion, CompletionClient, CompletionError, CompletionRequest, CompletionResult,
    EventStream, ProviderEvent, RESPONSE_COMPLETED,
};
use crate::sse::{SseDecoder, SseFrame};

/// Client for `POST {base_url}/responses`.
///
/// The configured timeout bounds the whole exchange, including reading a
/// streamed body, so a stalled provider cannot hold a request open forever.
pub struct ResponsesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ResponsesClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> CompletionResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn send(&self, body: &Value) -> CompletionResult<reqwest::Response> {
        let url = format!("{}/responses", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }
        Ok(response)
    }
}

/// JSON body for a Responses API request.
pub(crate) fn request_body(request: &CompletionRequest, stream: bool) -> Value {
    let tools: Vec<Value> = request
        .tools
        .iter()
        .map(|tool| {
            json!({
                "type": "mcp",
                "server_label": tool.server_label,
                "server_description": tool.server_description,
                "server_url": tool.server_url,
                "allowed_tools": tool.allowed_tools,
                "require_approval": {
                    "never": { "tool_names": tool.allowed_tools }
                }
            })
        })
        .collect();

    let mut body = json!({
        "model": request.model,
        "instructions": request.instructions,
        "input": request.input,
        "text": {
            "format": {
                "type": "json_schema",
                "name": request.output_schema.name,
                "description": request.output_schema.description,
                "schema": request.output_schema.schema,
                "strict": request.output_schema.strict,
            }
        },
        "tools": tools,
    });

    if stream {
        body["stream"] = Value::Bool(true);
    }
    if let Some(previous) = &request.previous_response_id {
        body["previous_response_id"] = Value::String(previous.clone());
    }
    body
}

/// Extract id and concatenated `output_text` parts from a response object.
pub(crate) fn parse_response(response: &Value) -> CompletionResult<Completion> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let message = error["message"].as_str().unwrap_or("unknown error");
        return Err(CompletionError::Provider(message.to_string()));
    }

    let id = response["id"]
        .as_str()
        .ok_or_else(|| CompletionError::Malformed("response has no id".into()))?
        .to_string();

    let output_text = response["output"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|item| item["type"] == "message")
        .flat_map(|item| item["content"].as_array().into_iter().flatten())
        .filter(|part| part["type"] == "output_text")
        .filter_map(|part| part["text"].as_str())
        .collect::<String>();

    Ok(Completion { id, output_text })
}

/// Map one decoded SSE frame to a provider event.
pub(crate) fn parse_event(frame: &SseFrame) -> CompletionResult<Option<ProviderEvent>> {
    let Some(data) = frame.data() else {
        return Ok(None);
    };
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let payload: Value = serde_json::from_str(data)
        .map_err(|e| CompletionError::Malformed(format!("event payload: {}", e)))?;
    let event_type = payload["type"]
        .as_str()
        .or(frame.name())
        .unwrap_or_default()
        .to_string();

    match event_type.as_str() {
        RESPONSE_COMPLETED => Ok(Some(ProviderEvent::Completed(parse_response(
            &payload["response"],
        )?))),
        "error" => {
            let message = payload["message"].as_str().unwrap_or("stream error");
            Err(CompletionError::Provider(message.to_string()))
        }
        _ => Ok(Some(ProviderEvent::Progress { event_type })),
    }
}

fn events(response: reqwest::Response) -> impl Stream<Item = CompletionResult<ProviderEvent>> {
    try_stream! {
        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                if let Some(event) = parse_event(&frame)? {
                    yield event;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            if let Some(event) = parse_event(&frame)? {
                yield event;
            }
        }
    }
}

#[async_trait]
impl CompletionClient for ResponsesClient {
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<Completion> {
        let response = self.send(&request_body(request, false)).await?;
        let json: Value = response.json().await?;
        parse_response(&json)
    }

    async fn stream(&self, request: &CompletionRequest) -> CompletionResult<EventStream> {
        let response = self.send(&request_body(request, true)).await?;
        Ok(events(response).boxed())
    }
}
