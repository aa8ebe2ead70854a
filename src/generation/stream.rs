//! Streaming relay from provider events to SSE frames.
//!
//! Frames, in order:
//!
//! ```text
//! : connected
//!
//! event: current_type            one per non-terminal provider event,
//! data: "response.created"       data is the JSON-encoded event type
//!
//! event: response_completed      terminal event that was persisted,
//! data: {"sql_query":"..."}      data is the raw output text
//!
//! event: done                    provider stream ended normally,
//!                                 empty payload
//! ```
//!
//! The relay is pull-driven: the next provider event is requested only
//! after the previous frame has been taken by the consumer, so a slow
//! client slows the provider read and a dropped client cancels it. A
//! terminal event that fails validation or persistence is logged and
//! skipped; the relay keeps reading and still ends with `done`. A provider
//! error ends the relay without `done`.

use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::instructions::parse_output;
use crate::completion::{Completion, CompletionClient, CompletionRequest, ProviderEvent};
use crate::sse::SseFrame;
use crate::store::DynamicQueryStore;

pub const CONNECTED: &str = "connected";
pub const CURRENT_TYPE: &str = "current_type";
pub const RESPONSE_COMPLETED: &str = "response_completed";
pub const DONE: &str = "done";
pub const ERROR: &str = "error";

/// Relay one streamed generation as SSE frames.
pub fn relay(
    store: Arc<dyn DynamicQueryStore>,
    completion: Arc<dyn CompletionClient>,
    id: Uuid,
    request: CompletionRequest,
    emit_errors: bool,
) -> impl Stream<Item = SseFrame> {
    stream! {
        yield SseFrame::comment(CONNECTED);
        info!(query_id = %id, "streaming dynamic query generation");

        let mut events = match completion.stream(&request).await {
            Ok(events) => events,
            Err(e) => {
                warn!(query_id = %id, error = %e, "failed to open completion stream");
                if emit_errors {
                    yield error_frame(&e.to_string());
                }
                return;
            }
        };

        while let Some(event) = events.next().await {
            match event {
                Ok(ProviderEvent::Completed(done)) => {
                    match persist(store.as_ref(), id, &done).await {
                        Ok(()) => {
                            yield SseFrame::event(RESPONSE_COMPLETED, done.output_text);
                        }
                        Err(message) => {
                            warn!(query_id = %id, response_id = %done.id, error = %message, "terminal event not persisted");
                            if emit_errors {
                                yield error_frame(&message);
                            }
                        }
                    }
                }
                Ok(ProviderEvent::Progress { event_type }) => {
                    debug!(query_id = %id, event_type = %event_type, "provider event");
                    let data = serde_json::Value::String(event_type).to_string();
                    yield SseFrame::event(CURRENT_TYPE, data);
                }
                Err(e) => {
                    warn!(query_id = %id, error = %e, "completion stream failed");
                    if emit_errors {
                        yield error_frame(&e.to_string());
                    }
                    return;
                }
            }
        }

        info!(query_id = %id, "completion stream finished");
        yield SseFrame::event(DONE, "");
    }
}

fn error_frame(message: &str) -> SseFrame {
    SseFrame::event(ERROR, serde_json::json!({ "message": message }).to_string())
}

async fn persist(
    store: &dyn DynamicQueryStore,
    id: Uuid,
    completion: &Completion,
) -> Result<(), String> {
    let output = parse_output(&completion.output_text).map_err(|e| e.to_string())?;
    store
        .complete(id, &output.sql_query, &completion.id)
        .await
        .map_err(|e| e.to_string())?;
    info!(query_id = %id, response_id = %completion.id, "dynamic query complete");
    Ok(())
}
