//! Caller-facing chunk sequence (spec.md §3 "Response", §6 `scheduleStreaming`):
//! a lazy, finite, non-restartable sequence of wire-shaped chunks, bridged
//! from the pipeline's internal [`StreamEvent`]s via a bounded channel so a
//! slow consumer applies backpressure to the producing task rather than the
//! whole sequence being buffered in memory at once.

use router_config::ProtocolFamily;
use router_core::CoreError;
use router_pipeline::convert::anthropic::internal_to_anthropic_stream_events;
use router_pipeline::convert::openai::{delta_to_openai_chunk, usage_to_openai_chunk};
use router_pipeline::protocol::anthropic::{AnthropicStreamEvent, AnthropicStreamMessage};
use router_pipeline::StreamEvent;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::RouterError;

/// One item read from a [`ChunkSequence`].
#[derive(Debug, Clone)]
pub enum StreamItem {
    /// A wire-shaped chunk, ready to forward to the caller's transport.
    Chunk(Value),
    /// The sequence failed mid-stream; no further items follow.
    Error(RouterError),
}

/// A lazy, finite, non-restartable sequence of response chunks.
///
/// Consumers call [`ChunkSequence::next_chunk`] until it returns `None`.
/// Dropping the sequence (or calling [`ChunkSequence::cancel`]) signals
/// cancellation to the producing task, which terminates the sequence at
/// the next chunk boundary with a synthetic `finish_reason = "cancelled"`
/// chunk (spec.md §5 "Cancellation and timeouts").
pub struct ChunkSequence {
    receiver: tokio::sync::mpsc::Receiver<StreamItem>,
    cancellation: CancellationToken,
}

impl ChunkSequence {
    #[must_use]
    pub(crate) fn new(receiver: tokio::sync::mpsc::Receiver<StreamItem>, cancellation: CancellationToken) -> Self {
        Self { receiver, cancellation }
    }

    /// Read the next item, or `None` once the sequence has terminated.
    pub async fn next_chunk(&mut self) -> Option<StreamItem> {
        self.receiver.recv().await
    }

    /// Request cancellation; the producing task observes this at the next
    /// chunk boundary and terminates the sequence promptly.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

/// Render one internal `StreamEvent` into zero or more wire-shaped JSON
/// chunks for `protocol`.
///
/// # Errors
///
/// Returns `CoreError::UnsupportedConversion` for `ProtocolFamily::Google`,
/// which has no caller-facing stream shape (outbound-only, spec.md §4.3).
pub(crate) fn event_to_wire(
    protocol: ProtocolFamily,
    event: &StreamEvent,
    id: &str,
    model: &str,
    created: u64,
) -> Result<Vec<Value>, CoreError> {
    match protocol {
        ProtocolFamily::Openai | ProtocolFamily::Qwen => Ok(match event {
            StreamEvent::Delta(delta) => vec![to_value(&delta_to_openai_chunk(delta, id, model, created))?],
            StreamEvent::Usage(usage) => vec![to_value(&usage_to_openai_chunk(usage, id, model, created))?],
            StreamEvent::Done => vec![],
        }),
        ProtocolFamily::Anthropic => internal_to_anthropic_stream_events(event, model, id)
            .iter()
            .map(to_value)
            .collect(),
        ProtocolFamily::Google => Err(CoreError::UnsupportedConversion { from: "internal".to_owned(), to: "google".to_owned() }),
    }
}

/// The Anthropic `message_start` event a stream opens with, absent from
/// the internal `StreamEvent` model since it carries no caller-meaningful
/// delta of its own.
pub(crate) fn anthropic_preamble(id: &str, model: &str) -> Value {
    let event = AnthropicStreamEvent::MessageStart {
        message: AnthropicStreamMessage {
            id: id.to_owned(),
            message_type: "message".to_owned(),
            role: "assistant".to_owned(),
            model: model.to_owned(),
            usage: None,
        },
    };
    to_value(&event).unwrap_or(Value::Null)
}

/// Build the synthetic terminal chunk emitted when a streaming response is
/// cancelled mid-sequence (spec.md §5, §8 scenario 6).
#[must_use]
pub(crate) fn cancelled_chunk(protocol: ProtocolFamily, id: &str, model: &str, created: u64) -> Value {
    match protocol {
        ProtocolFamily::Openai | ProtocolFamily::Qwen => serde_json::json!({
            "id": id,
            "object": "chat.completion.chunk",
            "created": created,
            "model": model,
            "choices": [{ "index": 0, "delta": {}, "finish_reason": "cancelled" }],
        }),
        ProtocolFamily::Anthropic => serde_json::json!({
            "type": "message_delta",
            "delta": { "stop_reason": "cancelled", "stop_sequence": null },
            "usage": null,
        }),
        ProtocolFamily::Google => Value::Null,
    }
}

/// Build the synthetic terminal chunk emitted when an unrecovered error
/// surfaces mid-stream (spec.md §7 "Propagation policy").
#[must_use]
pub(crate) fn error_chunk(protocol: ProtocolFamily, id: &str, model: &str, created: u64, error_id: &str) -> Value {
    match protocol {
        ProtocolFamily::Openai | ProtocolFamily::Qwen => serde_json::json!({
            "id": id,
            "object": "chat.completion.chunk",
            "created": created,
            "model": model,
            "choices": [{ "index": 0, "delta": {}, "finish_reason": "error" }],
            "error_ref": error_id,
        }),
        ProtocolFamily::Anthropic => serde_json::json!({
            "type": "error",
            "error": { "type": "api_error", "error_ref": error_id },
        }),
        ProtocolFamily::Google => Value::Null,
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::Internal(e.to_string()))
}
