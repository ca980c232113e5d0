//! Stage: Streaming Workflow (spec.md §4.4).
//!
//! Bridges a mismatch between what the caller asked for and what the
//! resolved provider can deliver: a non-streaming provider response gets
//! chunked into synthetic `StreamEvent`s for a streaming caller, and a
//! streaming provider response gets collected into one `CompletionResponse`
//! for a non-streaming caller.

use std::collections::BTreeMap;

use futures::{Stream, StreamExt};
use router_core::CoreError;

use crate::types::response::build_tool_call;
use crate::types::{
    Choice, ChoiceMessage, CompletionResponse, FinishReason, StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall,
    Usage,
};

/// Soft upper bound, in characters, on a synthesized chunk's content.
/// Keeps synthetic streaming responsive without fragmenting into
/// one-event-per-character noise.
const SYNTHETIC_CHUNK_CHARS: usize = 24;

/// Split a complete response into the `StreamEvent` sequence a streaming
/// caller would have seen had the provider itself streamed it.
#[must_use]
pub fn synthesize_stream(response: &CompletionResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in &response.choices {
        if let Some(tool_calls) = &choice.message.tool_calls {
            let mut emitted = false;
            for (tc_index, tool_call) in tool_calls.iter().enumerate() {
                emitted = true;
                events.push(StreamEvent::Delta(StreamDelta {
                    index: choice.index,
                    content: None,
                    tool_call: Some(StreamToolCall {
                        index: u32::try_from(tc_index).unwrap_or(u32::MAX),
                        id: Some(tool_call.id.clone()),
                        function: Some(StreamFunctionCall {
                            name: Some(tool_call.function.name.clone()),
                            arguments: Some(tool_call.function.arguments.clone()),
                        }),
                    }),
                    finish_reason: None,
                }));
            }
            if emitted {
                events.push(StreamEvent::Delta(StreamDelta {
                    index: choice.index,
                    content: None,
                    tool_call: None,
                    finish_reason: choice.finish_reason.clone(),
                }));
                continue;
            }
        }

        let text = choice.message.content.as_deref().unwrap_or_default();
        let mut chunks = chunk_chars(text, SYNTHETIC_CHUNK_CHARS).peekable();

        if chunks.peek().is_none() {
            events.push(StreamEvent::Delta(StreamDelta {
                index: choice.index,
                content: None,
                tool_call: None,
                finish_reason: choice.finish_reason.clone(),
            }));
            continue;
        }

        while let Some(piece) = chunks.next() {
            let is_last = chunks.peek().is_none();
            events.push(StreamEvent::Delta(StreamDelta {
                index: choice.index,
                content: Some(piece),
                tool_call: None,
                finish_reason: is_last.then(|| choice.finish_reason.clone()).flatten(),
            }));
        }
    }

    if let Some(usage) = response.usage.clone() {
        events.push(StreamEvent::Usage(usage));
    }
    events.push(StreamEvent::Done);
    events
}

fn chunk_chars(text: &str, max_len: usize) -> impl Iterator<Item = String> + '_ {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max_len.max(1)).map(|c| c.iter().collect())
}

/// Accumulated per-choice state while collecting a stream into a single
/// response.
#[derive(Default)]
struct ChoiceAccumulator {
    content: String,
    finish_reason: Option<FinishReason>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
}

/// Accumulated partial tool-call fragments, keyed by tool-call index within
/// the choice's `tool_calls` array.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

/// Drain a provider's event stream into one complete [`CompletionResponse`],
/// for a caller that asked for a non-streaming result against a
/// streaming-only provider.
///
/// # Errors
///
/// Propagates the first error yielded by `stream`.
pub async fn collect_stream(
    id: String,
    model: String,
    created: u64,
    mut stream: std::pin::Pin<Box<dyn Stream<Item = Result<StreamEvent, CoreError>> + Send>>,
) -> Result<CompletionResponse, CoreError> {
    let mut choices: BTreeMap<u32, ChoiceAccumulator> = BTreeMap::new();
    let mut usage = None;

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Delta(delta) => {
                let entry = choices.entry(delta.index).or_default();
                if let Some(content) = delta.content {
                    entry.content.push_str(&content);
                }
                if let Some(tool_call) = delta.tool_call {
                    let tc_entry = entry.tool_calls.entry(tool_call.index).or_default();
                    if let Some(id) = tool_call.id {
                        tc_entry.id = id;
                    }
                    if let Some(function) = tool_call.function {
                        if let Some(name) = function.name {
                            tc_entry.name = name;
                        }
                        if let Some(arguments) = function.arguments {
                            tc_entry.arguments.push_str(&arguments);
                        }
                    }
                }
                if delta.finish_reason.is_some() {
                    entry.finish_reason = delta.finish_reason;
                }
            }
            StreamEvent::Usage(u) => usage = Some(u),
            StreamEvent::Done => break,
        }
    }

    let choices = choices
        .into_iter()
        .map(|(index, acc)| {
            let message = if acc.tool_calls.is_empty() {
                ChoiceMessage::text(acc.content)
            } else {
                let tool_calls = acc
                    .tool_calls
                    .into_values()
                    .map(|tc| build_tool_call(tc.id, tc.name, tc.arguments))
                    .collect();
                ChoiceMessage::with_tool_calls(tool_calls)
            };
            Choice { index, message, finish_reason: acc.finish_reason }
        })
        .collect();

    Ok(CompletionResponse { id, object: "chat.completion".to_owned(), created, model, choices, usage })
}
