//! Stage: Protocol Switch (spec.md §4.3).
//!
//! Translates a caller's request/response between its native wire shape
//! and the internal `CompletionRequest`/`CompletionResponse` form. Built
//! directly on the bidirectional `From` conversions already provided by
//! `convert::openai` and `convert::anthropic`; Google has no caller-facing
//! conversion (only a one-way outbound mapping used by the Provider
//! Adapter), so it can only ever be a provider target, never a source.

use router_config::ProtocolFamily;
use router_core::CoreError;
use serde_json::Value;

use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse};
use crate::types::{CompletionRequest, CompletionResponse};

/// Whether the Protocol Switch can translate from `source` into `target`'s
/// wire shape. Both directions of OpenAI↔Anthropic are supported; Google
/// is outbound-only and never a valid `source`.
#[must_use]
pub fn supports_conversion(source: ProtocolFamily, target: ProtocolFamily) -> bool {
    matches!(source, ProtocolFamily::Openai | ProtocolFamily::Qwen | ProtocolFamily::Anthropic)
        && matches!(target, ProtocolFamily::Openai | ProtocolFamily::Qwen | ProtocolFamily::Anthropic | ProtocolFamily::Google)
}

/// Parse a caller's raw wire-format request body into the internal form.
///
/// # Errors
///
/// Returns `CoreError::UnsupportedConversion` if `protocol` has no
/// caller-facing source mapping, `CoreError::InvalidRequest` if the body
/// does not match the expected wire shape, or if `messages` is empty
/// (spec.md §8 "Empty `messages` list: fails with `InvalidRequest`").
pub fn to_internal(protocol: ProtocolFamily, body: &Value) -> Result<CompletionRequest, CoreError> {
    let request = match protocol {
        ProtocolFamily::Openai | ProtocolFamily::Qwen => {
            let wire: OpenAiRequest = serde_json::from_value(body.clone())
                .map_err(|e| CoreError::InvalidRequest(format!("malformed OpenAI-shaped request: {e}")))?;
            CompletionRequest::from(wire)
        }
        ProtocolFamily::Anthropic => {
            let wire: AnthropicRequest = serde_json::from_value(body.clone())
                .map_err(|e| CoreError::InvalidRequest(format!("malformed Anthropic-shaped request: {e}")))?;
            CompletionRequest::from(wire)
        }
        ProtocolFamily::Google => {
            return Err(CoreError::UnsupportedConversion { from: "google".to_owned(), to: "internal".to_owned() });
        }
    };

    if request.messages.is_empty() {
        return Err(CoreError::InvalidRequest("messages must not be empty".to_owned()));
    }

    Ok(request)
}

/// Render the internal response form back into a caller's expected wire
/// shape, as raw JSON ready to be written to the transport.
///
/// # Errors
///
/// Returns `CoreError::UnsupportedConversion` if `protocol` has no
/// caller-facing source mapping.
pub fn from_internal(protocol: ProtocolFamily, response: CompletionResponse) -> Result<Value, CoreError> {
    match protocol {
        ProtocolFamily::Openai | ProtocolFamily::Qwen => {
            let wire: OpenAiResponse = response.into();
            serde_json::to_value(wire).map_err(|e| CoreError::Internal(e.to_string()))
        }
        ProtocolFamily::Anthropic => {
            let wire: AnthropicResponse = response.into();
            serde_json::to_value(wire).map_err(|e| CoreError::Internal(e.to_string()))
        }
        ProtocolFamily::Google => {
            Err(CoreError::UnsupportedConversion { from: "internal".to_owned(), to: "google".to_owned() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_and_anthropic_are_bidirectional() {
        assert!(supports_conversion(ProtocolFamily::Openai, ProtocolFamily::Anthropic));
        assert!(supports_conversion(ProtocolFamily::Anthropic, ProtocolFamily::Openai));
    }

    #[test]
    fn google_is_outbound_only() {
        assert!(supports_conversion(ProtocolFamily::Openai, ProtocolFamily::Google));
        assert!(!supports_conversion(ProtocolFamily::Google, ProtocolFamily::Openai));
    }

    #[test]
    fn google_as_source_request_is_rejected() {
        let body = serde_json::json!({});
        assert!(matches!(to_internal(ProtocolFamily::Google, &body), Err(CoreError::UnsupportedConversion { .. })));
    }

    #[test]
    fn empty_messages_list_is_rejected() {
        let body = serde_json::json!({ "model": "gpt-4", "messages": [] });
        assert!(matches!(to_internal(ProtocolFamily::Openai, &body), Err(CoreError::InvalidRequest(_))));
    }

    #[test]
    fn openai_request_round_trips_to_internal() {
        let body = serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
        });
        let internal = to_internal(ProtocolFamily::Openai, &body).unwrap();
        assert_eq!(internal.model, "gpt-4");
    }
}
