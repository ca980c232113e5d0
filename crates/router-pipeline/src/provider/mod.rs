//! Stage: Provider Adapter (spec.md §4.6).
//!
//! Each adapter turns an internal [`CompletionRequest`]/[`CompletionResponse`]
//! into an authenticated HTTPS call against one upstream and maps transport
//! and HTTP-level failures onto the shared [`router_core::CoreError`]
//! taxonomy so the Strategy Manager can reason about them uniformly.

pub mod anthropic;
pub mod google;
pub mod openai;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use router_config::MappingTable;
use router_core::CoreError;

use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Capabilities advertised by a provider adapter.
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    /// Whether the provider supports streaming responses.
    pub streaming: bool,
    /// Whether the provider supports tool/function calling.
    pub tool_calling: bool,
}

/// Trait implemented by each upstream LLM provider's wire adapter.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider id this adapter was constructed for.
    fn provider_id(&self) -> &str;

    /// Advertised capabilities.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Send a non-streaming completion request.
    ///
    /// `auth_header` is `None` for providers with `auth.scheme = "none"`.
    /// `mapping` is this provider's Compatibility Mapper table, applied to
    /// the wire-shaped JSON immediately before it is sent, and to the raw
    /// response JSON immediately after it is received.
    async fn complete(
        &self,
        request: &CompletionRequest,
        auth_header: Option<(&str, &str)>,
        mapping: Option<&MappingTable>,
    ) -> Result<CompletionResponse, CoreError>;

    /// Send a streaming completion request.
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        auth_header: Option<(&str, &str)>,
        mapping: Option<&MappingTable>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, CoreError>> + Send>>, CoreError>;

    /// Issue a lightweight health probe against the provider, if configured.
    async fn health_check(&self, auth_header: Option<(&str, &str)>) -> Result<(), CoreError>;
}

/// Map a transport-level failure (connection refused, DNS, timeout) onto
/// the core error taxonomy.
pub(crate) fn map_transport_error(provider_id: &str, error: &reqwest::Error) -> CoreError {
    if error.is_timeout() {
        CoreError::Timeout(provider_id.to_owned())
    } else {
        CoreError::Network(provider_id.to_owned(), error.to_string())
    }
}

/// Map a non-success HTTP response onto the core error taxonomy.
pub(crate) fn map_http_status(
    provider_id: &str,
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> CoreError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return CoreError::AuthFailed(provider_id.to_owned(), body.to_owned());
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return CoreError::RateLimited { provider: provider_id.to_owned(), retry_after };
    }
    if status.is_server_error() {
        return CoreError::ProviderUnavailable(provider_id.to_owned(), format!("{status}: {body}"));
    }
    CoreError::MalformedResponse(provider_id.to_owned(), format!("provider returned {status}: {body}"))
}

/// Parse a `Retry-After` header value (seconds, per RFC 7231) into a `Duration`.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}
