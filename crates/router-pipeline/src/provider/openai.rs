//! OpenAI-compatible provider adapter.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use router_config::{MappingTable, Provider as ProviderConfig};
use router_core::CoreError;
use url::Url;

use super::{ProviderAdapter, ProviderCapabilities, map_http_status, map_transport_error, parse_retry_after};
use crate::compatibility;
use crate::convert::openai::openai_chunk_to_events;
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Whether `base_url` is the canonical OpenAI API, as opposed to an
/// OpenAI-compatible third party that may reject `stream_options`.
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// Serialize a wire request and, if a Compatibility Mapper table is
/// configured for this provider, run it before the request goes out.
fn mapped_value<T: serde::Serialize>(wire_request: &T, mapping: Option<&MappingTable>) -> Result<serde_json::Value, CoreError> {
    let value = serde_json::to_value(wire_request).map_err(|e| CoreError::Internal(e.to_string()))?;
    match mapping {
        Some(table) => compatibility::map_request(&value, table),
        None => Ok(value),
    }
}

/// OpenAI-compatible Chat Completions adapter.
pub struct OpenAiAdapter {
    provider_id: String,
    client: Client,
    base_url: Url,
    request_timeout: Duration,
    streaming: bool,
    health_check_path: Option<String>,
}

impl OpenAiAdapter {
    /// Build an adapter from a provider's configuration entry.
    pub fn new(provider_id: String, config: &ProviderConfig) -> Self {
        Self {
            provider_id,
            client: Client::new(),
            base_url: config.base_url.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            streaming: config.streaming,
            health_check_path: config.health_check_path.clone(),
        }
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder, auth_header: Option<(&str, &str)>) -> reqwest::RequestBuilder {
        match auth_header {
            Some((name, value)) => builder.header(name, value),
            None => builder,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities { streaming: self.streaming, tool_calling: true }
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        auth_header: Option<(&str, &str)>,
        mapping: Option<&MappingTable>,
    ) -> Result<CompletionResponse, CoreError> {
        let wire_request: OpenAiRequest = request.into();
        let outbound = mapped_value(&wire_request, mapping)?;

        let builder = self.apply_auth(
            self.client.post(self.completions_url()).timeout(self.request_timeout).json(&outbound),
            auth_header,
        );

        let response = builder.send().await.map_err(|e| map_transport_error(&self.provider_id, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.provider_id, %status, "upstream returned error");
            return Err(map_http_status(&self.provider_id, status, retry_after, &body));
        }

        let raw: serde_json::Value =
            response.json().await.map_err(|e| CoreError::MalformedResponse(self.provider_id.clone(), e.to_string()))?;
        let raw = match mapping {
            Some(table) => compatibility::map_response(&raw, table)?,
            None => raw,
        };
        let wire_response: OpenAiResponse = serde_json::from_value(raw)
            .map_err(|e| CoreError::MalformedResponse(self.provider_id.clone(), e.to_string()))?;

        Ok(wire_response.into())
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        auth_header: Option<(&str, &str)>,
        mapping: Option<&MappingTable>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, CoreError>> + Send>>, CoreError> {
        let mut wire_request: OpenAiRequest = request.into();
        wire_request.stream = Some(true);
        wire_request.stream_options =
            is_canonical_openai(&self.base_url).then_some(OpenAiStreamOptions { include_usage: true });
        let outbound = mapped_value(&wire_request, mapping)?;

        let builder = self.apply_auth(
            self.client.post(self.completions_url()).timeout(self.request_timeout).json(&outbound),
            auth_header,
        );

        let response = builder.send().await.map_err(|e| map_transport_error(&self.provider_id, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status(&self.provider_id, status, retry_after, &body));
        }

        let provider_id = self.provider_id.clone();
        let event_stream = response.bytes_stream().eventsource();

        let mapped = event_stream
            .map(move |result| match result {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data == "[DONE]" {
                        return vec![Ok(StreamEvent::Done)];
                    }
                    match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                        Ok(chunk) => openai_chunk_to_events(&chunk).into_iter().map(Ok).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unparseable SSE chunk");
                            vec![]
                        }
                    }
                }
                Err(e) => vec![Err(CoreError::MalformedStream(provider_id.clone(), e.to_string()))],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(mapped))
    }

    async fn health_check(&self, auth_header: Option<(&str, &str)>) -> Result<(), CoreError> {
        let Some(path) = &self.health_check_path else { return Ok(()) };
        let base = self.base_url.as_str().trim_end_matches('/');
        let builder = self.apply_auth(self.client.get(format!("{base}{path}")).timeout(self.request_timeout), auth_header);
        let response = builder.send().await.map_err(|e| map_transport_error(&self.provider_id, &e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CoreError::ProviderUnavailable(self.provider_id.clone(), response.status().to_string()))
        }
    }
}
