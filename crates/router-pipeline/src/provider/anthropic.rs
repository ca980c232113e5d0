//! Anthropic Messages API provider adapter.

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
use crate::convert::anthropic::AnthropicStreamState;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter.
pub struct AnthropicAdapter {
    provider_id: String,
    client: Client,
    base_url: Url,
    request_timeout: Duration,
    streaming: bool,
    health_check_path: Option<String>,
}

impl AnthropicAdapter {
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

    fn messages_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/messages")
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder, auth_header: Option<(&str, &str)>) -> reqwest::RequestBuilder {
        let builder = builder.header("anthropic-version", ANTHROPIC_VERSION);
        match auth_header {
            Some((name, value)) => builder.header(name, value),
            None => builder,
        }
    }

    fn mapped_value<T: serde::Serialize>(
        &self,
        wire_request: &T,
        mapping: Option<&MappingTable>,
    ) -> Result<serde_json::Value, CoreError> {
        let value = serde_json::to_value(wire_request).map_err(|e| CoreError::Internal(e.to_string()))?;
        match mapping {
            Some(table) => compatibility::map_request(&value, table),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
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
        let wire_request: AnthropicRequest = request.into();
        let outbound = self.mapped_value(&wire_request, mapping)?;

        let builder = self.apply_auth(
            self.client.post(self.messages_url()).timeout(self.request_timeout).json(&outbound),
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
        let wire_response: AnthropicResponse = serde_json::from_value(raw)
            .map_err(|e| CoreError::MalformedResponse(self.provider_id.clone(), e.to_string()))?;

        Ok(wire_response.into())
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        auth_header: Option<(&str, &str)>,
        mapping: Option<&MappingTable>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, CoreError>> + Send>>, CoreError> {
        let mut wire_request: AnthropicRequest = request.into();
        wire_request.stream = Some(true);
        let outbound = self.mapped_value(&wire_request, mapping)?;

        let builder = self.apply_auth(
            self.client.post(self.messages_url()).timeout(self.request_timeout).json(&outbound),
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
        let mut state = AnthropicStreamState::new();

        let mapped = event_stream.filter_map(move |result| {
            let events: Option<Result<StreamEvent, CoreError>> = match &result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        None
                    } else {
                        match serde_json::from_str::<AnthropicStreamEvent>(data) {
                            Ok(stream_event) => state.convert_event(&stream_event).into_iter().next().map(Ok),
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparseable Anthropic SSE event");
                                None
                            }
                        }
                    }
                }
                Err(e) => Some(Err(CoreError::MalformedStream(provider_id.clone(), e.to_string()))),
            };
            async move { events }
        });

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
