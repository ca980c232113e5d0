//! Google Generative Language API provider adapter.

use std::fmt::Write as _;
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
use crate::convert::google::google_chunk_to_events;
use crate::protocol::google::GoogleResponse;
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Google Generative Language API adapter. Callers cannot target this
/// protocol directly (see `protocol_switch::supports_conversion`); it is
/// reachable only as an outbound provider target.
pub struct GoogleAdapter {
    provider_id: String,
    client: Client,
    base_url: Url,
    request_timeout: Duration,
    streaming: bool,
    health_check_path: Option<String>,
}

impl GoogleAdapter {
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

    fn generate_url(&self, model: &str, api_key: Option<&str>) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = format!("{base}/models/{model}:generateContent");
        if let Some(key) = api_key {
            let _ = write!(url, "?key={key}");
        }
        url
    }

    fn stream_url(&self, model: &str, api_key: Option<&str>) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = format!("{base}/models/{model}:streamGenerateContent?alt=sse");
        if let Some(key) = api_key {
            let _ = write!(url, "&key={key}");
        }
        url
    }
}

fn mapped_value<T: serde::Serialize>(wire_request: &T, mapping: Option<&MappingTable>) -> Result<serde_json::Value, CoreError> {
    let value = serde_json::to_value(wire_request).map_err(|e| CoreError::Internal(e.to_string()))?;
    match mapping {
        Some(table) => compatibility::map_request(&value, table),
        None => Ok(value),
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
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
        let wire_request: crate::protocol::google::GoogleRequest = request.into();
        let outbound = mapped_value(&wire_request, mapping)?;
        let api_key = auth_header.filter(|(name, _)| *name == "x-goog-api-key").map(|(_, v)| v);

        let mut builder =
            self.client.post(self.generate_url(&request.model, api_key)).timeout(self.request_timeout).json(&outbound);
        if let Some((name, value)) = auth_header.filter(|(name, _)| *name != "x-goog-api-key") {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| map_transport_error(&self.provider_id, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.provider_id, %status, "upstream returned error");
            return Err(map_http_status(&self.provider_id, status, retry_after, &body));
        }

        let wire_response: GoogleResponse = response
            .json()
            .await
            .map_err(|e| CoreError::MalformedResponse(self.provider_id.clone(), e.to_string()))?;

        let mut internal: CompletionResponse = wire_response.into();
        internal.model.clone_from(&request.model);
        Ok(internal)
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        auth_header: Option<(&str, &str)>,
        mapping: Option<&MappingTable>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, CoreError>> + Send>>, CoreError> {
        let wire_request: crate::protocol::google::GoogleRequest = request.into();
        let outbound = mapped_value(&wire_request, mapping)?;
        let api_key = auth_header.filter(|(name, _)| *name == "x-goog-api-key").map(|(_, v)| v);

        let mut builder =
            self.client.post(self.stream_url(&request.model, api_key)).timeout(self.request_timeout).json(&outbound);
        if let Some((name, value)) = auth_header.filter(|(name, _)| *name != "x-goog-api-key") {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| map_transport_error(&self.provider_id, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status(&self.provider_id, status, retry_after, &body));
        }

        let provider_id = self.provider_id.clone();
        let event_stream = response.bytes_stream().eventsource();

        let mapped = event_stream.filter_map(move |result| {
            let events: Option<Result<StreamEvent, CoreError>> = match &result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        None
                    } else {
                        match serde_json::from_str::<GoogleResponse>(data) {
                            Ok(chunk) => google_chunk_to_events(&chunk).into_iter().next().map(Ok),
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparseable Google SSE chunk");
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
        let mut builder = self.client.get(format!("{base}{path}")).timeout(self.request_timeout);
        if let Some((name, value)) = auth_header {
            builder = builder.header(name, value);
        }
        let response = builder.send().await.map_err(|e| map_transport_error(&self.provider_id, &e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CoreError::ProviderUnavailable(self.provider_id.clone(), response.status().to_string()))
        }
    }
}
