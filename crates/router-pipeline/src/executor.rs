//! Pipeline Executor (spec.md §4): runs the four fixed stages — Protocol
//! Switch, Streaming Workflow, Compatibility Mapper, Provider Adapter — for
//! one request, owning the retry/fallback loop driven by the Strategy
//! Manager and the target selection driven by the Scheduler.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use router_auth::AuthCenter;
use router_config::{ConfigSnapshot, ProtocolFamily};
use router_core::{CoreError, ExecutionContext};
use router_monitoring::{ErrorEventInput, Monitoring};
use router_scheduler::Scheduler;
use router_strategy::{Decision, StrategyManager};
use serde_json::Value;

use crate::provider::ProviderAdapter;
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};
use crate::{protocol_switch, workflow};

/// Orchestrates a single request end to end. One instance is shared across
/// every request for the lifetime of a `ConfigSnapshot`.
pub struct PipelineExecutor {
    config: Arc<ConfigSnapshot>,
    scheduler: Arc<Scheduler>,
    strategy: Arc<StrategyManager>,
    auth: Arc<AuthCenter>,
    monitoring: Arc<Monitoring>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl PipelineExecutor {
    #[must_use]
    pub fn new(
        config: Arc<ConfigSnapshot>,
        scheduler: Arc<Scheduler>,
        strategy: Arc<StrategyManager>,
        auth: Arc<AuthCenter>,
        monitoring: Arc<Monitoring>,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    ) -> Self {
        Self { config, scheduler, strategy, auth, monitoring, adapters }
    }

    fn state_key(virtual_model_id: &str, target_id: &str) -> String {
        format!("{virtual_model_id}:{target_id}")
    }

    async fn auth_header(&self, provider_id: &str) -> Result<Option<(String, String)>, CoreError> {
        use secrecy::ExposeSecret;
        self.auth
            .authorization_header(provider_id)
            .await
            .map(|maybe| maybe.map(|h| (h.name, h.value.expose_secret().to_owned())))
            .map_err(|e| CoreError::AuthFailed(provider_id.to_owned(), e.to_string()))
    }

    fn adapter_for(&self, provider_id: &str) -> Result<&Arc<dyn ProviderAdapter>, CoreError> {
        self.adapters.get(provider_id).ok_or_else(|| CoreError::ProviderUnavailable(provider_id.to_owned(), "no adapter configured".to_owned()))
    }

    /// Run the full pipeline for a non-streaming request, returning the
    /// caller's wire-shaped JSON response.
    ///
    /// # Errors
    ///
    /// Returns the last `CoreError` encountered once retries, fallback, and
    /// circuit-breaker options are all exhausted.
    pub async fn execute(
        &self,
        virtual_model_id: &str,
        source_protocol: ProtocolFamily,
        request_body: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, CoreError> {
        let permit = self.scheduler.admit().await?;
        let internal_request = self.run_in_switch(source_protocol, request_body, ctx)?;
        let response = self.run_with_retries(virtual_model_id, &internal_request, ctx, false).await?;
        drop(permit);
        protocol_switch::from_internal(source_protocol, response)
    }

    /// Run the full pipeline for a streaming request, bridging non-streaming
    /// providers via the Streaming Workflow stage when necessary.
    ///
    /// # Errors
    ///
    /// Returns the last `CoreError` encountered once retries, fallback, and
    /// circuit-breaker options are all exhausted.
    pub async fn execute_streaming(
        &self,
        virtual_model_id: &str,
        source_protocol: ProtocolFamily,
        request_body: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Vec<StreamEvent>, CoreError> {
        if !matches!(source_protocol, ProtocolFamily::Openai | ProtocolFamily::Anthropic | ProtocolFamily::Qwen) {
            return Err(CoreError::UnsupportedConversion { from: "google".to_owned(), to: "internal".to_owned() });
        }
        let permit = self.scheduler.admit().await?;
        let internal_request = self.run_in_switch(source_protocol, request_body, ctx)?;
        let response = self.run_with_retries(virtual_model_id, &internal_request, ctx, true).await?;
        drop(permit);
        Ok(workflow::synthesize_stream(&response))
    }

    fn run_in_switch(
        &self,
        source_protocol: ProtocolFamily,
        request_body: &Value,
        ctx: &ExecutionContext,
    ) -> Result<CompletionRequest, CoreError> {
        let started = Instant::now();
        let bytes = serde_json::to_vec(request_body).unwrap_or_default();
        let result = protocol_switch::to_internal(source_protocol, request_body);
        ctx.record_io(router_core::IoRecord::capture(
            "protocol_switch",
            router_core::Direction::In,
            &bytes,
            started.elapsed().as_millis() as u64,
            self.config.io_trace_debug,
        ));
        result
    }

    /// Resolve a target, invoke the provider, and on failure consult the
    /// Strategy Manager for what to do next, looping until `Decision::GiveUp`
    /// or a successful result.
    async fn run_with_retries(
        &self,
        virtual_model_id: &str,
        request: &CompletionRequest,
        ctx: &ExecutionContext,
        want_streaming: bool,
    ) -> Result<CompletionResponse, CoreError> {
        let mut excluded = HashSet::new();
        let mut current_target = None;

        loop {
            if ctx.is_cancelled() {
                return Err(CoreError::Cancelled(ctx.request_id.clone()));
            }
            if ctx.is_expired() {
                return Err(CoreError::Timeout(virtual_model_id.to_owned()));
            }

            let resolved = match current_target.take() {
                Some(target) => target,
                None => self.scheduler.resolve_target(virtual_model_id, &excluded, &self.strategy)?,
            };
            ctx.set_target(resolved.clone());
            let state_key = Self::state_key(virtual_model_id, &resolved.target_id);

            if let Err(_rejected) = self.strategy.circuit_breaker().admit(&state_key, &self.config.strategy_for(&resolved.provider_id).circuit_breaker) {
                excluded.insert(resolved.target_id.clone());
                continue;
            }

            let target_state = self.scheduler.target_state(virtual_model_id, &resolved.target_id);
            target_state.begin_request();
            let outcome = self.call_target(&resolved.provider_id, &resolved.model_id, request, ctx, want_streaming).await;
            target_state.end_request();

            match outcome {
                Ok(response) => {
                    target_state.record_success();
                    self.strategy.record_provider_outcome(&state_key, self.config.strategy_for(&resolved.provider_id), true);
                    return Ok(response);
                }
                Err(error) => {
                    target_state.record_failure();
                    self.strategy.record_provider_outcome(&state_key, self.config.strategy_for(&resolved.provider_id), false);
                    self.monitoring.record_error(ErrorEventInput {
                        error_type: error.kind(),
                        message: error.to_string(),
                        severity: error.severity(),
                        category: error.category(),
                        module_id: "router-pipeline".to_owned(),
                        component: resolved.provider_id.clone(),
                        context: serde_json::json!({ "target_id": resolved.target_id, "attempt": ctx.attempt() }),
                        recovery_attempted: false,
                        recovery_successful: false,
                        strategy_used: None,
                        handling_time_ms: 0,
                    });

                    let strategy_config = self.config.strategy_for(&resolved.provider_id);
                    let cache_key = format!("{virtual_model_id}:{}", request.model);
                    let decision = self.strategy.handle(&error, &state_key, strategy_config, ctx.attempt(), &cache_key);

                    match decision {
                        Decision::Proceed => return Err(error),
                        Decision::RetrySameTarget { after } => {
                            tokio::time::sleep(after).await;
                            current_target = Some(resolved);
                        }
                        Decision::RetryNewTarget { after } => {
                            tokio::time::sleep(after).await;
                            excluded.insert(resolved.target_id);
                        }
                        Decision::FallbackResult(value) => {
                            return serde_json::from_value(value)
                                .map_err(|e| CoreError::Internal(format!("fallback payload did not match response shape: {e}")));
                        }
                        Decision::GiveUp => return Err(error),
                    }
                }
            }
        }
    }

    async fn call_target(
        &self,
        provider_id: &str,
        model_id: &str,
        request: &CompletionRequest,
        ctx: &ExecutionContext,
        want_streaming: bool,
    ) -> Result<CompletionResponse, CoreError> {
        let adapter = self.adapter_for(provider_id)?;
        let mapping = self.config.mapping_tables.get(provider_id);
        let auth_header = self.auth_header(provider_id).await?;
        let auth_ref = auth_header.as_ref().map(|(n, v)| (n.as_str(), v.as_str()));

        let mut routed_request = request.clone();
        routed_request.model = model_id.to_owned();

        let started = Instant::now();
        let result = if want_streaming && adapter.capabilities().streaming {
            let stream = adapter.complete_stream(&routed_request, auth_ref, mapping).await?;
            let id = ctx.request_id.clone();
            workflow::collect_stream(id, model_id.to_owned(), unix_now(), stream).await
        } else {
            adapter.complete(&routed_request, auth_ref, mapping).await
        };

        ctx.record_io(router_core::IoRecord::capture(
            "provider_adapter",
            router_core::Direction::Out,
            model_id.as_bytes(),
            started.elapsed().as_millis() as u64,
            self.config.io_trace_debug,
        ));

        result
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs()
}
