//! `router` — the facade crate wiring every core component into the single
//! entry point an embedding program talks to (spec.md §6 "External
//! Interfaces", §2 "Control flow": `caller -> Scheduler -> Executor -> [...]`).
//!
//! [`Router`] owns one instance of every leaf and mid-tier component
//! (`Monitoring`, `AuthCenter`, `StrategyManager`, `Scheduler`,
//! `PipelineExecutor`) for the lifetime of one [`ConfigSnapshot`], and
//! exposes the four operations spec.md §6 names: `schedule`,
//! `scheduleStreaming`, `getHealth`, `getMetrics`. Nothing above this
//! crate is in scope — no HTTP ingress, no CLI, no config-file parsing
//! beyond what `router-config::ConfigSnapshot::load` already does.

pub mod error;
pub mod stream;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use router_auth::AuthCenter;
use router_config::{ConfigSnapshot, ProtocolFamily};
use router_core::{CoreError, ExecutionContext, IoRecord};
use router_monitoring::{HealthReport, Monitoring};
pub use router_monitoring::MetricsSnapshot;
use router_pipeline::provider::anthropic::AnthropicAdapter;
use router_pipeline::provider::google::GoogleAdapter;
use router_pipeline::provider::openai::OpenAiAdapter;
use router_pipeline::{PipelineExecutor, ProviderAdapter};
use router_scheduler::Scheduler;
use router_strategy::StrategyManager;
use serde_json::Value;
use tracing_subscriber::util::TryInitError;
use uuid::Uuid;

pub use error::RouterError;
pub use stream::{ChunkSequence, StreamItem};

/// Default per-request deadline when the caller does not specify one.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The top-level entry point, wiring `ConfigSnapshot -> providers ->
/// scheduler -> pipeline -> strategy -> auth -> monitoring` (DESIGN.md
/// "router (facade crate)").
///
/// Construction is cheap relative to a request's lifetime but not free
/// (it builds one HTTP client per provider and loads any persisted auth
/// token bundles from disk); a `ConfigSnapshot` hot-swap is modelled as
/// constructing a fresh `Router` rather than mutating one in place,
/// satisfying "swaps are atomic pointer replacements observed by new
/// requests only" (spec.md §5) without every component needing its own
/// hot-swap coordinator.
pub struct Router {
    config: Arc<ConfigSnapshot>,
    monitoring: Arc<Monitoring>,
    executor: Arc<PipelineExecutor>,
}

impl Router {
    /// Build a `Router` from a validated configuration snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot fails validation, or if a
    /// provider's persisted auth token bundle exists on disk but cannot
    /// be parsed.
    pub fn from_config_snapshot(config: ConfigSnapshot) -> anyhow::Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let scheduler = Arc::new(Scheduler::new(config.clone()));
        let strategy = Arc::new(StrategyManager::new(&config.strategy));
        let auth = Arc::new(AuthCenter::from_providers(config.llm.providers.values())?);
        let monitoring = Arc::new(Monitoring::new(&config.monitoring));
        let adapters = build_adapters(&config);

        let executor = Arc::new(PipelineExecutor::new(
            config.clone(),
            scheduler,
            strategy,
            auth,
            monitoring.clone(),
            adapters,
        ));

        Ok(Self { config, monitoring, executor })
    }

    /// Install the ambient structured-logging subscriber (DESIGN.md
    /// "Ambient logging"). Call once, from the hosting program's `main`;
    /// not invoked automatically by [`Router::from_config_snapshot`] since
    /// constructing more than one `Router` per process (e.g. in tests)
    /// would otherwise panic on the second global-subscriber install.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber has already been installed.
    pub fn init_logging(&self) -> Result<(), TryInitError> {
        router_monitoring::logging::init(&self.config.log_level)
    }

    /// `schedule(request, virtual-model-id) -> Response` (spec.md §6).
    ///
    /// Runs the full pipeline for one non-streaming request and returns
    /// the caller's wire-shaped JSON response.
    ///
    /// # Errors
    ///
    /// Returns a [`RouterError`] once retries, fallback, and
    /// circuit-breaker options are all exhausted, or immediately for
    /// admission-time failures (`UnknownModel`, `Backpressure`,
    /// `Cancelled` on an already-elapsed deadline).
    pub async fn schedule(
        &self,
        request_body: Value,
        virtual_model_id: &str,
        source_protocol: ProtocolFamily,
    ) -> Result<Value, RouterError> {
        let ctx = self.new_context(virtual_model_id, None);
        if ctx.is_expired() {
            return Err(RouterError::from_core(&CoreError::Cancelled(ctx.request_id.clone()), Vec::new()));
        }
        self.executor
            .execute(virtual_model_id, source_protocol, &request_body, &ctx)
            .await
            .map_err(|e| RouterError::from_core(&e, ctx.tried_targets()))
    }

    /// `scheduleStreaming(request, virtual-model-id) -> ChunkSequence`
    /// (spec.md §6).
    ///
    /// Returns a [`ChunkSequence`] immediately; the pipeline runs on a
    /// spawned task and feeds wire-shaped chunks back through a bounded
    /// channel as they are produced, so a consumer that stops reading
    /// applies backpressure rather than unbounded buffering. Cancelling
    /// the sequence (or dropping it) terminates the producing task at
    /// the next chunk boundary with a synthetic `finish_reason =
    /// "cancelled"` chunk (spec.md §5, §8 scenario 6).
    ///
    /// # Errors
    ///
    /// Returns a [`RouterError`] immediately if `source_protocol` has no
    /// caller-facing stream shape (`ProtocolFamily::Google`); all other
    /// failures surface as a [`StreamItem::Error`] read from the returned
    /// sequence instead, per spec.md §7 "Streaming responses surface
    /// mid-stream errors".
    pub async fn schedule_streaming(
        &self,
        request_body: Value,
        virtual_model_id: &str,
        source_protocol: ProtocolFamily,
    ) -> Result<ChunkSequence, RouterError> {
        if matches!(source_protocol, ProtocolFamily::Google) {
            return Err(RouterError::from_core(
                &CoreError::UnsupportedConversion { from: "google".to_owned(), to: "internal".to_owned() },
                Vec::new(),
            ));
        }

        let ctx = Arc::new(self.new_context(virtual_model_id, None));
        if ctx.is_expired() {
            return Err(RouterError::from_core(&CoreError::Cancelled(ctx.request_id.clone()), Vec::new()));
        }

        let id = ctx.request_id.clone();
        let model = request_body.get("model").and_then(Value::as_str).unwrap_or(virtual_model_id).to_owned();
        let created = unix_now();
        let cancellation = ctx.cancellation.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(32);

        let executor = self.executor.clone();
        let vm = virtual_model_id.to_owned();

        tokio::spawn(async move {
            run_streaming_task(executor, vm, source_protocol, request_body, ctx, tx, id, model, created).await;
        });

        Ok(ChunkSequence::new(rx, cancellation))
    }

    /// `getHealth() -> HealthReport` (spec.md §6): synchronous snapshot.
    #[must_use]
    pub fn get_health(&self) -> HealthReport {
        self.monitoring.health()
    }

    /// `getMetrics() -> MetricsSnapshot` (spec.md §6): synchronous snapshot.
    #[must_use]
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.monitoring.metrics()
    }

    fn new_context(&self, virtual_model_id: &str, timeout: Option<Duration>) -> ExecutionContext {
        let session_id = Uuid::new_v4().to_string();
        let request_id = Uuid::new_v4().to_string();
        ExecutionContext::new(
            session_id,
            request_id,
            virtual_model_id.to_owned(),
            timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        )
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_streaming_task(
    executor: Arc<PipelineExecutor>,
    virtual_model_id: String,
    source_protocol: ProtocolFamily,
    request_body: Value,
    ctx: Arc<ExecutionContext>,
    tx: tokio::sync::mpsc::Sender<StreamItem>,
    id: String,
    model: String,
    created: u64,
) {
    let result = executor.execute_streaming(&virtual_model_id, source_protocol, &request_body, &ctx).await;

    let events = match result {
        Ok(events) => events,
        Err(error) => {
            let _ = tx.send(StreamItem::Error(RouterError::from_core(&error, ctx.tried_targets()))).await;
            return;
        }
    };

    if matches!(source_protocol, ProtocolFamily::Anthropic) && tx.send(StreamItem::Chunk(stream::anthropic_preamble(&id, &model))).await.is_err() {
        return;
    }

    for event in &events {
        if ctx.is_cancelled() {
            ctx.record_io(IoRecord::cancelled("streaming_workflow"));
            let _ = tx.send(StreamItem::Chunk(stream::cancelled_chunk(source_protocol, &id, &model, created))).await;
            return;
        }

        match stream::event_to_wire(source_protocol, event, &id, &model, created) {
            Ok(values) => {
                for value in values {
                    if tx.send(StreamItem::Chunk(value)).await.is_err() {
                        return;
                    }
                }
            }
            Err(error) => {
                let error_id = Uuid::new_v4().to_string();
                let _ = tx
                    .send(StreamItem::Chunk(stream::error_chunk(source_protocol, &id, &model, created, &error_id)))
                    .await;
                let _ = tx.send(StreamItem::Error(RouterError::from_core(&error, ctx.tried_targets()))).await;
                return;
            }
        }
    }
}

/// Build one provider adapter per configured provider, keyed by provider
/// id, dispatching on protocol family (DESIGN.md "router (facade crate)").
fn build_adapters(config: &ConfigSnapshot) -> HashMap<String, Arc<dyn ProviderAdapter>> {
    config
        .llm
        .providers
        .values()
        .map(|provider| {
            let adapter: Arc<dyn ProviderAdapter> = match provider.protocol {
                ProtocolFamily::Openai | ProtocolFamily::Qwen => {
                    Arc::new(OpenAiAdapter::new(provider.id.clone(), provider))
                }
                ProtocolFamily::Anthropic => Arc::new(AnthropicAdapter::new(provider.id.clone(), provider)),
                ProtocolFamily::Google => Arc::new(GoogleAdapter::new(provider.id.clone(), provider)),
            };
            (provider.id.clone(), adapter)
        })
        .collect()
}

fn unix_now() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs()
}
