#![allow(clippy::must_use_candidate)]

//! The configuration snapshot consumed (not parsed) by the router core.
//!
//! The core treats a `ConfigSnapshot` as immutable for the lifetime of a
//! request; swapping configuration between requests is an atomic pointer
//! replacement (`Arc<ConfigSnapshot>`), per spec.md §5's shared-resource
//! policy.

pub mod auth;
mod env;
pub mod loader;
pub mod mapping;
pub mod monitoring;
pub mod scheduler;
pub mod strategy;
pub mod virtual_model;

pub use auth::*;
pub use mapping::*;
pub use monitoring::*;
pub use scheduler::*;
pub use strategy::*;
pub use virtual_model::*;

use indexmap::IndexMap;
use serde::Deserialize;

/// The full configuration snapshot handed to the router facade.
///
/// Validated by [`ConfigSnapshot::load`] before handoff; a request arriving
/// against a missing virtual-model-id `fails with UnknownModel` (enforced
/// by the Scheduler, not here).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSnapshot {
    /// Virtual models and providers
    #[serde(default)]
    pub llm: virtual_model::LlmTopology,
    /// Per-provider mapping tables, keyed by provider id
    #[serde(default)]
    pub mapping_tables: IndexMap<String, mapping::MappingTable>,
    /// Scheduler admission/concurrency policy
    #[serde(default)]
    pub scheduler: scheduler::SchedulerConfig,
    /// Default strategy thresholds, overridable per provider
    #[serde(default)]
    pub strategy: strategy::StrategyConfig,
    /// Per-provider strategy overrides, keyed by provider id
    #[serde(default)]
    pub strategy_overrides: IndexMap<String, strategy::StrategyConfig>,
    /// Monitoring & health thresholds
    #[serde(default)]
    pub monitoring: monitoring::MonitoringConfig,
    /// Log filter directive for the ambient tracing subscriber (e.g. "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to record full stage payloads in I/O trace records
    /// (otherwise a bounded excerpt plus a content hash is recorded)
    #[serde(default)]
    pub io_trace_debug: bool,
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl ConfigSnapshot {
    /// Resolve the effective strategy configuration for a provider,
    /// falling back to the global default when no override exists.
    pub fn strategy_for(&self, provider_id: &str) -> &strategy::StrategyConfig {
        self.strategy_overrides.get(provider_id).unwrap_or(&self.strategy)
    }
}
