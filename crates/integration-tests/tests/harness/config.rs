//! Programmatic `ConfigSnapshot` builder for integration tests.

use router_config::{
    AuthDescriptor, CircuitBreakerConfig, ConfigSnapshot, LoadBalancingPolicy, Provider, ProtocolFamily, RetryConfig,
    Target, TargetStatus, VirtualModel, VirtualModelCapabilities,
};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: ConfigSnapshot,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self { config: ConfigSnapshot::default() }
    }

    /// Register an upstream provider pointed at a mock backend
    pub fn with_provider(mut self, id: &str, protocol: ProtocolFamily, base_url: &str) -> Self {
        self.config.llm.providers.insert(
            id.to_owned(),
            Provider {
                id: id.to_owned(),
                protocol,
                base_url: base_url.parse().expect("valid mock base url"),
                auth: AuthDescriptor::None,
                streaming: true,
                max_tokens: None,
                request_timeout_secs: 5,
                stream_deadline_secs: 30,
                health_check_path: None,
            },
        );
        self
    }

    /// Register a virtual model resolving to the given targets
    pub fn with_virtual_model(mut self, vm_id: &str, targets: Vec<Target>, policy: LoadBalancingPolicy) -> Self {
        self.config.llm.virtual_models.insert(
            vm_id.to_owned(),
            VirtualModel {
                id: vm_id.to_owned(),
                display_name: None,
                capabilities: VirtualModelCapabilities::default(),
                targets,
                policy,
            },
        );
        self
    }

    /// One provider, one virtual model, one target, wired 1:1 as `vm1`
    pub fn with_single_openai_target(self, base_url: &str) -> Self {
        self.with_provider("p1", ProtocolFamily::Openai, base_url)
            .with_virtual_model("vm1", vec![target("t1", "p1", "mock-model-1")], LoadBalancingPolicy::RoundRobin)
    }

    /// A primary and a backup target on virtual model `vm1`, exercising the
    /// Strategy Manager's `retry-new-target` path when the primary fails.
    /// Priority breaks the tie deterministically so the primary is always
    /// tried first.
    pub fn with_primary_and_backup(self, primary_url: &str, backup_url: &str) -> Self {
        self.with_provider("primary", ProtocolFamily::Openai, primary_url)
            .with_provider("backup", ProtocolFamily::Openai, backup_url)
            .with_virtual_model(
                "vm1",
                vec![
                    Target {
                        id: "t-primary".to_owned(),
                        provider_id: "primary".to_owned(),
                        model_id: "mock-model-1".to_owned(),
                        weight: 1,
                        priority: 0,
                        status: TargetStatus::Active,
                    },
                    Target {
                        id: "t-backup".to_owned(),
                        provider_id: "backup".to_owned(),
                        model_id: "mock-model-1".to_owned(),
                        weight: 1,
                        priority: 10,
                        status: TargetStatus::Active,
                    },
                ],
                LoadBalancingPolicy::Priority,
            )
    }

    /// Shrink retry backoff so failover tests don't wait on real delays.
    /// `max_attempts` is generous enough for two targets to each exhaust
    /// their one same-target retry (spec.md §4.7) before the attempt
    /// budget itself runs out.
    pub fn with_fast_retry(mut self) -> Self {
        self.config.strategy.retry =
            RetryConfig { max_attempts: 5, base_delay_ms: 5, multiplier: 1.0, max_delay_ms: 20, jitter: false };
        self
    }

    /// Trip the circuit breaker on the first observed failure
    pub fn with_low_circuit_breaker_threshold(mut self) -> Self {
        self.config.strategy.circuit_breaker = CircuitBreakerConfig {
            failure_threshold: 1,
            volume_threshold: 1,
            window_seconds: 60,
            recovery_timeout_ms: 50,
            half_open_attempts: 1,
            success_threshold: 1,
        };
        self
    }

    /// Build the final config
    pub fn build(self) -> ConfigSnapshot {
        self.config
    }
}

fn target(id: &str, provider_id: &str, model_id: &str) -> Target {
    Target {
        id: id.to_owned(),
        provider_id: provider_id.to_owned(),
        model_id: model_id.to_owned(),
        weight: 1,
        priority: 0,
        status: TargetStatus::Active,
    }
}
