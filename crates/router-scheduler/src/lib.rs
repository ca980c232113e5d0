//! Scheduler (spec.md §4.2): admits requests under a concurrency bound and
//! resolves a virtual-model-id to a concrete target using the virtual
//! model's configured load-balancing policy, honoring circuit-breaker
//! reachability and a per-request exclusion set.

mod error;
mod policy;
mod target_state;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use router_config::ConfigSnapshot;
use router_core::{CoreError, ResolvedTarget};
use router_strategy::StrategyManager;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub use policy::{Candidate, RoundRobinCursor};
pub use target_state::TargetState;

/// Owns admission control and per-target live state for the whole
/// process. Cheap to construct per `ConfigSnapshot` swap; target state is
/// keyed by `(virtual_model_id, target_id)` and re-created lazily, so a
/// config swap simply drops stale entries rather than migrating them.
pub struct Scheduler {
    config: Arc<ConfigSnapshot>,
    semaphore: Arc<Semaphore>,
    queue_wait: Duration,
    round_robin: DashMap<String, RoundRobinCursor>,
    target_states: DashMap<String, Arc<TargetState>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: Arc<ConfigSnapshot>) -> Self {
        let scheduler_config = &config.scheduler;
        Self {
            semaphore: Arc::new(Semaphore::new(scheduler_config.max_concurrency)),
            queue_wait: Duration::from_millis(scheduler_config.queue_wait_ms),
            round_robin: DashMap::new(),
            target_states: DashMap::new(),
            config,
        }
    }

    /// Acquire an admission slot, failing with `Backpressure` if none frees
    /// up within the configured queue-wait budget.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backpressure` if the wait budget elapses first.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, CoreError> {
        match tokio::time::timeout(self.queue_wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(error::backpressure("admission semaphore closed")),
            Err(_) => Err(error::backpressure(format!(
                "no admission slot available within {}ms",
                self.queue_wait.as_millis()
            ))),
        }
    }

    fn state_key(virtual_model_id: &str, target_id: &str) -> String {
        format!("{virtual_model_id}:{target_id}")
    }

    /// Live state for a given target, created lazily on first access.
    #[must_use]
    pub fn target_state(&self, virtual_model_id: &str, target_id: &str) -> Arc<TargetState> {
        let key = Self::state_key(virtual_model_id, target_id);
        self.target_states.entry(key).or_default().clone()
    }

    /// Resolve `virtual_model_id` to a concrete target, excluding anything
    /// in `excluded` (targets already tried for this request) and anything
    /// whose circuit breaker is OPEN.
    ///
    /// # Errors
    ///
    /// - `UnknownModel` if no virtual model with this id is configured.
    /// - `NoHealthyTarget` if no target is eligible and nothing has been
    ///   excluded yet (the topology itself has nothing usable).
    /// - `ExhaustedTargets` if eligible targets existed but all have now
    ///   been excluded by previous attempts.
    pub fn resolve_target(
        &self,
        virtual_model_id: &str,
        excluded: &HashSet<String>,
        strategy: &StrategyManager,
    ) -> Result<ResolvedTarget, CoreError> {
        let virtual_model = self
            .config
            .llm
            .virtual_models
            .get(virtual_model_id)
            .ok_or_else(|| error::unknown_model(virtual_model_id))?;

        let candidates: Vec<Candidate<'_>> = virtual_model
            .targets
            .iter()
            .filter(|t| t.status == router_config::TargetStatus::Active)
            .filter(|t| !excluded.contains(&t.id))
            .filter(|t| strategy.is_target_reachable(&Self::state_key(virtual_model_id, &t.id)))
            .map(|target| {
                let state = self.target_state(virtual_model_id, &target.id);
                Candidate { target, state }
            })
            .collect();

        if candidates.is_empty() {
            // `excluded` empty means this is the first attempt: either the
            // topology has no active target at all, or every active target's
            // circuit is open. Either way it's a health problem, not
            // exhaustion from retrying.
            return if excluded.is_empty() {
                Err(error::no_healthy_target(virtual_model_id))
            } else {
                Err(error::exhausted_targets(virtual_model_id, excluded.iter().cloned().collect()))
            };
        }

        let cursor = self.round_robin.entry(virtual_model_id.to_owned()).or_default();
        let chosen = policy::select(virtual_model.policy, candidates, &cursor, self.config.scheduler.health_threshold)
            .ok_or_else(|| error::no_healthy_target(virtual_model_id))?;

        Ok(ResolvedTarget {
            target_id: chosen.id.clone(),
            provider_id: chosen.provider_id.clone(),
            model_id: chosen.model_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use router_config::{LlmTopology, StrategyConfig, Target, TargetStatus, VirtualModel};

    fn snapshot_with_one_target() -> Arc<ConfigSnapshot> {
        let target = Target {
            id: "t1".to_owned(),
            provider_id: "openai".to_owned(),
            model_id: "gpt-4o".to_owned(),
            weight: 1,
            priority: 0,
            status: TargetStatus::Active,
        };
        let mut virtual_models = IndexMap::new();
        virtual_models.insert(
            "vm1".to_owned(),
            VirtualModel {
                id: "vm1".to_owned(),
                display_name: None,
                capabilities: Default::default(),
                targets: vec![target],
                policy: Default::default(),
            },
        );
        Arc::new(ConfigSnapshot {
            llm: LlmTopology {
                virtual_models,
                providers: IndexMap::new(),
            },
            ..Default::default()
        })
    }

    #[test]
    fn unknown_virtual_model_fails_fast() {
        let scheduler = Scheduler::new(snapshot_with_one_target());
        let strategy = StrategyManager::new(&StrategyConfig::default());
        let result = scheduler.resolve_target("nope", &HashSet::new(), &strategy);
        assert!(matches!(result, Err(CoreError::UnknownModel(_))));
    }

    #[test]
    fn resolves_the_only_target() {
        let scheduler = Scheduler::new(snapshot_with_one_target());
        let strategy = StrategyManager::new(&StrategyConfig::default());
        let resolved = scheduler.resolve_target("vm1", &HashSet::new(), &strategy).unwrap();
        assert_eq!(resolved.target_id, "t1");
    }

    #[test]
    fn excluding_the_only_target_reports_exhaustion() {
        let scheduler = Scheduler::new(snapshot_with_one_target());
        let strategy = StrategyManager::new(&StrategyConfig::default());
        let mut excluded = HashSet::new();
        excluded.insert("t1".to_owned());
        let result = scheduler.resolve_target("vm1", &excluded, &strategy);
        assert!(matches!(result, Err(CoreError::ExhaustedTargets(..))));
    }

    #[tokio::test]
    async fn admission_respects_max_concurrency() {
        let config = snapshot_with_one_target();
        let scheduler = Scheduler::new(config);
        let _permit = scheduler.admit().await.expect("first slot available");
    }
}
