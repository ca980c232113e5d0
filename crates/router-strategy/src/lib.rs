//! Strategy Manager (spec.md §4.7): given an error and its execution
//! context, dispatches Circuit Breaker, Retry, and Fallback strategies in
//! priority order and returns a decision to the Pipeline Executor.

pub mod circuit_breaker;
pub mod fallback;
pub mod retry;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use router_config::StrategyConfig;
use router_core::CoreError;
use serde::Serialize;

pub use circuit_breaker::{CircuitBreaker, State as CircuitState};
pub use fallback::ResponseCache;

/// What the Executor should do next after a stage failure.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Continue the pipeline with the stage's own result (no error).
    Proceed,
    /// Wait `after`, then restart the pipeline on the same target.
    RetrySameTarget { after: Duration },
    /// Wait `after`, then restart the pipeline with a newly-selected
    /// target, excluding everything already tried.
    RetryNewTarget { after: Duration },
    /// Short-circuit with a substitute result instead of the error.
    FallbackResult(serde_json::Value),
    /// No strategy could handle the error; propagate it to the caller.
    GiveUp,
}

/// Per-strategy execution counters, fed into `router-monitoring`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyMetrics {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
    pub error_type_counts: HashMap<String, u64>,
}

impl StrategyMetrics {
    fn record(&mut self, succeeded: bool, duration: Duration, error_kind: &str) {
        self.executions += 1;
        if succeeded {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration_ms += duration.as_millis() as u64;
        *self.error_type_counts.entry(error_kind.to_owned()).or_insert(0) += 1;
    }

    #[must_use]
    pub fn average_duration_ms(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.executions as f64
        }
    }
}

#[derive(Default)]
struct MetricsByStrategy {
    circuit_breaker: Mutex<StrategyMetrics>,
    retry: Mutex<StrategyMetrics>,
    fallback: Mutex<StrategyMetrics>,
}

/// Owns all three strategies and dispatches errors to them in priority
/// order: Circuit Breaker (0) -> Retry (1) -> Fallback (2).
pub struct StrategyManager {
    circuit_breaker: CircuitBreaker,
    response_cache: ResponseCache,
    metrics: MetricsByStrategy,
    /// Per-target count of retries already spent on the *current* target
    /// within this attempt chain, keyed by target id.
    same_target_retries: Mutex<HashMap<String, u32>>,
}

impl StrategyManager {
    #[must_use]
    pub fn new(default_config: &StrategyConfig) -> Self {
        Self {
            circuit_breaker: CircuitBreaker::new(),
            response_cache: ResponseCache::new(
                Duration::from_secs(default_config.fallback.cached_response_ttl_secs),
                10_000,
            ),
            metrics: MetricsByStrategy::default(),
            same_target_retries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    #[must_use]
    pub fn response_cache(&self) -> &ResponseCache {
        &self.response_cache
    }

    /// Record a result of calling a provider, independent of any error
    /// dispatch, so the breaker can advance on success.
    pub fn record_provider_outcome(&self, target_id: &str, config: &StrategyConfig, succeeded: bool) {
        if succeeded {
            self.circuit_breaker.record_success(target_id, &config.circuit_breaker);
            self.same_target_retries.lock().expect("lock poisoned").remove(target_id);
        } else {
            self.circuit_breaker.record_failure(target_id, &config.circuit_breaker);
        }
    }

    /// Whether `target_id` is currently admissible (not OPEN).
    #[must_use]
    pub fn is_target_reachable(&self, target_id: &str) -> bool {
        self.circuit_breaker.is_reachable(target_id)
    }

    /// Dispatch an error for `target_id`, trying strategies in priority
    /// order and returning the first applicable decision.
    pub fn handle(
        &self,
        error: &CoreError,
        target_id: &str,
        config: &StrategyConfig,
        attempts_spent: u32,
        cache_key: &str,
    ) -> Decision {
        if let CoreError::CircuitOpen(_) = error {
            let start = Instant::now();
            self.record_metric(&self.metrics.circuit_breaker, true, start.elapsed(), error.kind());
            return Decision::RetryNewTarget { after: Duration::ZERO };
        }

        if retry::can_handle(error) && retry::attempts_remaining(&config.retry, attempts_spent) {
            let start = Instant::now();
            let mut retries = self.same_target_retries.lock().expect("lock poisoned");
            let same_target_retries = retries.entry(target_id.to_owned()).or_insert(0);
            let delay = retry::backoff_delay(&config.retry, attempts_spent);

            let decision = if retry::should_rotate_target(*same_target_retries) {
                *same_target_retries = 0;
                Decision::RetryNewTarget { after: delay }
            } else {
                *same_target_retries += 1;
                Decision::RetrySameTarget { after: delay }
            };
            drop(retries);

            self.record_metric(&self.metrics.retry, true, start.elapsed(), error.kind());
            return decision;
        }

        if let Some(decision) = fallback::decide(error, &config.fallback, &self.response_cache, cache_key) {
            let start = Instant::now();
            self.record_metric(&self.metrics.fallback, true, start.elapsed(), error.kind());
            return decision;
        }

        Decision::GiveUp
    }

    fn record_metric(&self, metric: &Mutex<StrategyMetrics>, succeeded: bool, duration: Duration, error_kind: &str) {
        metric.lock().expect("lock poisoned").record(succeeded, duration, error_kind);
    }

    #[must_use]
    pub fn circuit_breaker_metrics(&self) -> StrategyMetrics {
        self.metrics.circuit_breaker.lock().expect("lock poisoned").clone()
    }

    #[must_use]
    pub fn retry_metrics(&self) -> StrategyMetrics {
        self.metrics.retry.lock().expect("lock poisoned").clone()
    }

    #[must_use]
    pub fn fallback_metrics(&self) -> StrategyMetrics {
        self.metrics.fallback.lock().expect("lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_error_with_attempts_left_retries_same_target() {
        let manager = StrategyManager::new(&StrategyConfig::default());
        let decision = manager.handle(
            &CoreError::Timeout("p1".into()),
            "t1",
            &StrategyConfig::default(),
            0,
            "key",
        );
        assert!(matches!(decision, Decision::RetrySameTarget { .. }));
    }

    #[test]
    fn circuit_open_rotates_target_immediately() {
        let manager = StrategyManager::new(&StrategyConfig::default());
        let decision = manager.handle(&CoreError::CircuitOpen("t1".into()), "t1", &StrategyConfig::default(), 0, "key");
        assert!(matches!(decision, Decision::RetryNewTarget { .. }));
    }

    #[test]
    fn exhausted_retries_falls_through_to_fallback_or_give_up() {
        let manager = StrategyManager::new(&StrategyConfig::default());
        let decision = manager.handle(
            &CoreError::InvalidRequest("bad".into()),
            "t1",
            &StrategyConfig::default(),
            0,
            "key",
        );
        assert!(matches!(decision, Decision::GiveUp));
    }

    #[test]
    fn repeated_retries_on_same_target_eventually_rotate() {
        let manager = StrategyManager::new(&StrategyConfig::default());
        let config = StrategyConfig::default();
        let first = manager.handle(&CoreError::Network("p1".into(), "reset".into()), "t1", &config, 0, "key");
        assert!(matches!(first, Decision::RetrySameTarget { .. }));
        let second = manager.handle(&CoreError::Network("p1".into(), "reset".into()), "t1", &config, 1, "key");
        assert!(matches!(second, Decision::RetryNewTarget { .. }));
    }
}
