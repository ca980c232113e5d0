use serde::Deserialize;

/// Admission and concurrency configuration for the Scheduler
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Maximum number of in-flight requests admitted at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// How long admission may block waiting for a semaphore slot before
    /// failing with `Backpressure`, in milliseconds
    #[serde(default = "default_queue_wait_ms")]
    pub queue_wait_ms: u64,
    /// Minimum health score (0-100) a target must meet for the
    /// `health-based` load-balancing policy to consider it; if every
    /// eligible target falls below this, selection falls back to
    /// round-robin (spec.md §4.1 "health-based").
    #[serde(default = "default_health_threshold")]
    pub health_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            queue_wait_ms: default_queue_wait_ms(),
            health_threshold: default_health_threshold(),
        }
    }
}

const fn default_max_concurrency() -> usize {
    256
}

const fn default_queue_wait_ms() -> u64 {
    2_000
}

const fn default_health_threshold() -> f64 {
    50.0
}
