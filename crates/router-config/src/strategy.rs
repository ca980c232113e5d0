use serde::Deserialize;

/// Policy thresholds consumed by the Strategy Manager: retry, fallback,
/// and circuit breaker, one set per provider (falling back to `default`
/// when a provider has no override).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

/// Exponential backoff retry configuration (spec.md §4.7, priority 1)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Remaining-attempts budget
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound on computed delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Whether to apply uniform jitter in `[0.5x, 1.0x]`
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_true(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}
const fn default_base_delay_ms() -> u64 {
    1_000
}
const fn default_multiplier() -> f64 {
    2.0
}
const fn default_max_delay_ms() -> u64 {
    30_000
}
const fn default_true() -> bool {
    true
}

/// Circuit breaker configuration (spec.md §4.7, priority 0)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Failures within the monitoring window required to trip the breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Minimum number of requests observed in the window before the
    /// failure threshold is considered meaningful
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: u32,
    /// Sliding window duration, in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds to wait in OPEN before transitioning to HALF_OPEN
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
    /// Probe requests allowed while HALF_OPEN
    #[serde(default = "default_half_open_attempts")]
    pub half_open_attempts: u32,
    /// Consecutive HALF_OPEN successes required to transition back to CLOSED
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            volume_threshold: default_volume_threshold(),
            window_seconds: default_window_seconds(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
            half_open_attempts: default_half_open_attempts(),
            success_threshold: default_success_threshold(),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    5
}
const fn default_volume_threshold() -> u32 {
    5
}
const fn default_window_seconds() -> u64 {
    60
}
const fn default_recovery_timeout_ms() -> u64 {
    30_000
}
const fn default_half_open_attempts() -> u32 {
    1
}
const fn default_success_threshold() -> u32 {
    2
}

/// Fallback strategy configuration (spec.md §4.7, priority 2)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Ordered list of fallback actions to try
    #[serde(default = "default_actions")]
    pub actions: Vec<FallbackAction>,
    /// Whether a cached response may be substituted for a failed request
    #[serde(default)]
    pub cached_response_enabled: bool,
    /// TTL for the optional request-keyed cached-response memoization
    #[serde(default = "default_cache_ttl_secs")]
    pub cached_response_ttl_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            actions: default_actions(),
            cached_response_enabled: false,
            cached_response_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_actions() -> Vec<FallbackAction> {
    vec![
        FallbackAction::TokenRefresh,
        FallbackAction::AlternativeProvider,
        FallbackAction::CachedResponse,
        FallbackAction::GracefulDegradation,
    ]
}

const fn default_cache_ttl_secs() -> u64 {
    300
}

/// One ordered fallback action (spec.md §4.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    TokenRefresh,
    AlternativeProvider,
    CachedResponse,
    GracefulDegradation,
}
