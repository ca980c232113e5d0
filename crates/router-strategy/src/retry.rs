//! Retry strategy (spec.md §4.7, priority 1): exponential backoff with
//! optional jitter, capped at `max_delay_ms`.

use std::time::Duration;

use rand::Rng;
use router_config::RetryConfig;
use router_core::CoreError;

/// Whether `error` is eligible for the retry strategy at all.
#[must_use]
pub fn can_handle(error: &CoreError) -> bool {
    error.is_retryable()
}

/// Compute the backoff delay for `attempt` (0-indexed), applying uniform
/// jitter in `[0.5x, 1.0x]` when configured.
#[must_use]
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let raw = config.base_delay_ms as f64 * config.multiplier.powi(attempt as i32);
    let capped = raw.min(config.max_delay_ms as f64);

    let scaled = if config.jitter {
        let factor = rand::rng().random_range(0.5..=1.0);
        capped * factor
    } else {
        capped
    };

    Duration::from_millis(scaled.round() as u64)
}

/// Whether the caller has any retry attempts left, given how many have
/// already been spent.
#[must_use]
pub fn attempts_remaining(config: &RetryConfig, attempts_spent: u32) -> bool {
    attempts_spent < config.max_attempts
}

/// Whether the next retry should rotate to a different target rather than
/// reusing the current one. The first failure against a target is always
/// retried same-target; only once it has already failed on this target
/// (spec.md §4.7: "429 **after a retry**, repeated 5xx") does the manager
/// rotate, regardless of which transient error kind is in play.
#[must_use]
pub const fn should_rotate_target(same_target_retries: u32) -> bool {
    same_target_retries >= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let cfg = config();
        assert_eq!(backoff_delay(&cfg, 0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(&cfg, 1), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(&cfg, 2), Duration::from_millis(4_000));
    }

    #[test]
    fn delay_is_capped_at_max() {
        let cfg = config();
        let delay = backoff_delay(&cfg, 10);
        assert!(delay <= Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_stays_within_half_to_full_range() {
        let mut cfg = config();
        cfg.jitter = true;
        for _ in 0..50 {
            let delay = backoff_delay(&cfg, 0);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1_000));
        }
    }

    #[test]
    fn transient_network_error_is_handleable() {
        assert!(can_handle(&CoreError::Network("p1".into(), "reset".into())));
    }

    #[test]
    fn invalid_request_is_not_handleable() {
        assert!(!can_handle(&CoreError::InvalidRequest("bad".into())));
    }

    #[test]
    fn first_failure_against_a_target_retries_same_target() {
        assert!(!should_rotate_target(0));
    }

    #[test]
    fn repeat_failure_against_a_target_rotates() {
        assert!(should_rotate_target(1));
    }
}
