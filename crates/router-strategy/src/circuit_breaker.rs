//! Circuit Breaker (spec.md §4.7, priority 0): per-target CLOSED / OPEN /
//! HALF_OPEN state machine, created lazily and kept for the life of the
//! process.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use router_config::CircuitBreakerConfig;

/// Current lifecycle state of one target's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

struct TargetState {
    state: State,
    failure_count: u32,
    request_count_in_window: u32,
    window_start: Instant,
    last_state_change: Instant,
    half_open_successes: u32,
    half_open_in_flight: u32,
}

impl TargetState {
    fn new(now: Instant) -> Self {
        Self {
            state: State::Closed,
            failure_count: 0,
            request_count_in_window: 0,
            window_start: now,
            last_state_change: now,
            half_open_successes: 0,
            half_open_in_flight: 0,
        }
    }

    fn roll_window_if_expired(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_start) >= window {
            self.failure_count = 0;
            self.request_count_in_window = 0;
            self.window_start = now;
        }
    }

    fn transition(&mut self, to: State, now: Instant) {
        self.state = to;
        self.last_state_change = now;
        self.half_open_successes = 0;
        self.half_open_in_flight = 0;
        if to == State::Closed {
            self.failure_count = 0;
            self.request_count_in_window = 0;
            self.window_start = now;
        }
    }
}

/// Returned by [`CircuitBreaker::admit`] when the breaker rejects a
/// request outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;

/// Per-target circuit breaker registry, backed by a concurrent map so
/// independent targets never contend on each other's lock.
#[derive(Default)]
pub struct CircuitBreaker {
    targets: DashMap<String, Mutex<TargetState>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a request to `target_id` may proceed. Transitions
    /// OPEN -> HALF_OPEN when the recovery timeout has elapsed, and admits
    /// at most `half_open_attempts` concurrent probes while HALF_OPEN.
    pub fn admit(&self, target_id: &str, config: &CircuitBreakerConfig) -> Result<(), Rejected> {
        let now = Instant::now();
        let entry = self.targets.entry(target_id.to_owned()).or_insert_with(|| Mutex::new(TargetState::new(now)));
        let mut state = entry.lock().expect("lock poisoned");

        match state.state {
            State::Closed => {
                state.roll_window_if_expired(now, Duration::from_secs(config.window_seconds));
                state.request_count_in_window += 1;
                Ok(())
            }
            State::Open => {
                let recovery_timeout = Duration::from_millis(config.recovery_timeout_ms);
                if now.duration_since(state.last_state_change) >= recovery_timeout {
                    state.transition(State::HalfOpen, now);
                    state.half_open_in_flight = 1;
                    Ok(())
                } else {
                    Err(Rejected)
                }
            }
            State::HalfOpen => {
                if state.half_open_in_flight < config.half_open_attempts {
                    state.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(Rejected)
                }
            }
        }
    }

    /// Record a successful call (delivered by the Provider Adapter on each
    /// success so a HALF_OPEN breaker can advance).
    pub fn record_success(&self, target_id: &str, config: &CircuitBreakerConfig) {
        let Some(entry) = self.targets.get(target_id) else { return };
        let now = Instant::now();
        let mut state = entry.lock().expect("lock poisoned");

        match state.state {
            State::Closed => {
                state.roll_window_if_expired(now, Duration::from_secs(config.window_seconds));
            }
            State::HalfOpen => {
                state.half_open_successes += 1;
                if state.half_open_successes >= config.success_threshold {
                    state.transition(State::Closed, now);
                }
            }
            State::Open => {}
        }
    }

    /// Record a failed call, possibly tripping (or re-tripping) the breaker.
    pub fn record_failure(&self, target_id: &str, config: &CircuitBreakerConfig) {
        let now = Instant::now();
        let entry = self.targets.entry(target_id.to_owned()).or_insert_with(|| Mutex::new(TargetState::new(now)));
        let mut state = entry.lock().expect("lock poisoned");

        match state.state {
            State::Closed => {
                state.roll_window_if_expired(now, Duration::from_secs(config.window_seconds));
                state.failure_count += 1;
                if state.failure_count >= config.failure_threshold && state.request_count_in_window >= config.volume_threshold
                {
                    state.transition(State::Open, now);
                }
            }
            State::HalfOpen => {
                state.transition(State::Open, now);
            }
            State::Open => {}
        }
    }

    /// Current state, mainly for health reporting and tests.
    #[must_use]
    pub fn state_of(&self, target_id: &str) -> State {
        self.targets
            .get(target_id)
            .map(|entry| entry.lock().expect("lock poisoned").state)
            .unwrap_or(State::Closed)
    }

    /// Whether `target_id` is currently reachable (spec.md §3: "A target is
    /// 'reachable' when its provider's circuit breaker is not OPEN").
    #[must_use]
    pub fn is_reachable(&self, target_id: &str) -> bool {
        self.state_of(target_id) != State::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            volume_threshold: 3,
            window_seconds: 60,
            recovery_timeout_ms: 50,
            half_open_attempts: 1,
            success_threshold: 2,
        }
    }

    #[test]
    fn closed_circuit_admits_requests() {
        let cb = CircuitBreaker::new();
        assert!(cb.admit("t1", &config()).is_ok());
    }

    #[test]
    fn opens_after_failure_and_volume_thresholds_met() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        for _ in 0..3 {
            cb.admit("t1", &cfg).unwrap();
            cb.record_failure("t1", &cfg);
        }
        assert_eq!(cb.state_of("t1"), State::Open);
        assert!(cb.admit("t1", &cfg).is_err());
    }

    #[test]
    fn half_open_after_recovery_timeout_then_closes_on_successes() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        for _ in 0..3 {
            cb.admit("t1", &cfg).unwrap();
            cb.record_failure("t1", &cfg);
        }
        std::thread::sleep(Duration::from_millis(60));

        assert!(cb.admit("t1", &cfg).is_ok());
        assert_eq!(cb.state_of("t1"), State::HalfOpen);
        // A second concurrent probe is rejected while one is in flight.
        assert!(cb.admit("t1", &cfg).is_err());

        cb.record_success("t1", &cfg);
        assert_eq!(cb.state_of("t1"), State::HalfOpen);
        cb.record_success("t1", &cfg);
        assert_eq!(cb.state_of("t1"), State::Closed);
    }

    #[test]
    fn half_open_failure_reopens_and_resets_timer() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        for _ in 0..3 {
            cb.admit("t1", &cfg).unwrap();
            cb.record_failure("t1", &cfg);
        }
        std::thread::sleep(Duration::from_millis(60));
        cb.admit("t1", &cfg).unwrap();
        cb.record_failure("t1", &cfg);
        assert_eq!(cb.state_of("t1"), State::Open);
        assert!(cb.admit("t1", &cfg).is_err());
    }

    #[test]
    fn independent_targets_do_not_share_state() {
        let cb = CircuitBreaker::new();
        let cfg = config();
        for _ in 0..3 {
            cb.admit("t1", &cfg).unwrap();
            cb.record_failure("t1", &cfg);
        }
        assert_eq!(cb.state_of("t1"), State::Open);
        assert_eq!(cb.state_of("t2"), State::Closed);
    }
}
