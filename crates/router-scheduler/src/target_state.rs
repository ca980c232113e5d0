//! Per-target live statistics (spec.md §3 Target: "active-connection count,
//! recent failure count, last-failure time"), kept separately from the
//! static configuration since it mutates on every request.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Default)]
pub struct TargetState {
    active_connections: AtomicU32,
    recent_failures: AtomicU32,
    last_failure_unix_ms: AtomicI64,
}

fn now_unix_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

impl TargetState {
    pub fn begin_request(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn end_request(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.recent_failures.fetch_add(1, Ordering::Relaxed);
        self.last_failure_unix_ms.store(now_unix_ms(), Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.recent_failures.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn recent_failures(&self) -> u32 {
        self.recent_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn last_failure_unix_ms(&self) -> Option<i64> {
        let ts = self.last_failure_unix_ms.load(Ordering::Relaxed);
        (ts > 0).then_some(ts)
    }

    /// A simple health proxy for the `health-based` policy: fewer recent
    /// failures and fewer active connections is healthier.
    #[must_use]
    pub fn health_score(&self) -> f64 {
        let failures = f64::from(self.recent_failures());
        let load = f64::from(self.active_connections());
        100.0 / (1.0 + failures * 10.0 + load)
    }
}
