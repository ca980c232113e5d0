//! Error Event log (spec.md §3 "Error Event", §4.9 "Event recording").

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use router_core::{Category, Severity};

/// One append-only error occurrence, recorded after any recovery attempt
/// has already run so `recovery_*` fields are known.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub error_id: String,
    pub timestamp: u64,
    pub error_type: &'static str,
    pub message: String,
    pub severity: Severity,
    pub category: Category,
    pub module_id: String,
    pub component: String,
    pub context: serde_json::Value,
    pub recovery_attempted: bool,
    pub recovery_successful: bool,
    pub strategy_used: Option<String>,
    pub handling_time_ms: u64,
}

/// Fields the caller supplies; `error_id`/`timestamp` are stamped by the log.
pub struct ErrorEventInput {
    pub error_type: &'static str,
    pub message: String,
    pub severity: Severity,
    pub category: Category,
    pub module_id: String,
    pub component: String,
    pub context: serde_json::Value,
    pub recovery_attempted: bool,
    pub recovery_successful: bool,
    pub strategy_used: Option<String>,
    pub handling_time_ms: u64,
}

fn now_unix_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Multi-producer single-consumer bounded log: producers never block —
/// a full queue evicts the oldest event and increments `dropped_events`
/// (spec.md §5 "Shared-resource policy").
pub struct EventLog {
    events: Mutex<VecDeque<ErrorEvent>>,
    capacity: usize,
    retention_count: usize,
    retention: Duration,
    dropped_events: AtomicU64,
    next_id: AtomicU64,
}

impl EventLog {
    #[must_use]
    pub fn new(capacity: usize, retention_count: usize, retention: Duration) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            retention_count,
            retention,
            dropped_events: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append an event, evicting the oldest entries if the queue is at
    /// capacity or retention has been exceeded.
    pub fn record(&self, input: ErrorEventInput) -> ErrorEvent {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event = ErrorEvent {
            error_id: format!("evt-{id}"),
            timestamp: now_unix_ms(),
            error_type: input.error_type,
            message: input.message,
            severity: input.severity,
            category: input.category,
            module_id: input.module_id,
            component: input.component,
            context: input.context,
            recovery_attempted: input.recovery_attempted,
            recovery_successful: input.recovery_successful,
            strategy_used: input.strategy_used,
            handling_time_ms: input.handling_time_ms,
        };

        let mut events = self.events.lock().expect("lock poisoned");
        events.push_back(event.clone());

        while events.len() > self.capacity || events.len() > self.retention_count {
            events.pop_front();
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }

        let cutoff = now_unix_ms().saturating_sub(self.retention.as_millis() as u64);
        while events.front().is_some_and(|e| e.timestamp < cutoff) {
            events.pop_front();
        }

        event
    }

    /// Snapshot of events with `timestamp >= since_ms_ago` before now.
    #[must_use]
    pub fn window(&self, since: Duration) -> Vec<ErrorEvent> {
        let cutoff = now_unix_ms().saturating_sub(since.as_millis() as u64);
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// All retained events, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<ErrorEvent> {
        self.events.lock().expect("lock poisoned").iter().cloned().collect()
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(module: &str) -> ErrorEventInput {
        ErrorEventInput {
            error_type: "timeout",
            message: "upstream timed out".into(),
            severity: Severity::Medium,
            category: Category::Transient,
            module_id: module.into(),
            component: "provider".into(),
            context: serde_json::json!({}),
            recovery_attempted: true,
            recovery_successful: true,
            strategy_used: Some("retry".into()),
            handling_time_ms: 12,
        }
    }

    #[test]
    fn bounded_capacity_evicts_oldest_and_counts_drops() {
        let log = EventLog::new(2, 100, Duration::from_secs(3600));
        log.record(input("a"));
        log.record(input("b"));
        log.record(input("c"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped_events(), 1);
    }

    #[test]
    fn window_filters_by_age() {
        let log = EventLog::new(100, 100, Duration::from_secs(3600));
        log.record(input("a"));
        let recent = log.window(Duration::from_secs(60));
        assert_eq!(recent.len(), 1);
    }
}
