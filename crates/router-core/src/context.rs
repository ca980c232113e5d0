use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::io_trace::IoRecord;

/// Per-request state carried through every pipeline stage.
///
/// Created by the Scheduler on admission, passed by reference through
/// every stage, finalized and surrendered to Monitoring after the
/// response terminates. The context is owned by exactly one in-flight
/// request at a time; stages may read any field but only the
/// Scheduler/Executor mutate `target` and `attempt`.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Caller-supplied or generated session identifier
    pub session_id: String,
    /// Unique id for this request
    pub request_id: String,
    /// The virtual model this request was admitted against
    pub routing_id: String,
    /// Resolved provider+model target; may change on retry
    target: std::sync::RwLock<Option<ResolvedTarget>>,
    /// Wall-clock instant this context was created
    pub start_time: Instant,
    /// Absolute deadline for the whole request
    pub deadline: Instant,
    /// Attempt counter, incremented on each retry/target rotation
    attempt: AtomicU32,
    /// Target ids already tried for this request, newest last
    tried_targets: std::sync::Mutex<Vec<String>>,
    /// Append-only ordered log of per-stage inputs/outputs
    io_records: std::sync::Mutex<Vec<IoRecord>>,
    /// Opaque metadata map available to all stages
    pub metadata: std::sync::Mutex<HashMap<String, Value>>,
    /// Cancellation signal observed at every suspension point
    pub cancellation: CancellationToken,
}

/// A resolved (provider, model) pair bound to a request attempt
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub target_id: String,
    pub provider_id: String,
    pub model_id: String,
}

impl ExecutionContext {
    /// Create a new context admitted against `routing_id`, with a deadline
    /// `timeout` from now.
    #[must_use]
    pub fn new(session_id: String, request_id: String, routing_id: String, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            request_id,
            routing_id,
            target: std::sync::RwLock::new(None),
            start_time: now,
            deadline: now + timeout,
            attempt: AtomicU32::new(0),
            tried_targets: std::sync::Mutex::new(Vec::new()),
            io_records: std::sync::Mutex::new(Vec::new()),
            metadata: std::sync::Mutex::new(HashMap::new()),
            cancellation: CancellationToken::new(),
        }
    }

    /// Current attempt number, starting at 0 for the first try
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    /// Bind a new target to this context, recording the attempt and
    /// excluding the target from future selection.
    pub fn set_target(&self, target: ResolvedTarget) {
        self.tried_targets.lock().expect("lock poisoned").push(target.target_id.clone());
        self.attempt.fetch_add(1, Ordering::AcqRel);
        *self.target.write().expect("lock poisoned") = Some(target);
    }

    /// The currently bound target, if any attempt has been made yet
    #[must_use]
    pub fn target(&self) -> Option<ResolvedTarget> {
        self.target.read().expect("lock poisoned").clone()
    }

    /// Target ids already tried for this request (excluded from reselection)
    #[must_use]
    pub fn tried_targets(&self) -> Vec<String> {
        self.tried_targets.lock().expect("lock poisoned").clone()
    }

    /// Whether the deadline has already elapsed
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time remaining until the deadline, zero if already elapsed
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Append an I/O record to the context's ordered log
    pub fn record_io(&self, record: IoRecord) {
        self.io_records.lock().expect("lock poisoned").push(record);
    }

    /// Snapshot of all I/O records appended so far, in order
    #[must_use]
    pub fn io_records(&self) -> Vec<IoRecord> {
        self.io_records.lock().expect("lock poisoned").clone()
    }

    /// Read a metadata value by key
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<Value> {
        self.metadata.lock().expect("lock poisoned").get(key).cloned()
    }

    /// Set a metadata value
    pub fn set_metadata(&self, key: impl Into<String>, value: Value) {
        self.metadata.lock().expect("lock poisoned").insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_target_and_zero_attempts() {
        let ctx = ExecutionContext::new("s1".into(), "r1".into(), "vm1".into(), Duration::from_secs(30));
        assert!(ctx.target().is_none());
        assert_eq!(ctx.attempt(), 0);
        assert!(ctx.tried_targets().is_empty());
    }

    #[test]
    fn set_target_increments_attempt_and_excludes_target() {
        let ctx = ExecutionContext::new("s1".into(), "r1".into(), "vm1".into(), Duration::from_secs(30));
        ctx.set_target(ResolvedTarget {
            target_id: "t1".into(),
            provider_id: "p1".into(),
            model_id: "m1".into(),
        });
        assert_eq!(ctx.attempt(), 1);
        assert_eq!(ctx.tried_targets(), vec!["t1".to_owned()]);
        assert_eq!(ctx.target().unwrap().target_id, "t1");
    }

    #[test]
    fn deadline_in_the_past_is_expired() {
        let ctx = ExecutionContext::new("s1".into(), "r1".into(), "vm1".into(), Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[test]
    fn cancellation_is_observed() {
        let ctx = ExecutionContext::new("s1".into(), "r1".into(), "vm1".into(), Duration::from_secs(30));
        assert!(!ctx.is_cancelled());
        ctx.cancellation.cancel();
        assert!(ctx.is_cancelled());
    }
}
