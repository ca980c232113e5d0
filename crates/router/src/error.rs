//! The structured, user-visible failure shape the facade returns to
//! callers (spec.md §7 "User-visible failure behaviour"): `{ kind,
//! message, details, attempted_targets?, retry_after? }`.

use std::time::Duration;

use router_core::CoreError;
use serde::Serialize;

/// What a caller of [`crate::Router::schedule`] or
/// [`crate::Router::schedule_streaming`] sees on failure.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RouterError {
    /// Stable machine-readable error kind (see [`CoreError::kind`])
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Free-form structured details
    pub details: serde_json::Value,
    /// Targets attempted before giving up, in attempt order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempted_targets: Vec<String>,
    /// Hint for how long the caller should wait before retrying, set for
    /// `RateLimited` and `Backpressure`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl RouterError {
    #[must_use]
    pub fn from_core(error: &CoreError, attempted_targets: Vec<String>) -> Self {
        let retry_after_ms = retry_after(error).map(|d| d.as_millis() as u64);
        Self {
            kind: error.kind().to_owned(),
            message: error.to_string(),
            details: serde_json::json!({ "category": format!("{:?}", error.category()) }),
            attempted_targets,
            retry_after_ms,
        }
    }
}

fn retry_after(error: &CoreError) -> Option<Duration> {
    match error {
        CoreError::RateLimited { retry_after, .. } => *retry_after,
        CoreError::Backpressure(_) => Some(Duration::from_millis(500)),
        _ => None,
    }
}
