//! The core error taxonomy (spec.md §7), shared by every crate in the workspace.

use thiserror::Error;

/// Severity used by Monitoring & Health when recording an Error Event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Broad category an error kind falls into, used for metrics breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Caller-side mistake: not retried, surfaced immediately
    Client,
    /// Transient upstream condition: eligible for retry
    Transient,
    /// Upstream credential problem
    Auth,
    /// Target-level unavailability (circuit open, exhausted)
    Availability,
    /// Malformed data on the wire
    Protocol,
    /// Request lifecycle (cancellation, deadline)
    Lifecycle,
}

/// The full error taxonomy consumed by the Strategy Manager and surfaced to callers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown virtual model: {0}")]
    UnknownModel(String),

    #[error("admission refused: {0}")]
    Backpressure(String),

    #[error("no healthy target available for {0}")]
    NoHealthyTarget(String),

    #[error("all targets exhausted for {0}: tried {1:?}")]
    ExhaustedTargets(String, Vec<String>),

    #[error("authentication failed for provider {0}: {1}")]
    AuthFailed(String, String),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("network error contacting {0}: {1}")]
    Network(String, String),

    #[error("rate limited by {0}")]
    RateLimited {
        provider: String,
        retry_after: Option<std::time::Duration>,
    },

    #[error("provider {0} unavailable: {1}")]
    ProviderUnavailable(String, String),

    #[error("circuit open for target {0}")]
    CircuitOpen(String),

    #[error("malformed response from {0}: {1}")]
    MalformedResponse(String, String),

    #[error("malformed stream from {0}: {1}")]
    MalformedStream(String, String),

    #[error("unsupported protocol conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("streaming not supported by provider {0}")]
    StreamingUnsupported(String),

    #[error("request cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable name, used in error events and responses.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownModel(_) => "unknown_model",
            Self::Backpressure(_) => "backpressure",
            Self::NoHealthyTarget(_) => "no_healthy_target",
            Self::ExhaustedTargets(..) => "exhausted_targets",
            Self::AuthFailed(..) => "auth_failed",
            Self::Timeout(_) => "timeout",
            Self::Network(..) => "network",
            Self::RateLimited { .. } => "rate_limited",
            Self::ProviderUnavailable(..) => "provider_unavailable",
            Self::CircuitOpen(_) => "circuit_open",
            Self::MalformedResponse(..) => "malformed_response",
            Self::MalformedStream(..) => "malformed_stream",
            Self::UnsupportedConversion { .. } => "unsupported_conversion",
            Self::StreamingUnsupported(_) => "streaming_unsupported",
            Self::Cancelled(_) => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// Category used for metrics breakdowns (spec.md §4.9).
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::InvalidRequest(_)
            | Self::UnknownModel(_)
            | Self::UnsupportedConversion { .. }
            | Self::StreamingUnsupported(_) => Category::Client,
            Self::Backpressure(_) => Category::Lifecycle,
            Self::NoHealthyTarget(_) | Self::ExhaustedTargets(..) | Self::CircuitOpen(_) => Category::Availability,
            Self::AuthFailed(..) => Category::Auth,
            Self::Timeout(_) | Self::Network(..) | Self::RateLimited { .. } | Self::ProviderUnavailable(..) => {
                Category::Transient
            }
            Self::MalformedResponse(..) | Self::MalformedStream(..) | Self::Internal(_) => Category::Protocol,
            Self::Cancelled(_) => Category::Lifecycle,
        }
    }

    /// Default severity, used when an Error Event is recorded without an
    /// explicit override.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::InvalidRequest(_) | Self::UnknownModel(_) | Self::UnsupportedConversion { .. } => Severity::Low,
            Self::Backpressure(_) | Self::Timeout(_) | Self::RateLimited { .. } | Self::StreamingUnsupported(_) => {
                Severity::Medium
            }
            Self::Network(..) | Self::ProviderUnavailable(..) | Self::MalformedResponse(..) | Self::MalformedStream(..) => {
                Severity::High
            }
            Self::AuthFailed(..) | Self::NoHealthyTarget(_) | Self::ExhaustedTargets(..) | Self::CircuitOpen(_) => {
                Severity::High
            }
            Self::Cancelled(_) => Severity::Low,
            Self::Internal(_) => Severity::Critical,
        }
    }

    /// Whether the Strategy Manager's Retry strategy considers this kind
    /// transient and eligible for a retry (spec.md §4.7 priority 1, §7).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Network(..) | Self::RateLimited { .. } | Self::ProviderUnavailable(..)
        )
    }

}
