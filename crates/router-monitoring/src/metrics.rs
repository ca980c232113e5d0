//! Rolling-window metrics aggregation (spec.md §4.9 "Metrics, per window").

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::event::{ErrorEvent, EventLog};

/// Point-in-time read of the rolling-window metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub window_secs: u64,
    pub total_errors: u64,
    pub errors_by_type: HashMap<String, u64>,
    pub errors_by_category: HashMap<String, u64>,
    pub errors_by_severity: HashMap<String, u64>,
    pub overall_recovery_rate: f64,
    pub average_handling_time_ms: f64,
    pub dropped_events: u64,
    pub providers: HashMap<String, ProviderMetrics>,
}

/// Per-provider breakdown within the window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderMetrics {
    pub total_errors: u64,
    pub consecutive_errors: u32,
    pub retry_success_rate: f64,
    pub fallback_usage_count: u64,
}

/// Compute a [`MetricsSnapshot`] from the event log's current window plus
/// per-provider consecutive-error counters tracked live by the Strategy
/// Manager / Provider Adapter.
#[must_use]
pub fn snapshot(log: &EventLog, window: Duration, consecutive_errors: &HashMap<String, u32>) -> MetricsSnapshot {
    let events = log.window(window);
    let total_errors = events.len() as u64;

    let mut errors_by_type = HashMap::new();
    let mut errors_by_category = HashMap::new();
    let mut errors_by_severity = HashMap::new();
    let mut providers: HashMap<String, (u64, u64, u64)> = HashMap::new(); // (errors, retry_attempts, retry_successes)
    let mut recovered = 0u64;
    let mut total_handling_time = 0u64;
    let mut fallback_usage: HashMap<String, u64> = HashMap::new();

    for event in &events {
        *errors_by_type.entry(event.error_type.to_owned()).or_insert(0) += 1;
        *errors_by_category.entry(category_label(event).to_owned()).or_insert(0) += 1;
        *errors_by_severity.entry(severity_label(event).to_owned()).or_insert(0) += 1;
        total_handling_time += event.handling_time_ms;

        if event.recovery_successful {
            recovered += 1;
        }

        let provider_entry = providers.entry(event.component.clone()).or_insert((0, 0, 0));
        provider_entry.0 += 1;
        if event.strategy_used.as_deref() == Some("retry") {
            provider_entry.1 += 1;
            if event.recovery_successful {
                provider_entry.2 += 1;
            }
        }
        if event.strategy_used.as_deref() == Some("fallback") {
            *fallback_usage.entry(event.component.clone()).or_insert(0) += 1;
        }
    }

    let overall_recovery_rate = if total_errors == 0 {
        1.0
    } else {
        f64::from(u32::try_from(recovered).unwrap_or(u32::MAX)) / total_errors as f64
    };

    let average_handling_time_ms = if total_errors == 0 {
        0.0
    } else {
        total_handling_time as f64 / total_errors as f64
    };

    let provider_metrics = providers
        .into_iter()
        .map(|(provider, (errors, attempts, successes))| {
            let retry_success_rate = if attempts == 0 { 1.0 } else { successes as f64 / attempts as f64 };
            (
                provider.clone(),
                ProviderMetrics {
                    total_errors: errors,
                    consecutive_errors: consecutive_errors.get(&provider).copied().unwrap_or(0),
                    retry_success_rate,
                    fallback_usage_count: fallback_usage.get(&provider).copied().unwrap_or(0),
                },
            )
        })
        .collect();

    MetricsSnapshot {
        window_secs: window.as_secs(),
        total_errors,
        errors_by_type,
        errors_by_category,
        errors_by_severity,
        overall_recovery_rate,
        average_handling_time_ms,
        dropped_events: log.dropped_events(),
        providers: provider_metrics,
    }
}

fn category_label(event: &ErrorEvent) -> &'static str {
    match event.category {
        router_core::Category::Client => "client",
        router_core::Category::Transient => "transient",
        router_core::Category::Auth => "auth",
        router_core::Category::Availability => "availability",
        router_core::Category::Protocol => "protocol",
        router_core::Category::Lifecycle => "lifecycle",
    }
}

fn severity_label(event: &ErrorEvent) -> &'static str {
    match event.severity {
        router_core::Severity::Low => "low",
        router_core::Severity::Medium => "medium",
        router_core::Severity::High => "high",
        router_core::Severity::Critical => "critical",
    }
}
