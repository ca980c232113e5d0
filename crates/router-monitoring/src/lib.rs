//! Monitoring & Health (spec.md §4.9): records error events emitted by the
//! rest of the core, and turns them into rolling-window metrics, health
//! scores, adaptive recovery pattern rankings, and threshold alerts.
//!
//! This crate has no HTTP/dashboard surface of its own — it is consumed by
//! the facade crate, which decides how (or whether) to expose it.

pub mod alerts;
pub mod anomaly;
pub mod event;
pub mod export;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod patterns;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use router_config::MonitoringConfig;

pub use alerts::{Alert, AlertThresholds, AlertType};
pub use anomaly::{Anomaly, AnomalyDetector};
pub use event::{ErrorEvent, ErrorEventInput, EventLog};
pub use health::{HealthReport, HealthStatus, ProviderHealth};
pub use metrics::{MetricsSnapshot, ProviderMetrics};
pub use patterns::{PatternTracker, RecoveryPattern};

/// Owns the event log and all derived analyses; one instance per running
/// router.
pub struct Monitoring {
    events: EventLog,
    patterns: PatternTracker,
    anomalies: AnomalyDetector,
    consecutive_errors: DashMap<String, AtomicU32>,
    window: Duration,
    thresholds: AlertThresholds,
    anomaly_detection_enabled: bool,
}

impl Monitoring {
    #[must_use]
    pub fn new(config: &MonitoringConfig) -> Self {
        Self {
            events: EventLog::new(
                config.event_queue_capacity,
                config.event_retention_count,
                Duration::from_secs(config.event_retention_secs),
            ),
            patterns: PatternTracker::new(config.learning_rate),
            anomalies: AnomalyDetector::new(config.anomaly_window_size, config.anomaly_z_threshold),
            consecutive_errors: DashMap::new(),
            window: Duration::from_secs(config.metrics_window_secs),
            thresholds: AlertThresholds::default(),
            anomaly_detection_enabled: config.anomaly_detection_enabled,
        }
    }

    /// Record a recovered or unrecovered error and update the derived
    /// per-provider consecutive-error counter and recovery pattern ranking.
    pub fn record_error(&self, input: ErrorEventInput) -> ErrorEvent {
        let component = input.component.clone();
        let strategy = input.strategy_used.clone();
        let recovered = input.recovery_successful;
        let error_type = input.error_type;

        let event = self.events.record(input);

        let counter = self
            .consecutive_errors
            .entry(component.clone())
            .or_insert_with(|| AtomicU32::new(0));
        if recovered {
            counter.store(0, Ordering::Relaxed);
        } else {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(strategy) = strategy {
            self.patterns.observe(error_type, &strategy, recovered);
        }

        event
    }

    /// Feed a raw numeric sample (e.g. handling time) into the anomaly
    /// detector for `target_id`/`metric`. A no-op returning `None` when
    /// anomaly detection is disabled in configuration.
    pub fn observe_metric(&self, target_id: &str, metric: &str, value: f64) -> Option<Anomaly> {
        if !self.anomaly_detection_enabled {
            return None;
        }
        self.anomalies.observe(target_id, metric, value)
    }

    fn consecutive_error_counts(&self) -> HashMap<String, u32> {
        self.consecutive_errors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Current rolling-window metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        metrics::snapshot(&self.events, self.window, &self.consecutive_error_counts())
    }

    /// Current overall/per-provider health report.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        health::compute(&self.metrics())
    }

    /// Alerts currently firing against the configured thresholds.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        let metrics = self.metrics();
        let health = health::compute(&metrics);
        alerts::evaluate(&metrics, health.status, &self.thresholds)
    }

    /// Best-ranked recovery strategies observed so far for `error_type`.
    #[must_use]
    pub fn recovery_patterns_for(&self, error_type: &str) -> Vec<RecoveryPattern> {
        self.patterns.ranked_for(error_type)
    }

    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_core::{Category, Severity};

    fn test_config() -> MonitoringConfig {
        MonitoringConfig::default()
    }

    #[test]
    fn recording_a_recovered_error_resets_the_consecutive_counter() {
        let monitoring = Monitoring::new(&test_config());
        monitoring.record_error(ErrorEventInput {
            error_type: "timeout",
            message: "boom".into(),
            severity: Severity::Medium,
            category: Category::Transient,
            module_id: "pipeline".into(),
            component: "openai".into(),
            context: serde_json::json!({}),
            recovery_attempted: true,
            recovery_successful: false,
            strategy_used: Some("retry".into()),
            handling_time_ms: 5,
        });
        monitoring.record_error(ErrorEventInput {
            error_type: "timeout",
            message: "boom".into(),
            severity: Severity::Medium,
            category: Category::Transient,
            module_id: "pipeline".into(),
            component: "openai".into(),
            context: serde_json::json!({}),
            recovery_attempted: true,
            recovery_successful: true,
            strategy_used: Some("retry".into()),
            handling_time_ms: 5,
        });

        let metrics = monitoring.metrics();
        let provider = metrics.providers.get("openai").expect("provider present");
        assert_eq!(provider.consecutive_errors, 0);
    }

    #[test]
    fn health_report_reflects_metrics() {
        let monitoring = Monitoring::new(&test_config());
        let report = monitoring.health();
        assert_eq!(report.status, HealthStatus::Healthy);
    }
}
