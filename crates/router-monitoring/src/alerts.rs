//! Alert thresholds (spec.md §4.9 "Alerts"): fires when a tracked metric
//! crosses a configured threshold within the active window.

use serde::Serialize;

use crate::health::HealthStatus;
use crate::metrics::MetricsSnapshot;

/// The kind of condition an alert was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ErrorRate,
    ConsecutiveErrors,
    HandlingTime,
    HealthCheck,
    AnomalyDetection,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub component: String,
    pub message: String,
    pub observed: f64,
    pub threshold: f64,
}

/// Threshold configuration for alert evaluation; falls back to sane
/// defaults when a caller doesn't override a given field.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    pub error_rate_per_window: u64,
    pub consecutive_errors: u32,
    pub handling_time_ms: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            error_rate_per_window: 20,
            consecutive_errors: 5,
            handling_time_ms: 3_000.0,
        }
    }
}

/// Evaluate a metrics snapshot and health report against `thresholds`,
/// returning every breach found.
#[must_use]
pub fn evaluate(
    metrics: &MetricsSnapshot,
    health_status: HealthStatus,
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if metrics.total_errors > thresholds.error_rate_per_window {
        alerts.push(Alert {
            alert_type: AlertType::ErrorRate,
            component: "overall".to_owned(),
            message: format!(
                "error rate {} exceeds threshold {} for the current window",
                metrics.total_errors, thresholds.error_rate_per_window
            ),
            observed: metrics.total_errors as f64,
            threshold: thresholds.error_rate_per_window as f64,
        });
    }

    if metrics.average_handling_time_ms > thresholds.handling_time_ms {
        alerts.push(Alert {
            alert_type: AlertType::HandlingTime,
            component: "overall".to_owned(),
            message: format!(
                "average handling time {:.0}ms exceeds threshold {:.0}ms",
                metrics.average_handling_time_ms, thresholds.handling_time_ms
            ),
            observed: metrics.average_handling_time_ms,
            threshold: thresholds.handling_time_ms,
        });
    }

    for (provider, provider_metrics) in &metrics.providers {
        if provider_metrics.consecutive_errors >= thresholds.consecutive_errors {
            alerts.push(Alert {
                alert_type: AlertType::ConsecutiveErrors,
                component: provider.clone(),
                message: format!(
                    "{} consecutive errors on provider {provider} meet threshold {}",
                    provider_metrics.consecutive_errors, thresholds.consecutive_errors
                ),
                observed: f64::from(provider_metrics.consecutive_errors),
                threshold: f64::from(thresholds.consecutive_errors),
            });
        }
    }

    if health_status == HealthStatus::Unhealthy {
        alerts.push(Alert {
            alert_type: AlertType::HealthCheck,
            component: "overall".to_owned(),
            message: "overall health status is unhealthy".to_owned(),
            observed: 0.0,
            threshold: 0.0,
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn error_rate_above_threshold_fires() {
        let snapshot = MetricsSnapshot {
            total_errors: 25,
            ..Default::default()
        };
        let alerts = evaluate(&snapshot, HealthStatus::Healthy, &AlertThresholds::default());
        assert!(alerts.iter().any(|a| a.alert_type == AlertType::ErrorRate));
    }

    #[test]
    fn consecutive_errors_per_provider_fires() {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_owned(),
            crate::metrics::ProviderMetrics {
                consecutive_errors: 9,
                ..Default::default()
            },
        );
        let snapshot = MetricsSnapshot {
            providers,
            ..Default::default()
        };
        let alerts = evaluate(&snapshot, HealthStatus::Healthy, &AlertThresholds::default());
        assert!(alerts.iter().any(|a| a.alert_type == AlertType::ConsecutiveErrors));
    }

    #[test]
    fn quiet_window_raises_nothing() {
        let snapshot = MetricsSnapshot::default();
        let alerts = evaluate(&snapshot, HealthStatus::Healthy, &AlertThresholds::default());
        assert!(alerts.is_empty());
    }
}
