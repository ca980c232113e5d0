//! Health score computation (spec.md §4.9 "Health score (0-100)").

use serde::Serialize;

use crate::metrics::MetricsSnapshot;

/// Status bucket derived from a health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Healthy
        } else if score >= 50.0 {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }
}

/// Per-target/provider health score, 0-100.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub score: f64,
    pub status: HealthStatus,
}

/// Overall system health, returned by `Router::get_health()`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub score: f64,
    pub status: HealthStatus,
    pub providers: Vec<ProviderHealth>,
}

/// Deduction curve shared by the overall and per-provider formulas: a
/// fraction of `max_deduction` proportional to how far `value` sits past
/// `threshold`, saturating at `max_deduction`.
fn graduated_deduction(value: f64, threshold: f64, saturation: f64, max_deduction: f64) -> f64 {
    if value <= threshold {
        return 0.0;
    }
    let span = (saturation - threshold).max(f64::EPSILON);
    (((value - threshold) / span) * max_deduction).min(max_deduction)
}

fn deduction_for_error_volume(total_errors: u64) -> f64 {
    graduated_deduction(total_errors as f64, 5.0, 100.0, 30.0)
}

fn deduction_for_recovery_rate(recovery_rate: f64) -> f64 {
    graduated_deduction(1.0 - recovery_rate, 0.1, 1.0, 20.0)
}

fn deduction_for_handling_time(avg_ms: f64) -> f64 {
    graduated_deduction(avg_ms, 200.0, 5_000.0, 15.0)
}

fn provider_score(metrics: &crate::metrics::ProviderMetrics) -> f64 {
    let mut score = 100.0;
    score -= graduated_deduction(f64::from(metrics.consecutive_errors), 2.0, 20.0, 30.0);
    score -= deduction_for_recovery_rate(metrics.retry_success_rate);
    score.clamp(0.0, 100.0)
}

/// Geometric mean of a set of 0-100 scores; an empty set contributes
/// neutrally (100, i.e. no multiplicative penalty).
fn geometric_mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 100.0;
    }
    let product: f64 = scores.iter().map(|s| (s / 100.0).max(0.001)).product();
    100.0 * product.powf(1.0 / scores.len() as f64)
}

/// Compute the overall [`HealthReport`] from a metrics snapshot.
#[must_use]
pub fn compute(metrics: &MetricsSnapshot) -> HealthReport {
    let providers: Vec<ProviderHealth> = metrics
        .providers
        .iter()
        .map(|(id, m)| {
            let score = provider_score(m);
            ProviderHealth {
                provider_id: id.clone(),
                score,
                status: HealthStatus::from_score(score),
            }
        })
        .collect();

    let mut score = 100.0;
    score -= deduction_for_error_volume(metrics.total_errors);
    score -= deduction_for_recovery_rate(metrics.overall_recovery_rate);
    score -= deduction_for_handling_time(metrics.average_handling_time_ms);

    let geo_mean = geometric_mean(&providers.iter().map(|p| p.score).collect::<Vec<_>>());
    let score = (score * geo_mean / 100.0).clamp(0.0, 100.0);

    HealthReport {
        score,
        status: HealthStatus::from_score(score),
        providers,
    }
}
