//! Snapshot serializers (spec.md §4.9 "Export formats"): JSON, CSV, and
//! Prometheus text exposition for a [`MetricsSnapshot`].

use std::fmt::Write as _;

use crate::metrics::MetricsSnapshot;

/// Serialize as pretty JSON. Infallible for our own types; `serde_json`
/// only fails on non-finite floats or cyclic structures, neither of which
/// this type can produce.
#[must_use]
pub fn to_json(snapshot: &MetricsSnapshot) -> String {
    serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_owned())
}

/// Flatten the snapshot into a CSV with one row per provider.
#[must_use]
pub fn to_csv(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "provider,total_errors,consecutive_errors,retry_success_rate,fallback_usage_count"
    );
    let mut providers: Vec<_> = snapshot.providers.iter().collect();
    providers.sort_by(|a, b| a.0.cmp(b.0));
    for (provider, metrics) in providers {
        let _ = writeln!(
            out,
            "{provider},{},{},{:.4},{}",
            metrics.total_errors, metrics.consecutive_errors, metrics.retry_success_rate, metrics.fallback_usage_count
        );
    }
    out
}

/// Render as Prometheus text exposition format.
#[must_use]
pub fn to_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# HELP router_errors_total Total errors observed in the current window");
    let _ = writeln!(out, "# TYPE router_errors_total counter");
    let _ = writeln!(out, "router_errors_total {}", snapshot.total_errors);

    let _ = writeln!(out, "# HELP router_recovery_rate Fraction of errors recovered from");
    let _ = writeln!(out, "# TYPE router_recovery_rate gauge");
    let _ = writeln!(out, "router_recovery_rate {}", snapshot.overall_recovery_rate);

    let _ = writeln!(out, "# HELP router_avg_handling_time_ms Average error handling time in milliseconds");
    let _ = writeln!(out, "# TYPE router_avg_handling_time_ms gauge");
    let _ = writeln!(out, "router_avg_handling_time_ms {}", snapshot.average_handling_time_ms);

    let _ = writeln!(out, "# HELP router_dropped_events_total Error events evicted from the log before being read");
    let _ = writeln!(out, "# TYPE router_dropped_events_total counter");
    let _ = writeln!(out, "router_dropped_events_total {}", snapshot.dropped_events);

    let _ = writeln!(out, "# HELP router_provider_consecutive_errors Current consecutive error streak per provider");
    let _ = writeln!(out, "# TYPE router_provider_consecutive_errors gauge");
    let mut providers: Vec<_> = snapshot.providers.iter().collect();
    providers.sort_by(|a, b| a.0.cmp(b.0));
    for (provider, metrics) in &providers {
        let _ = writeln!(
            out,
            "router_provider_consecutive_errors{{provider=\"{provider}\"}} {}",
            metrics.consecutive_errors
        );
    }

    let _ = writeln!(out, "# HELP router_provider_retry_success_rate Retry success rate per provider");
    let _ = writeln!(out, "# TYPE router_provider_retry_success_rate gauge");
    for (provider, metrics) in &providers {
        let _ = writeln!(
            out,
            "router_provider_retry_success_rate{{provider=\"{provider}\"}} {}",
            metrics.retry_success_rate
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_total_errors() {
        let snapshot = MetricsSnapshot {
            total_errors: 7,
            ..Default::default()
        };
        let json = to_json(&snapshot);
        assert!(json.contains("\"total_errors\": 7"));
    }

    #[test]
    fn csv_has_header_and_one_row_per_provider() {
        let mut providers = std::collections::HashMap::new();
        providers.insert("openai".to_owned(), crate::metrics::ProviderMetrics::default());
        let snapshot = MetricsSnapshot {
            providers,
            ..Default::default()
        };
        let csv = to_csv(&snapshot);
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("provider,"));
    }

    #[test]
    fn prometheus_includes_counter_and_gauge_types() {
        let snapshot = MetricsSnapshot::default();
        let text = to_prometheus(&snapshot);
        assert!(text.contains("# TYPE router_errors_total counter"));
        assert!(text.contains("# TYPE router_recovery_rate gauge"));
    }
}
