use serde::Deserialize;

/// Thresholds consumed by the Monitoring & Health subsystem (spec.md §4.9)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    /// Maximum number of error events retained
    #[serde(default = "default_event_retention_count")]
    pub event_retention_count: usize,
    /// Maximum age of a retained error event, in seconds
    #[serde(default = "default_event_retention_secs")]
    pub event_retention_secs: u64,
    /// Capacity of the bounded monitoring event queue
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    /// Rolling window over which metrics are aggregated, in seconds
    #[serde(default = "default_metrics_window_secs")]
    pub metrics_window_secs: u64,
    /// Minimum confidence an adaptive recovery pattern must have to be
    /// suggested
    #[serde(default = "default_min_confidence_threshold")]
    pub min_confidence_threshold: f64,
    /// Learning rate for the EWMA update of a pattern's success rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Z-score above which a (target, metric) sample is flagged anomalous
    #[serde(default = "default_anomaly_z_threshold")]
    pub anomaly_z_threshold: f64,
    /// Whether anomaly detection runs at all (optional per spec.md §4.9)
    #[serde(default)]
    pub anomaly_detection_enabled: bool,
    /// Rolling sample window size used for anomaly detection
    #[serde(default = "default_anomaly_window_size")]
    pub anomaly_window_size: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            event_retention_count: default_event_retention_count(),
            event_retention_secs: default_event_retention_secs(),
            event_queue_capacity: default_event_queue_capacity(),
            metrics_window_secs: default_metrics_window_secs(),
            min_confidence_threshold: default_min_confidence_threshold(),
            learning_rate: default_learning_rate(),
            anomaly_z_threshold: default_anomaly_z_threshold(),
            anomaly_detection_enabled: false,
            anomaly_window_size: default_anomaly_window_size(),
        }
    }
}

const fn default_event_retention_count() -> usize {
    10_000
}
const fn default_event_retention_secs() -> u64 {
    24 * 60 * 60
}
const fn default_event_queue_capacity() -> usize {
    4_096
}
const fn default_metrics_window_secs() -> u64 {
    300
}
const fn default_min_confidence_threshold() -> f64 {
    0.6
}
const fn default_learning_rate() -> f64 {
    0.2
}
const fn default_anomaly_z_threshold() -> f64 {
    2.5
}
const fn default_anomaly_window_size() -> usize {
    100
}
