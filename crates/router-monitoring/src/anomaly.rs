//! Z-score anomaly detection (spec.md §4.9 "Anomaly detection, optional"):
//! flags a metric sample that deviates more than a configured number of
//! standard deviations from its own rolling window.

use std::collections::VecDeque;

use dashmap::DashMap;
use serde::Serialize;

const DEFAULT_WINDOW: usize = 50;
const DEFAULT_Z_THRESHOLD: f64 = 2.5;

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub target_id: String,
    pub metric: String,
    pub value: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub z_score: f64,
}

struct Window {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn mean_std(&self) -> (f64, f64) {
        let n = self.samples.len() as f64;
        if n == 0.0 {
            return (0.0, 0.0);
        }
        let mean = self.samples.iter().sum::<f64>() / n;
        let variance = self.samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }

    fn push(&mut self, value: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }
}

/// Per-`(target, metric)` rolling Z-score detector.
pub struct AnomalyDetector {
    windows: DashMap<(String, String), Window>,
    window_size: usize,
    z_threshold: f64,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_Z_THRESHOLD)
    }
}

impl AnomalyDetector {
    #[must_use]
    pub fn new(window_size: usize, z_threshold: f64) -> Self {
        Self {
            windows: DashMap::new(),
            window_size,
            z_threshold,
        }
    }

    /// Feed a new sample for `target_id`/`metric`, returning an [`Anomaly`]
    /// if this sample deviates beyond the configured threshold from the
    /// window observed so far. The sample is always recorded afterward.
    pub fn observe(&self, target_id: &str, metric: &str, value: f64) -> Option<Anomaly> {
        let key = (target_id.to_owned(), metric.to_owned());
        let mut window = self.windows.entry(key).or_insert_with(|| Window::new(self.window_size));

        let anomaly = if window.samples.len() >= 10 {
            let (mean, std_dev) = window.mean_std();
            if std_dev > f64::EPSILON {
                let z_score = (value - mean) / std_dev;
                (z_score.abs() > self.z_threshold).then(|| Anomaly {
                    target_id: target_id.to_owned(),
                    metric: metric.to_owned(),
                    value,
                    mean,
                    std_dev,
                    z_score,
                })
            } else {
                // A perfectly flat window has no variance to divide by; any
                // real deviation from that flat value is still an anomaly.
                let deviation = (value - mean).abs();
                (deviation > mean.abs().max(1.0) * 0.01).then(|| Anomaly {
                    target_id: target_id.to_owned(),
                    metric: metric.to_owned(),
                    value,
                    mean,
                    std_dev,
                    z_score: if deviation > 0.0 { f64::INFINITY * deviation.signum() } else { 0.0 },
                })
            }
        } else {
            None
        };

        window.push(value);
        anomaly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_samples_raise_nothing() {
        let detector = AnomalyDetector::default();
        for _ in 0..20 {
            assert!(detector.observe("t1", "handling_time_ms", 100.0).is_none());
        }
    }

    #[test]
    fn sharp_spike_is_flagged() {
        let detector = AnomalyDetector::default();
        for _ in 0..20 {
            detector.observe("t1", "handling_time_ms", 100.0);
        }
        let anomaly = detector.observe("t1", "handling_time_ms", 10_000.0);
        assert!(anomaly.is_some());
    }
}
