//! Adaptive recovery pattern ranking (spec.md §4.9 "Adaptive recovery
//! patterns"): tracks which strategy tends to work for which error type,
//! updated via an exponentially-weighted moving average as outcomes arrive.

use dashmap::DashMap;
use serde::Serialize;

/// Running statistics for one (error_type, strategy) pair.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryPattern {
    pub error_type: String,
    pub strategy: String,
    pub success_rate: f64,
    pub confidence: f64,
    pub observations: u64,
}

impl RecoveryPattern {
    /// Confidence grows with observation count and saturates quickly;
    /// a pattern seen once is not trusted as much as one seen a dozen times.
    fn confidence_for(observations: u64) -> f64 {
        (observations as f64 / (observations as f64 + 5.0)).min(1.0)
    }
}

/// Tracks recovery patterns keyed by `(error_type, strategy)` and ranks
/// them by `confidence * success_rate` so the Strategy Manager can prefer
/// whichever strategy has historically worked best for a given error type.
pub struct PatternTracker {
    patterns: DashMap<(String, String), (f64, u64)>,
    learning_rate: f64,
}

impl Default for PatternTracker {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl PatternTracker {
    #[must_use]
    pub fn new(learning_rate: f64) -> Self {
        Self {
            patterns: DashMap::new(),
            learning_rate,
        }
    }

    /// Record the outcome (1.0 success, 0.0 failure) of applying `strategy`
    /// to recover from `error_type`.
    pub fn observe(&self, error_type: &str, strategy: &str, success: bool) {
        let outcome = if success { 1.0 } else { 0.0 };
        let key = (error_type.to_owned(), strategy.to_owned());
        let mut entry = self.patterns.entry(key).or_insert((0.5, 0));
        entry.0 += self.learning_rate * (outcome - entry.0);
        entry.1 += 1;
    }

    /// Patterns for a given error type, ranked best-first by
    /// `confidence * success_rate`.
    #[must_use]
    pub fn ranked_for(&self, error_type: &str) -> Vec<RecoveryPattern> {
        let mut out: Vec<RecoveryPattern> = self
            .patterns
            .iter()
            .filter(|entry| entry.key().0 == error_type)
            .map(|entry| {
                let (success_rate, observations) = *entry.value();
                let confidence = RecoveryPattern::confidence_for(observations);
                RecoveryPattern {
                    error_type: entry.key().0.clone(),
                    strategy: entry.key().1.clone(),
                    success_rate,
                    confidence,
                    observations,
                }
            })
            .collect();

        out.sort_by(|a, b| {
            let score_a = a.confidence * a.success_rate;
            let score_b = b.confidence * b.success_rate;
            score_b.total_cmp(&score_a)
        });
        out
    }

    /// All tracked patterns, unranked.
    #[must_use]
    pub fn all(&self) -> Vec<RecoveryPattern> {
        self.patterns
            .iter()
            .map(|entry| {
                let (success_rate, observations) = *entry.value();
                RecoveryPattern {
                    error_type: entry.key().0.clone(),
                    strategy: entry.key().1.clone(),
                    success_rate,
                    confidence: RecoveryPattern::confidence_for(observations),
                    observations,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successes_push_the_average_toward_one() {
        let tracker = PatternTracker::default();
        for _ in 0..20 {
            tracker.observe("timeout", "retry", true);
        }
        let ranked = tracker.ranked_for("timeout");
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].success_rate > 0.9);
        assert!(ranked[0].confidence > 0.8);
    }

    #[test]
    fn ranking_prefers_higher_confidence_times_success_rate() {
        let tracker = PatternTracker::default();
        for _ in 0..50 {
            tracker.observe("rate_limit", "retry", true);
        }
        tracker.observe("rate_limit", "fallback", true);
        let ranked = tracker.ranked_for("rate_limit");
        assert_eq!(ranked[0].strategy, "retry");
    }
}
