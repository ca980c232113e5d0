//! Load-balancing policies (spec.md §3 Target policy, §3 "priority" row):
//! pick among a virtual model's currently-eligible targets. Every policy
//! breaks ties by ascending target id so selection is deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use router_config::{LoadBalancingPolicy, Target};

use crate::target_state::TargetState;

/// One eligible candidate: its static config plus its live state. `state`
/// is `Arc`-owned rather than borrowed so candidates don't tie up a
/// `DashMap` guard's lifetime while the policy picks among them.
pub struct Candidate<'a> {
    pub target: &'a Target,
    pub state: Arc<TargetState>,
}

/// Per-virtual-model round-robin cursor.
#[derive(Default)]
pub struct RoundRobinCursor(AtomicU64);

impl RoundRobinCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.0.fetch_add(1, Ordering::Relaxed) as usize) % len
    }
}

fn sorted_by_id<'a>(mut candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
    candidates.sort_by(|a, b| a.target.id.cmp(&b.target.id));
    candidates
}

/// Select one candidate per `policy`. Returns `None` only when `candidates`
/// is empty; the Scheduler is responsible for that case (`NoHealthyTarget`).
#[must_use]
pub fn select<'a>(
    policy: LoadBalancingPolicy,
    candidates: Vec<Candidate<'a>>,
    round_robin: &RoundRobinCursor,
    health_threshold: f64,
) -> Option<&'a Target> {
    if candidates.is_empty() {
        return None;
    }
    let candidates = sorted_by_id(candidates);

    let chosen = match policy {
        LoadBalancingPolicy::RoundRobin => {
            let idx = round_robin.next(candidates.len());
            &candidates[idx]
        }
        LoadBalancingPolicy::Weighted => weighted_pick(&candidates),
        LoadBalancingPolicy::Priority => priority_pick(&candidates),
        LoadBalancingPolicy::LeastConnections => least_connections_pick(&candidates),
        LoadBalancingPolicy::HealthBased => health_based_pick(&candidates, health_threshold, round_robin),
        LoadBalancingPolicy::Random => random_pick(&candidates),
    };

    Some(chosen.target)
}

fn weighted_pick<'a, 'b>(candidates: &'b [Candidate<'a>]) -> &'b Candidate<'a> {
    let total_weight: u64 = candidates.iter().map(|c| u64::from(c.target.weight.max(1))).sum();
    let mut roll = rand::rng().random_range(0..total_weight.max(1));
    for candidate in candidates {
        let weight = u64::from(candidate.target.weight.max(1));
        if roll < weight {
            return candidate;
        }
        roll -= weight;
    }
    &candidates[0]
}

fn priority_pick<'a, 'b>(candidates: &'b [Candidate<'a>]) -> &'b Candidate<'a> {
    // Lowest priority value wins; ties already broken by ascending id
    // since `candidates` is pre-sorted by id.
    candidates
        .iter()
        .min_by_key(|c| c.target.priority)
        .expect("candidates non-empty")
}

fn least_connections_pick<'a, 'b>(candidates: &'b [Candidate<'a>]) -> &'b Candidate<'a> {
    candidates
        .iter()
        .min_by_key(|c| c.state.active_connections())
        .expect("candidates non-empty")
}

/// Highest health-score among targets at or above `health_threshold`;
/// falls back to round-robin across every candidate when none qualify
/// (spec.md §4.1 "health-based").
fn health_based_pick<'a, 'b>(
    candidates: &'b [Candidate<'a>],
    health_threshold: f64,
    round_robin: &RoundRobinCursor,
) -> &'b Candidate<'a> {
    let eligible: Vec<&Candidate<'a>> = candidates.iter().filter(|c| c.state.health_score() >= health_threshold).collect();

    if let Some(best) = eligible.into_iter().max_by(|a, b| a.state.health_score().total_cmp(&b.state.health_score())) {
        return best;
    }

    let idx = round_robin.next(candidates.len());
    &candidates[idx]
}

fn random_pick<'a, 'b>(candidates: &'b [Candidate<'a>]) -> &'b Candidate<'a> {
    let idx = rand::rng().random_range(0..candidates.len());
    &candidates[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_config::TargetStatus;

    const HEALTH_THRESHOLD: f64 = 50.0;

    fn target(id: &str, weight: u32, priority: u32) -> Target {
        Target {
            id: id.to_owned(),
            provider_id: "p".to_owned(),
            model_id: "m".to_owned(),
            weight,
            priority,
            status: TargetStatus::Active,
        }
    }

    #[test]
    fn round_robin_cycles_in_id_order() {
        let a = target("a", 1, 0);
        let b = target("b", 1, 0);
        let state_a = Arc::new(TargetState::default());
        let state_b = Arc::new(TargetState::default());
        let cursor = RoundRobinCursor::new();

        let candidates = || {
            vec![
                Candidate { target: &a, state: state_a.clone() },
                Candidate { target: &b, state: state_b.clone() },
            ]
        };

        let first = select(LoadBalancingPolicy::RoundRobin, candidates(), &cursor, HEALTH_THRESHOLD).unwrap();
        let second = select(LoadBalancingPolicy::RoundRobin, candidates(), &cursor, HEALTH_THRESHOLD).unwrap();
        let third = select(LoadBalancingPolicy::RoundRobin, candidates(), &cursor, HEALTH_THRESHOLD).unwrap();
        assert_eq!(first.id, "a");
        assert_eq!(second.id, "b");
        assert_eq!(third.id, "a");
    }

    #[test]
    fn priority_picks_lowest_value() {
        let a = target("a", 1, 5);
        let b = target("b", 1, 1);
        let state_a = Arc::new(TargetState::default());
        let state_b = Arc::new(TargetState::default());
        let cursor = RoundRobinCursor::new();
        let candidates = vec![
            Candidate { target: &a, state: state_a },
            Candidate { target: &b, state: state_b },
        ];
        let chosen = select(LoadBalancingPolicy::Priority, candidates, &cursor, HEALTH_THRESHOLD).unwrap();
        assert_eq!(chosen.id, "b");
    }

    #[test]
    fn least_connections_prefers_idle_target() {
        let a = target("a", 1, 0);
        let b = target("b", 1, 0);
        let state_a = Arc::new(TargetState::default());
        let state_b = Arc::new(TargetState::default());
        state_a.begin_request();
        state_a.begin_request();
        let cursor = RoundRobinCursor::new();
        let candidates = vec![
            Candidate { target: &a, state: state_a },
            Candidate { target: &b, state: state_b },
        ];
        let chosen = select(LoadBalancingPolicy::LeastConnections, candidates, &cursor, HEALTH_THRESHOLD).unwrap();
        assert_eq!(chosen.id, "b");
    }

    #[test]
    fn empty_candidates_returns_none() {
        let cursor = RoundRobinCursor::new();
        assert!(select(LoadBalancingPolicy::RoundRobin, vec![], &cursor, HEALTH_THRESHOLD).is_none());
    }

    #[test]
    fn health_based_prefers_highest_score_above_threshold() {
        let a = target("a", 1, 0);
        let b = target("b", 1, 0);
        let state_a = Arc::new(TargetState::default());
        let state_b = Arc::new(TargetState::default());
        state_a.record_failure(); // drags a's health score below b's
        let cursor = RoundRobinCursor::new();
        let candidates = vec![
            Candidate { target: &a, state: state_a },
            Candidate { target: &b, state: state_b },
        ];
        let chosen = select(LoadBalancingPolicy::HealthBased, candidates, &cursor, HEALTH_THRESHOLD).unwrap();
        assert_eq!(chosen.id, "b");
    }

    #[test]
    fn health_based_falls_back_to_round_robin_when_all_below_threshold() {
        let a = target("a", 1, 0);
        let b = target("b", 1, 0);
        let state_a = Arc::new(TargetState::default());
        let state_b = Arc::new(TargetState::default());
        // Both below the threshold, so neither qualifies directly.
        state_a.record_failure();
        state_b.record_failure();
        let cursor = RoundRobinCursor::new();
        let candidates = || {
            vec![
                Candidate { target: &a, state: state_a.clone() },
                Candidate { target: &b, state: state_b.clone() },
            ]
        };

        let first = select(LoadBalancingPolicy::HealthBased, candidates(), &cursor, HEALTH_THRESHOLD).unwrap();
        let second = select(LoadBalancingPolicy::HealthBased, candidates(), &cursor, HEALTH_THRESHOLD).unwrap();
        assert_eq!(first.id, "a");
        assert_eq!(second.id, "b");
    }
}
