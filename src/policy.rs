//! Least-utilized deployment selection
//!
//! Pure selection over a candidate list and a utilization snapshot. No
//! cache access, no I/O, no side effects; logging the decision is the
//! caller's job.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cache::ScoreSnapshot;

/// Score assumed for a deployment the authority did not report. Neutral:
/// neither preferred nor penalized.
pub const DEFAULT_SCORE: f64 = 0.5;

/// One deployment the host router considers for a request. Owned by the
/// host; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentCandidate {
    pub chute_id: String,
    /// Host-configured static priority; lower wins ties. Candidates without
    /// one rank after any explicit priority.
    #[serde(default)]
    pub priority: Option<u32>,
}

impl DeploymentCandidate {
    pub fn new(chute_id: impl Into<String>) -> Self {
        Self {
            chute_id: chute_id.into(),
            priority: None,
        }
    }

    pub fn with_priority(chute_id: impl Into<String>, priority: u32) -> Self {
        Self {
            chute_id: chute_id.into(),
            priority: Some(priority),
        }
    }

    fn tie_rank(&self) -> u32 {
        self.priority.unwrap_or(u32::MAX)
    }
}

/// The sole value crossing the public boundary. `Deferred` is an expected
/// outcome (no data ever obtained), not a defect; the host applies its own
/// default policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SelectionDecision {
    Chosen {
        chute_id: String,
        utilization: f64,
        /// True when the decision was made from a stale snapshot
        degraded: bool,
    },
    Deferred,
}

impl SelectionDecision {
    pub fn chute_id(&self) -> Option<&str> {
        match self {
            SelectionDecision::Chosen { chute_id, .. } => Some(chute_id),
            SelectionDecision::Deferred => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, SelectionDecision::Deferred)
    }
}

/// Picks the candidate with the minimum utilization score.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastUtilizedPolicy;

impl LeastUtilizedPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &'static str {
        "least_utilized"
    }

    /// Select among `candidates` given the current snapshot.
    ///
    /// Deterministic: minimum score wins, ties break by configured priority,
    /// then by input order. A stale snapshot still selects, marked
    /// `degraded`; only total absence of data defers.
    pub fn select(
        &self,
        candidates: &[DeploymentCandidate],
        snapshot: Option<&ScoreSnapshot>,
        fresh: bool,
    ) -> SelectionDecision {
        let Some(snapshot) = snapshot else {
            return SelectionDecision::Deferred;
        };

        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let score = snapshot
                .score(&candidate.chute_id)
                .unwrap_or(DEFAULT_SCORE);
            let better = match best {
                None => true,
                Some((best_idx, best_score)) => match score.total_cmp(&best_score) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    // Equal ranks keep the earlier candidate (input order).
                    Ordering::Equal => candidate.tie_rank() < candidates[best_idx].tie_rank(),
                },
            };
            if better {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, utilization)) => SelectionDecision::Chosen {
                chute_id: candidates[idx].chute_id.clone(),
                utilization,
                degraded: !fresh,
            },
            None => SelectionDecision::Deferred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Instant;

    fn snapshot(entries: &[(&str, f64)]) -> ScoreSnapshot {
        let scores = entries
            .iter()
            .map(|(id, score)| (id.to_string(), *score))
            .collect::<HashMap<_, _>>();
        ScoreSnapshot::new(scores, Instant::now())
    }

    fn candidates(ids: &[&str]) -> Vec<DeploymentCandidate> {
        ids.iter().map(|id| DeploymentCandidate::new(*id)).collect()
    }

    #[test]
    fn test_selects_minimum_score() {
        let policy = LeastUtilizedPolicy::new();
        let snap = snapshot(&[("a", 0.8), ("b", 0.3), ("c", 0.7)]);

        let decision = policy.select(&candidates(&["a", "b", "c"]), Some(&snap), true);
        assert_eq!(decision.chute_id(), Some("b"));
    }

    #[test]
    fn test_tie_breaks_by_input_order() {
        let policy = LeastUtilizedPolicy::new();
        let snap = snapshot(&[("a", 0.8), ("b", 0.3), ("c", 0.3)]);

        // b and c tie on score and priority; b comes first.
        let decision = policy.select(&candidates(&["a", "b", "c"]), Some(&snap), true);
        assert_eq!(decision.chute_id(), Some("b"));
    }

    #[test]
    fn test_tie_breaks_by_priority_before_input_order() {
        let policy = LeastUtilizedPolicy::new();
        let snap = snapshot(&[("b", 0.3), ("c", 0.3)]);
        let cands = vec![
            DeploymentCandidate::with_priority("b", 2),
            DeploymentCandidate::with_priority("c", 1),
        ];

        let decision = policy.select(&cands, Some(&snap), true);
        assert_eq!(decision.chute_id(), Some("c"));
    }

    #[test]
    fn test_explicit_priority_beats_absent_priority() {
        let policy = LeastUtilizedPolicy::new();
        let snap = snapshot(&[("b", 0.3), ("c", 0.3)]);
        let cands = vec![
            DeploymentCandidate::new("b"),
            DeploymentCandidate::with_priority("c", 7),
        ];

        let decision = policy.select(&cands, Some(&snap), true);
        assert_eq!(decision.chute_id(), Some("c"));
    }

    #[test]
    fn test_missing_candidate_gets_default_score() {
        let policy = LeastUtilizedPolicy::new();
        let snap = snapshot(&[("a", 0.6)]);

        // b is absent from the snapshot: default 0.5 beats a's 0.6.
        let decision = policy.select(&candidates(&["a", "b"]), Some(&snap), true);
        assert_eq!(decision.chute_id(), Some("b"));

        // With a below the default, a wins.
        let snap = snapshot(&[("a", 0.4)]);
        let decision = policy.select(&candidates(&["a", "b"]), Some(&snap), true);
        assert_eq!(decision.chute_id(), Some("a"));
    }

    #[test]
    fn test_absent_snapshot_defers() {
        let policy = LeastUtilizedPolicy::new();
        let decision = policy.select(&candidates(&["a", "b"]), None, false);
        assert_eq!(decision, SelectionDecision::Deferred);
    }

    #[test]
    fn test_stale_snapshot_selects_degraded() {
        let policy = LeastUtilizedPolicy::new();
        let snap = snapshot(&[("a", 0.2), ("b", 0.9)]);

        let decision = policy.select(&candidates(&["a", "b"]), Some(&snap), false);
        match decision {
            SelectionDecision::Chosen {
                chute_id, degraded, ..
            } => {
                assert_eq!(chute_id, "a");
                assert!(degraded);
            }
            SelectionDecision::Deferred => panic!("staleness alone must never defer"),
        }
    }

    #[test]
    fn test_selection_is_reproducible() {
        let policy = LeastUtilizedPolicy::new();
        let snap = snapshot(&[("a", 0.5), ("b", 0.5), ("c", 0.5)]);
        let cands = candidates(&["a", "b", "c"]);

        let first = policy.select(&cands, Some(&snap), true);
        for _ in 0..20 {
            assert_eq!(policy.select(&cands, Some(&snap), true), first);
        }
    }
}
