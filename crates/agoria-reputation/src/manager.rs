use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::outcome::ExecutionOutcome;
use crate::score::{ReputationConfig, ReputationScore};

/// Registry of per-peer reputation state, keyed by the peer's DID string.
/// Mirrors the Q-table's reader/many-writer shared-resource policy.
pub struct ReputationManager {
    config: ReputationConfig,
    table: RwLock<HashMap<String, ReputationScore>>,
}

impl ReputationManager {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            config,
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, peer: &str, outcome: ExecutionOutcome, now: DateTime<Utc>) {
        let mut table = self.table.write();
        let entry = table
            .entry(peer.to_string())
            .or_insert_with(|| ReputationScore::new(now, self.config.outcome_ring_capacity));
        entry.record(outcome, now);
        entry.refresh_blacklist(now, &self.config);
    }

    pub fn score_of(&self, peer: &str, now: DateTime<Utc>) -> f64 {
        self.table
            .read()
            .get(peer)
            .map(|s| s.score(now, &self.config))
            .unwrap_or(crate::score::DEFAULT_NEUTRAL_SCORE)
    }

    pub fn is_blacklisted(&self, peer: &str, now: DateTime<Utc>) -> bool {
        let mut table = self.table.write();
        table
            .get_mut(peer)
            .map(|s| s.is_blacklisted(now))
            .unwrap_or(false)
    }

    /// Periodic sweep: clear any blacklist windows that have expired. Lazy
    /// checks on `is_blacklisted` already self-heal, this is for callers
    /// who want an eager pass (e.g. a maintenance tick) over the full table.
    pub fn cleanup_expired_blacklist(&self, now: DateTime<Utc>) {
        let mut table = self.table.write();
        for score in table.values_mut() {
            score.is_blacklisted(now);
        }
    }

    /// Eligible peers (non-blacklisted, at least `min_tasks` samples) sorted
    /// by score descending; at equal score, peers whose state is stale
    /// (not updated within the configured staleness window) sort after
    /// fresh ones.
    pub fn top_peers(&self, n: usize, min_tasks: u64, now: DateTime<Utc>) -> Vec<(String, f64)> {
        let mut table = self.table.write();
        let mut ranked: Vec<(String, f64, bool)> = table
            .iter_mut()
            .filter_map(|(peer, s)| {
                if !s.is_blacklisted(now) && s.sample_count() >= min_tasks {
                    let score = s.score(now, &self.config);
                    let stale = s.is_stale(now, self.config.staleness_window);
                    Some((peer.clone(), score, stale))
                } else {
                    None
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        ranked.truncate(n);
        ranked.into_iter().map(|(peer, score, _)| (peer, score)).collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_core::did::DidType;
    use agoria_core::ids::TaskId;
    use agoria_core::Did;

    fn outcome(success: bool, now: DateTime<Utc>) -> ExecutionOutcome {
        ExecutionOutcome {
            task_id: TaskId::new(),
            executor_id: Did::new("agoria", DidType::Agent, "exec"),
            success,
            duration: std::time::Duration::from_secs(1),
            cost: 10,
            timestamp: now,
            exit_code: Some(0),
            error: None,
            memory_used: None,
        }
    }

    #[test]
    fn unknown_peer_is_neutral_and_not_blacklisted() {
        let manager = ReputationManager::new(ReputationConfig::default());
        let now = Utc::now();
        assert_eq!(manager.score_of("peer-a", now), crate::score::DEFAULT_NEUTRAL_SCORE);
        assert!(!manager.is_blacklisted("peer-a", now));
    }

    #[test]
    fn top_peers_excludes_blacklisted_and_under_sampled() {
        let manager = ReputationManager::new(ReputationConfig::default());
        let now = Utc::now();
        for _ in 0..10 {
            manager.record("peer-good", outcome(true, now), now);
        }
        for _ in 0..10 {
            manager.record("peer-bad", outcome(false, now), now);
        }
        manager.record("peer-new", outcome(true, now), now);

        let top = manager.top_peers(10, 5, now);
        let peers: Vec<&str> = top.iter().map(|(p, _)| p.as_str()).collect();
        assert!(peers.contains(&"peer-good"));
        assert!(!peers.contains(&"peer-bad"));
        assert!(!peers.contains(&"peer-new"));
    }

    #[test]
    fn top_peers_respects_n_limit() {
        let manager = ReputationManager::new(ReputationConfig::default());
        let now = Utc::now();
        for peer in ["a", "b", "c"] {
            for _ in 0..5 {
                manager.record(peer, outcome(true, now), now);
            }
        }
        assert_eq!(manager.top_peers(2, 5, now).len(), 2);
    }
}
