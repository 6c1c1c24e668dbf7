//! The peer routing table: tracks a `QValue` per peer and selects among
//! candidates with epsilon-greedy exploration so the system doesn't get
//! stuck always routing to the historically best peer once conditions
//! change.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;

use crate::qvalue::{QValue, ScoreWeights, DEFAULT_ALPHA};

pub const DEFAULT_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub alpha: f64,
    pub epsilon: f64,
    pub weights: ScoreWeights,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            epsilon: DEFAULT_EPSILON,
            weights: ScoreWeights::default(),
        }
    }
}

#[derive(Default)]
pub struct QRouter {
    config: RouterConfig,
    table: RwLock<HashMap<String, QValue>>,
}

impl QRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, peer: &str, latency_ms: f64, success: bool, bandwidth_bps: f64, now: DateTime<Utc>) {
        let mut table = self.table.write();
        let entry = table.entry(peer.to_string()).or_insert_with(|| QValue::new(now));
        entry.update(latency_ms, success, bandwidth_bps, now, self.config.alpha);
    }

    /// Peers ranked by Q-score, best first. Ties break by most-recently-seen.
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let table = self.table.read();
        let mut list: Vec<(String, f64, DateTime<Utc>)> = table
            .iter()
            .map(|(peer, q)| (peer.clone(), q.q_score(self.config.weights), q.last_seen))
            .collect();
        list.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.2.cmp(&a.2))
        });
        list.into_iter().map(|(peer, score, _)| (peer, score)).collect()
    }

    /// Epsilon-greedy selection: with probability `epsilon`, pick uniformly
    /// at random among known peers; otherwise pick the top-ranked peer.
    pub fn select(&self) -> Option<String> {
        let ranked = self.ranked();
        if ranked.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.config.epsilon) {
            let idx = rng.gen_range(0..ranked.len());
            Some(ranked[idx].0.clone())
        } else {
            Some(ranked[0].0.clone())
        }
    }

    /// Drop entries not seen within `max_age`.
    pub fn prune_stale(&self, max_age: chrono::Duration, now: DateTime<Utc>) {
        self.table.write().retain(|_, q| now - q.last_seen <= max_age);
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn select_on_empty_router_is_none() {
        let router = QRouter::new(RouterConfig::default());
        assert!(router.select().is_none());
    }

    #[test]
    fn ranked_prefers_higher_q_score() {
        let router = QRouter::new(RouterConfig::default());
        let now = Utc::now();
        router.record("fast-peer", 20.0, true, 5_000_000.0, now);
        router.record("slow-peer", 1900.0, false, 100.0, now);

        let ranked = router.ranked();
        assert_eq!(ranked[0].0, "fast-peer");
    }

    #[test]
    fn prune_stale_removes_old_entries() {
        let router = QRouter::new(RouterConfig::default());
        let old_time = Utc::now() - Duration::hours(2);
        router.record("stale-peer", 50.0, true, 1_000_000.0, old_time);

        router.prune_stale(Duration::minutes(30), Utc::now());
        assert!(router.is_empty());
    }

    #[test]
    fn epsilon_zero_always_picks_best() {
        let config = RouterConfig {
            epsilon: 0.0,
            ..RouterConfig::default()
        };
        let router = QRouter::new(config);
        let now = Utc::now();
        router.record("fast-peer", 20.0, true, 5_000_000.0, now);
        router.record("slow-peer", 1900.0, false, 100.0, now);

        for _ in 0..20 {
            assert_eq!(router.select().unwrap(), "fast-peer");
        }
    }
}
