//! Per-DID vector clocks for detecting concurrent card updates.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock(BTreeMap<String, u64>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    Before,
    After,
    Equal,
    Concurrent,
}

impl VectorClock {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn increment(&mut self, actor: &str) {
        *self.0.entry(actor.to_string()).or_insert(0) += 1;
    }

    /// Total order tiebreaker for concurrent updates: the sum of all
    /// component counters. Not causally meaningful on its own, only used
    /// to pick a deterministic winner once `compare` returns `Concurrent`.
    pub fn version(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn merge(&mut self, other: &VectorClock) {
        for (actor, &count) in &other.0 {
            let entry = self.0.entry(actor.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
    }

    pub fn compare(&self, other: &VectorClock) -> CausalOrder {
        let mut self_ahead = false;
        let mut other_ahead = false;

        let actors: std::collections::BTreeSet<&String> =
            self.0.keys().chain(other.0.keys()).collect();
        for actor in actors {
            let a = self.0.get(actor).copied().unwrap_or(0);
            let b = other.0.get(actor).copied().unwrap_or(0);
            match a.cmp(&b) {
                CmpOrdering::Greater => self_ahead = true,
                CmpOrdering::Less => other_ahead = true,
                CmpOrdering::Equal => {}
            }
        }

        match (self_ahead, other_ahead) {
            (false, false) => CausalOrder::Equal,
            (true, false) => CausalOrder::After,
            (false, true) => CausalOrder::Before,
            (true, true) => CausalOrder::Concurrent,
        }
    }

    pub fn happens_before(&self, other: &VectorClock) -> bool {
        matches!(self.compare(other), CausalOrder::Before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_actor_increments_are_ordered() {
        let mut a = VectorClock::new();
        a.increment("node-1");
        let mut b = a.clone();
        b.increment("node-1");
        assert!(a.happens_before(&b));
        assert_eq!(b.compare(&a), CausalOrder::After);
    }

    #[test]
    fn disjoint_actors_are_concurrent() {
        let mut a = VectorClock::new();
        a.increment("node-1");
        let mut b = VectorClock::new();
        b.increment("node-2");
        assert_eq!(a.compare(&b), CausalOrder::Concurrent);
    }

    #[test]
    fn merge_takes_componentwise_max() {
        let mut a = VectorClock::new();
        a.increment("node-1");
        let mut b = VectorClock::new();
        b.increment("node-2");
        b.increment("node-2");

        a.merge(&b);
        assert_eq!(a.version(), 3);
    }

    #[test]
    fn identical_clocks_are_equal() {
        let mut a = VectorClock::new();
        a.increment("node-1");
        let b = a.clone();
        assert_eq!(a.compare(&b), CausalOrder::Equal);
    }
}
