//! Tracks peers that have served content failing hash verification.
//! A peer crossing the strike threshold is excluded from future resolves.

use std::collections::HashMap;

use libp2p::PeerId;
use parking_lot::RwLock;

const DEFAULT_STRIKE_THRESHOLD: u32 = 3;

pub struct PeerBlacklist {
    strikes: RwLock<HashMap<PeerId, u32>>,
    blacklisted: RwLock<std::collections::HashSet<PeerId>>,
    threshold: u32,
}

impl Default for PeerBlacklist {
    fn default() -> Self {
        Self::new(DEFAULT_STRIKE_THRESHOLD)
    }
}

impl PeerBlacklist {
    pub fn new(threshold: u32) -> Self {
        Self {
            strikes: RwLock::new(HashMap::new()),
            blacklisted: RwLock::new(std::collections::HashSet::new()),
            threshold,
        }
    }

    /// Record a failed content verification from `peer`. Returns `true` if
    /// this strike pushed the peer over the threshold.
    pub fn record_failure(&self, peer: PeerId) -> bool {
        let mut strikes = self.strikes.write();
        let count = strikes.entry(peer).or_insert(0);
        *count += 1;
        if *count >= self.threshold {
            self.blacklisted.write().insert(peer);
            true
        } else {
            false
        }
    }

    pub fn is_blacklisted(&self, peer: &PeerId) -> bool {
        self.blacklisted.read().contains(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_is_blacklisted_after_threshold_strikes() {
        let list = PeerBlacklist::new(2);
        let peer = PeerId::random();
        assert!(!list.record_failure(peer));
        assert!(!list.is_blacklisted(&peer));
        assert!(list.record_failure(peer));
        assert!(list.is_blacklisted(&peer));
    }

    #[test]
    fn unrelated_peer_unaffected() {
        let list = PeerBlacklist::new(1);
        let peer_a = PeerId::random();
        let peer_b = PeerId::random();
        list.record_failure(peer_a);
        assert!(list.is_blacklisted(&peer_a));
        assert!(!list.is_blacklisted(&peer_b));
    }
}
