//! Card Store: a per-DID, vector-clock-ordered, hash-chained history of
//! every `AgentCard` update for every agent, with last-writer-wins conflict
//! resolution for updates that arrive concurrently from different peers.
//!
//! Every accepted update is appended to its subject's `UpdateHistory`
//! rather than overwriting a single current pointer, so the full causal
//! chain — including conflict losers — survives and can be audited. Only a
//! `latest` index moves in response to `decide_merge`'s verdict.
//!
//! Two backends share the same merge logic: an in-memory store for tests
//! and single-process use, and a sled-backed store for durable nodes —
//! grounded on the same named-tree, bincode-per-record shape used
//! throughout this workspace's persistence layer.

use std::collections::HashMap;
use std::path::Path;

use agoria_core::canonical::to_canonical_bytes;
use agoria_core::{AgoriaError, Did};
use agoria_crypto::sha256_tagged;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::card::AgentCard;
use crate::clock::{CausalOrder, VectorClock};

/// A single entry in a subject's append-only update history. `prev_hash`
/// chains to the tagged content hash of the previous entry in that
/// subject's history (`None` for the first entry), so the full chain can be
/// replayed and verified independently of the vector clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardUpdate {
    pub card: AgentCard,
    pub clock: VectorClock,
    pub prev_hash: Option<String>,
    pub updater_id: String,
    pub timestamp: DateTime<Utc>,
}

impl CardUpdate {
    /// Tagged `sha256:<hex>` hash of this update's canonical form, used as
    /// the next entry's `prev_hash`.
    pub fn content_hash(&self) -> Result<String, AgoriaError> {
        let bytes = to_canonical_bytes(self)?;
        Ok(sha256_tagged(&bytes))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Entry {
    /// Append-only; every accepted update (winners and conflict losers
    /// alike) is pushed here and never removed or overwritten.
    history: Vec<CardUpdate>,
    /// Index into `history` of the update currently designated latest.
    latest: usize,
}

impl Entry {
    fn latest_update(&self) -> &CardUpdate {
        &self.history[self.latest]
    }

    fn conflicts(&self) -> impl Iterator<Item = &CardUpdate> {
        self.history
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.latest)
            .map(|(_, u)| u)
    }
}

#[derive(Debug, Clone)]
pub struct ConflictRecord {
    pub subject: Did,
    pub winner: AgentCard,
    pub losers: Vec<AgentCard>,
}

pub trait CardStore: Send + Sync {
    /// Apply an incoming update. Returns `Ok(true)` if it became (or
    /// remains) the latest record for its subject, `Ok(false)` if it was a
    /// no-op (duplicate or causally equal) or lost an LWW tiebreak against
    /// the current latest, or an error if it is strictly older than what is
    /// already known.
    fn apply_update(
        &self,
        card: AgentCard,
        clock: VectorClock,
        updater_id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, AgoriaError>;

    fn get_latest(&self, subject: &Did) -> Result<Option<AgentCard>, AgoriaError>;

    /// The full causal history for a subject, in arrival order.
    fn history(&self, subject: &Did) -> Result<Vec<CardUpdate>, AgoriaError>;

    fn list_conflicts(&self) -> Result<Vec<ConflictRecord>, AgoriaError>;

    fn has_conflicts(&self, subject: &Did) -> Result<bool, AgoriaError>;
}

enum Merge {
    /// No existing record: the incoming update becomes current outright.
    FreshInsert,
    /// The incoming update causally descends from the current one.
    Advance,
    /// Identical vector clock: a harmless duplicate delivery.
    NoChange,
    /// Concurrent with the current record; `new_is_winner` says whether the
    /// incoming update displaces the current one under LWW tiebreak.
    Conflict { new_is_winner: bool },
    /// The incoming update is causally older than what is already known.
    Stale,
}

/// Resolve `incoming` against the subject's current latest update.
/// Concurrent updates are decided by the lexicographic `(timestamp,
/// updater_id)` tuple, not by vector-clock magnitude, so every replica
/// converges on the same winner regardless of arrival order.
fn decide_merge(current: Option<&CardUpdate>, incoming: &CardUpdate) -> Merge {
    let Some(current) = current else {
        return Merge::FreshInsert;
    };
    match incoming.clock.compare(&current.clock) {
        CausalOrder::After => Merge::Advance,
        CausalOrder::Equal => Merge::NoChange,
        CausalOrder::Before => Merge::Stale,
        CausalOrder::Concurrent => {
            let incoming_key = (incoming.timestamp, &incoming.updater_id);
            let current_key = (current.timestamp, &current.updater_id);
            Merge::Conflict {
                new_is_winner: incoming_key > current_key,
            }
        }
    }
}

/// Apply `decide_merge`'s verdict, always appending `incoming` to the
/// history and only moving `latest` per the outcome.
fn apply_merge(
    existing: Option<Entry>,
    mut incoming: CardUpdate,
) -> Result<(Entry, bool, Option<AgentCard>), AgoriaError> {
    let mut entry = existing.unwrap_or_default();
    incoming.prev_hash = match entry.history.last() {
        Some(last) => Some(last.content_hash()?),
        None => None,
    };
    let verdict = decide_merge(entry.history.get(entry.latest), &incoming);
    match verdict {
        Merge::FreshInsert => {
            entry.history.push(incoming);
            entry.latest = 0;
            Ok((entry, true, None))
        }
        Merge::Advance => {
            entry.history.push(incoming);
            entry.latest = entry.history.len() - 1;
            Ok((entry, true, None))
        }
        Merge::NoChange => {
            entry.history.push(incoming);
            Ok((entry, false, None))
        }
        Merge::Stale => Err(AgoriaError::OrderingViolation),
        Merge::Conflict { new_is_winner } => {
            let loser_card = if new_is_winner {
                let loser = entry.latest_update().card.clone();
                entry.history.push(incoming);
                entry.latest = entry.history.len() - 1;
                Some(loser)
            } else {
                entry.history.push(incoming);
                None
            };
            Ok((entry, new_is_winner, loser_card))
        }
    }
}

fn to_conflict_record(subject: Did, entry: &Entry) -> Option<ConflictRecord> {
    let losers: Vec<AgentCard> = entry.conflicts().map(|u| u.card.clone()).collect();
    if losers.is_empty() {
        None
    } else {
        Some(ConflictRecord {
            subject,
            winner: entry.latest_update().card.clone(),
            losers,
        })
    }
}

// ── In-memory backend ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCardStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CardStore for InMemoryCardStore {
    fn apply_update(
        &self,
        card: AgentCard,
        clock: VectorClock,
        updater_id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, AgoriaError> {
        let key = card.subject.to_string();
        let mut entries = self.entries.write();
        let existing = entries.remove(&key);
        let incoming = CardUpdate {
            card,
            clock,
            prev_hash: None,
            updater_id,
            timestamp,
        };
        let (entry, applied, _loser) = apply_merge(existing, incoming)?;
        entries.insert(key, entry);
        Ok(applied)
    }

    fn get_latest(&self, subject: &Did) -> Result<Option<AgentCard>, AgoriaError> {
        Ok(self
            .entries
            .read()
            .get(&subject.to_string())
            .map(|e| e.latest_update().card.clone()))
    }

    fn history(&self, subject: &Did) -> Result<Vec<CardUpdate>, AgoriaError> {
        Ok(self
            .entries
            .read()
            .get(&subject.to_string())
            .map(|e| e.history.clone())
            .unwrap_or_default())
    }

    fn list_conflicts(&self) -> Result<Vec<ConflictRecord>, AgoriaError> {
        Ok(self
            .entries
            .read()
            .values()
            .filter_map(|e| to_conflict_record(e.latest_update().card.subject.clone(), e))
            .collect())
    }

    fn has_conflicts(&self, subject: &Did) -> Result<bool, AgoriaError> {
        Ok(self
            .entries
            .read()
            .get(&subject.to_string())
            .map(|e| e.conflicts().next().is_some())
            .unwrap_or(false))
    }
}

// ── Sled-backed durable store ───────────────────────────────────────────────

pub struct SledCardStore {
    cards: sled::Tree,
}

impl SledCardStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AgoriaError> {
        let db = sled::open(path).map_err(|e| AgoriaError::Storage(e.to_string()))?;
        let cards = db
            .open_tree("cards")
            .map_err(|e| AgoriaError::Storage(e.to_string()))?;
        Ok(Self { cards })
    }

    fn get_entry(&self, key: &str) -> Result<Option<Entry>, AgoriaError> {
        match self
            .cards
            .get(key.as_bytes())
            .map_err(|e| AgoriaError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let entry = bincode::deserialize(&bytes)
                    .map_err(|e| AgoriaError::Serialization(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn put_entry(&self, key: &str, entry: &Entry) -> Result<(), AgoriaError> {
        let bytes = bincode::serialize(entry).map_err(|e| AgoriaError::Serialization(e.to_string()))?;
        self.cards
            .insert(key.as_bytes(), bytes)
            .map_err(|e| AgoriaError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl CardStore for SledCardStore {
    fn apply_update(
        &self,
        card: AgentCard,
        clock: VectorClock,
        updater_id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, AgoriaError> {
        let key = card.subject.to_string();
        let existing = self.get_entry(&key)?;
        let incoming = CardUpdate {
            card,
            clock,
            prev_hash: None,
            updater_id,
            timestamp,
        };
        let (entry, applied, _loser) = apply_merge(existing, incoming)?;
        self.put_entry(&key, &entry)?;
        Ok(applied)
    }

    fn get_latest(&self, subject: &Did) -> Result<Option<AgentCard>, AgoriaError> {
        Ok(self
            .get_entry(&subject.to_string())?
            .map(|e| e.latest_update().card.clone()))
    }

    fn history(&self, subject: &Did) -> Result<Vec<CardUpdate>, AgoriaError> {
        Ok(self
            .get_entry(&subject.to_string())?
            .map(|e| e.history)
            .unwrap_or_default())
    }

    fn list_conflicts(&self) -> Result<Vec<ConflictRecord>, AgoriaError> {
        let mut out = Vec::new();
        for item in self.cards.iter() {
            let (_, bytes) = item.map_err(|e| AgoriaError::Storage(e.to_string()))?;
            let entry: Entry =
                bincode::deserialize(&bytes).map_err(|e| AgoriaError::Serialization(e.to_string()))?;
            if let Some(record) = to_conflict_record(entry.latest_update().card.subject.clone(), &entry) {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn has_conflicts(&self, subject: &Did) -> Result<bool, AgoriaError> {
        Ok(self
            .get_entry(&subject.to_string())?
            .map(|e| e.conflicts().next().is_some())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_core::did::DidType;
    use agoria_crypto::KeyPair;
    use chrono::Duration;

    use crate::card::{AgentCardBuilder, EconomicTerms, NetworkInfo, RuntimeInfo};

    fn card_for(subject: &Did, keypair: &KeyPair, issued: chrono::DateTime<Utc>) -> AgentCard {
        AgentCardBuilder::new(subject.clone(), subject.clone(), issued, issued + Duration::days(1))
            .capability("test.capability")
            .runtime(RuntimeInfo {
                binary_hash: "sha256:abc".into(),
                entrypoint: "run".into(),
                max_concurrency: 1,
            })
            .economic(EconomicTerms {
                price_per_task: 1,
                currency: "AGO".into(),
            })
            .network(NetworkInfo {
                peer_id: "peer".into(),
                endpoints: vec![],
            })
            .sign(keypair)
            .unwrap()
    }

    #[test]
    fn first_update_always_applies() {
        let store = InMemoryCardStore::new();
        let keypair = KeyPair::generate();
        let subject = Did::new("agoria", DidType::Agent, "a1");
        let now = Utc::now();
        let card = card_for(&subject, &keypair, now);

        let mut clock = VectorClock::new();
        clock.increment("node-1");
        assert!(store
            .apply_update(card.clone(), clock, "node-1".into(), now)
            .unwrap());
        assert_eq!(store.get_latest(&subject).unwrap().unwrap().id, card.id);
    }

    #[test]
    fn causally_newer_update_replaces_current() {
        let store = InMemoryCardStore::new();
        let keypair = KeyPair::generate();
        let subject = Did::new("agoria", DidType::Agent, "a1");
        let now = Utc::now();

        let mut clock1 = VectorClock::new();
        clock1.increment("node-1");
        let card1 = card_for(&subject, &keypair, now);
        store.apply_update(card1, clock1.clone(), "node-1".into(), now).unwrap();

        let mut clock2 = clock1.clone();
        clock2.increment("node-1");
        let card2 = card_for(&subject, &keypair, now + Duration::seconds(1));
        assert!(store
            .apply_update(card2.clone(), clock2, "node-1".into(), now + Duration::seconds(1))
            .unwrap());
        assert_eq!(store.get_latest(&subject).unwrap().unwrap().id, card2.id);
        assert!(!store.has_conflicts(&subject).unwrap());

        let history = store.history(&subject).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].prev_hash.is_none());
        assert_eq!(history[1].prev_hash.as_deref(), Some(history[0].content_hash().unwrap().as_str()));
    }

    #[test]
    fn stale_update_is_rejected() {
        let store = InMemoryCardStore::new();
        let keypair = KeyPair::generate();
        let subject = Did::new("agoria", DidType::Agent, "a1");
        let now = Utc::now();

        let mut clock1 = VectorClock::new();
        clock1.increment("node-1");
        let mut clock2 = clock1.clone();
        clock2.increment("node-1");

        let card1 = card_for(&subject, &keypair, now);
        let card2 = card_for(&subject, &keypair, now + Duration::seconds(1));
        store
            .apply_update(card2, clock2, "node-1".into(), now + Duration::seconds(1))
            .unwrap();

        let err = store.apply_update(card1, clock1, "node-1".into(), now).unwrap_err();
        assert!(matches!(err, AgoriaError::OrderingViolation));
    }

    #[test]
    fn concurrent_updates_are_resolved_by_timestamp_then_updater_id() {
        let store = InMemoryCardStore::new();
        let keypair = KeyPair::generate();
        let subject = Did::new("agoria", DidType::Agent, "a1");
        let now = Utc::now();

        let mut clock_a = VectorClock::new();
        clock_a.increment("node-a");
        let mut clock_b = VectorClock::new();
        clock_b.increment("node-b");

        let card_a = card_for(&subject, &keypair, now);
        let card_b = card_for(&subject, &keypair, now + Duration::seconds(1));

        // Same timestamp: updater_id "node-a" < "node-b" breaks the tie, so
        // the second delivery (from node-b) should win regardless of order.
        store.apply_update(card_a.clone(), clock_a, "node-a".into(), now).unwrap();
        let applied = store.apply_update(card_b.clone(), clock_b, "node-b".into(), now).unwrap();

        assert!(applied);
        assert!(store.has_conflicts(&subject).unwrap());
        assert_eq!(store.get_latest(&subject).unwrap().unwrap().id, card_b.id);

        let conflicts = store.list_conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].losers.len(), 1);
        assert_eq!(conflicts[0].losers[0].id, card_a.id);

        let history = store.history(&subject).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn concurrent_update_with_earlier_timestamp_loses_and_is_recorded() {
        let store = InMemoryCardStore::new();
        let keypair = KeyPair::generate();
        let subject = Did::new("agoria", DidType::Agent, "a1");
        let now = Utc::now();

        let mut clock_a = VectorClock::new();
        clock_a.increment("node-a");
        let mut clock_b = VectorClock::new();
        clock_b.increment("node-b");

        let card_a = card_for(&subject, &keypair, now + Duration::seconds(5));
        let card_b = card_for(&subject, &keypair, now);

        store
            .apply_update(card_a.clone(), clock_a, "node-a".into(), now + Duration::seconds(5))
            .unwrap();
        let applied = store.apply_update(card_b.clone(), clock_b, "node-b".into(), now).unwrap();

        assert!(!applied);
        assert_eq!(store.get_latest(&subject).unwrap().unwrap().id, card_a.id);
        let conflicts = store.list_conflicts().unwrap();
        assert_eq!(conflicts[0].losers[0].id, card_b.id);
    }
}
