use std::str::FromStr;
use std::sync::Arc;

use agoria_cards::card::AgentCard;
use agoria_cards::store::CardStore;
use agoria_core::{AgoriaError, Did};
use agoria_embeddings::CapabilityIndex;
use agoria_reputation::ReputationManager;

/// Default agent selector: an HNSW query over the task's required
/// capabilities, skipping any candidate the reputation manager has
/// blacklisted, returning the first signed card still on record.
pub struct AgentSelector {
    index: Arc<CapabilityIndex>,
    cards: Arc<dyn CardStore>,
    reputation: Arc<ReputationManager>,
    candidate_pool: usize,
}

impl AgentSelector {
    pub fn new(index: Arc<CapabilityIndex>, cards: Arc<dyn CardStore>, reputation: Arc<ReputationManager>) -> Self {
        Self {
            index,
            cards,
            reputation,
            candidate_pool: 5,
        }
    }

    pub fn select(&self, capabilities_required: &[String], now: chrono::DateTime<chrono::Utc>) -> Result<AgentCard, AgoriaError> {
        let candidates = self.index.query_capabilities(capabilities_required, self.candidate_pool);
        if candidates.is_empty() {
            return Err(AgoriaError::NoSuitableAgent(capabilities_required.join(",")));
        }

        for (subject, _distance) in candidates {
            if self.reputation.is_blacklisted(&subject, now) {
                continue;
            }
            let Ok(subject_did) = Did::from_str(&subject) else {
                continue;
            };
            if let Some(card) = self.cards.get_latest(&subject_did)? {
                if !card.is_expired(now) {
                    return Ok(card);
                }
            }
        }

        Err(AgoriaError::NoSuitableAgent(capabilities_required.join(",")))
    }
}
