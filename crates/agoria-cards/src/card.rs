//! The Agent Card: a signed, verifiable description of an agent's
//! capabilities, runtime requirements, and terms of service.

use agoria_core::canonical::to_canonical_bytes;
use agoria_core::{AgoriaError, Did};
use agoria_crypto::{sha256_tagged, verify as verify_signature, KeyPair, PublicKey, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeInfo {
    /// `sha256:<hex>` digest of the executable/container image the agent runs.
    pub binary_hash: String,
    pub entrypoint: String,
    pub max_concurrency: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EconomicTerms {
    pub price_per_task: u128,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkInfo {
    pub peer_id: String,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReputationSummary {
    pub score: f64,
    pub tasks_completed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proof {
    pub proof_type: String,
    pub created: DateTime<Utc>,
    pub verification_method: String,
    pub proof_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    pub id: String,
    pub issuer: Did,
    pub subject: Did,
    pub issued: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub card_type: String,
    pub capabilities: Vec<String>,
    pub runtime: RuntimeInfo,
    pub reputation: Option<ReputationSummary>,
    pub economic: EconomicTerms,
    pub network: NetworkInfo,
    pub proof: Option<Proof>,
}

impl AgentCard {
    /// The document hashed and signed, or verified against: every field
    /// except `id` (derived from this hash) and `proof` (the signature
    /// itself, which can't sign over itself).
    fn signing_view(&self) -> AgentCard {
        let mut view = self.clone();
        view.id = String::new();
        view.proof = None;
        view
    }

    pub fn content_hash(&self) -> Result<String, AgoriaError> {
        let bytes = to_canonical_bytes(&self.signing_view())?;
        Ok(sha256_tagged(&bytes))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    pub fn verify(&self, issuer_key: &PublicKey) -> Result<(), AgoriaError> {
        let proof = self
            .proof
            .as_ref()
            .ok_or_else(|| AgoriaError::InvalidSignature)?;
        let bytes = to_canonical_bytes(&self.signing_view())?;
        let sig = Signature::from_base64(&proof.proof_value)
            .map_err(|e| AgoriaError::InvalidField(e.to_string()))?;
        verify_signature(issuer_key, &bytes, &sig).map_err(|_| AgoriaError::InvalidSignature)
    }
}

pub struct AgentCardBuilder {
    issuer: Did,
    subject: Did,
    issued: DateTime<Utc>,
    expires: DateTime<Utc>,
    capabilities: Vec<String>,
    runtime: Option<RuntimeInfo>,
    reputation: Option<ReputationSummary>,
    economic: Option<EconomicTerms>,
    network: Option<NetworkInfo>,
}

impl AgentCardBuilder {
    pub fn new(issuer: Did, subject: Did, issued: DateTime<Utc>, expires: DateTime<Utc>) -> Self {
        Self {
            issuer,
            subject,
            issued,
            expires,
            capabilities: Vec::new(),
            runtime: None,
            reputation: None,
            economic: None,
            network: None,
        }
    }

    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn runtime(mut self, runtime: RuntimeInfo) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn reputation(mut self, reputation: ReputationSummary) -> Self {
        self.reputation = Some(reputation);
        self
    }

    pub fn economic(mut self, economic: EconomicTerms) -> Self {
        self.economic = Some(economic);
        self
    }

    pub fn network(mut self, network: NetworkInfo) -> Self {
        self.network = Some(network);
        self
    }

    /// Finish the card and sign it with `keypair`. The card's `id` and
    /// content hash are derived from the signed document, so signing and
    /// hashing happen together.
    pub fn sign(self, keypair: &KeyPair) -> Result<AgentCard, AgoriaError> {
        let runtime = self
            .runtime
            .ok_or_else(|| AgoriaError::MissingField("runtime".into()))?;
        let economic = self
            .economic
            .ok_or_else(|| AgoriaError::MissingField("economic".into()))?;
        let network = self
            .network
            .ok_or_else(|| AgoriaError::MissingField("network".into()))?;

        let mut card = AgentCard {
            id: String::new(),
            issuer: self.issuer,
            subject: self.subject,
            issued: self.issued,
            expires: self.expires,
            card_type: "AgentCard".to_string(),
            capabilities: self.capabilities,
            runtime,
            reputation: self.reputation,
            economic,
            network,
            proof: None,
        };

        let bytes = to_canonical_bytes(&card.signing_view())?;
        let signature = keypair.sign(&bytes);
        card.proof = Some(Proof {
            proof_type: "Ed25519Signature2020".to_string(),
            created: self.issued,
            verification_method: format!("{}#key-1", card.issuer),
            proof_value: signature.to_base64(),
        });
        card.id = card.content_hash()?;
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_core::did::DidType;
    use chrono::Duration;

    fn sample_card(keypair: &KeyPair, issued: DateTime<Utc>) -> AgentCard {
        let issuer = Did::new("agoria", DidType::Agent, "issuer1");
        let subject = issuer.clone();
        AgentCardBuilder::new(issuer, subject, issued, issued + Duration::days(30))
            .capability("image.generate")
            .runtime(RuntimeInfo {
                binary_hash: "sha256:abc".into(),
                entrypoint: "run.sh".into(),
                max_concurrency: 4,
            })
            .economic(EconomicTerms {
                price_per_task: 100,
                currency: "AGO".into(),
            })
            .network(NetworkInfo {
                peer_id: "12D3KooW...".into(),
                endpoints: vec!["/ip4/127.0.0.1/tcp/4001".into()],
            })
            .sign(keypair)
            .unwrap()
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let keypair = KeyPair::generate();
        let now = Utc::now();
        let card = sample_card(&keypair, now);
        assert!(card.verify(&keypair.public_key).is_ok());
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let keypair = KeyPair::generate();
        let other = KeyPair::generate();
        let now = Utc::now();
        let card = sample_card(&keypair, now);
        assert!(card.verify(&other.public_key).is_err());
    }

    #[test]
    fn tampering_breaks_verification() {
        let keypair = KeyPair::generate();
        let now = Utc::now();
        let mut card = sample_card(&keypair, now);
        card.capabilities.push("image.classify".into());
        assert!(card.verify(&keypair.public_key).is_err());
    }

    #[test]
    fn content_hash_is_stable_for_identical_document() {
        let keypair = KeyPair::generate();
        let now = Utc::now();
        let card = sample_card(&keypair, now);
        assert_eq!(card.content_hash().unwrap(), card.id);
    }

    #[test]
    fn expiry_check() {
        let keypair = KeyPair::generate();
        let now = Utc::now();
        let card = sample_card(&keypair, now);
        assert!(!card.is_expired(now));
        assert!(card.is_expired(now + Duration::days(31)));
    }
}
