use agoria_core::canonical::to_canonical_bytes;
use agoria_core::ids::{ChannelId, PaymentId};
use agoria_core::{AgoriaError, Did};
use agoria_crypto::{sha256, KeyPair, PublicKey, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    Opening,
    Active,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub id: ChannelId,
    pub party_a: Did,
    pub party_b: Did,
    pub balance_a: u128,
    pub balance_b: u128,
    pub sequence_num: u64,
    pub status: ChannelStatus,
    pub opened_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentChannel {
    pub fn total_balance(&self) -> u128 {
        self.balance_a + self.balance_b
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn counterparty(&self, party: &Did) -> Option<&Did> {
        if party == &self.party_a {
            Some(&self.party_b)
        } else if party == &self.party_b {
            Some(&self.party_a)
        } else {
            None
        }
    }
}

/// A single directional balance update, signed once by the sender over the
/// canonical tuple `(channel_id, from, to, amount, sequence_num, timestamp,
/// memo)`. `payment_id` is derived from that same tuple, so it is
/// reproducible from the payment's own content rather than assigned at
/// random.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub channel_id: ChannelId,
    pub from: Did,
    pub to: Did,
    pub amount: u128,
    pub sequence_num: u64,
    pub timestamp: DateTime<Utc>,
    pub memo: String,
    pub signature: Signature,
}

impl Payment {
    #[allow(clippy::too_many_arguments)]
    fn signing_bytes(
        channel_id: &ChannelId,
        from: &Did,
        to: &Did,
        amount: u128,
        sequence_num: u64,
        timestamp: DateTime<Utc>,
        memo: &str,
    ) -> Result<Vec<u8>, AgoriaError> {
        #[derive(Serialize)]
        struct SignedView<'a> {
            channel_id: &'a ChannelId,
            from: &'a Did,
            to: &'a Did,
            amount: u128,
            sequence_num: u64,
            timestamp: DateTime<Utc>,
            memo: &'a str,
        }
        to_canonical_bytes(&SignedView {
            channel_id,
            from,
            to,
            amount,
            sequence_num,
            timestamp,
            memo,
        })
    }

    /// Build and sign a new payment. `signer` must be `from`'s keypair.
    #[allow(clippy::too_many_arguments)]
    pub fn new_signed(
        channel_id: ChannelId,
        from: Did,
        to: Did,
        amount: u128,
        sequence_num: u64,
        timestamp: DateTime<Utc>,
        memo: impl Into<String>,
        signer: &KeyPair,
    ) -> Result<Self, AgoriaError> {
        let memo = memo.into();
        let bytes = Self::signing_bytes(&channel_id, &from, &to, amount, sequence_num, timestamp, &memo)?;
        let signature = signer.sign(&bytes);
        let payment_id = PaymentId::from_bytes(sha256(&bytes));
        Ok(Self {
            payment_id,
            channel_id,
            from,
            to,
            amount,
            sequence_num,
            timestamp,
            memo,
            signature,
        })
    }

    /// Verify the payment's signature under the sender's (`from`) public key.
    pub fn verify(&self, sender_key: &PublicKey) -> Result<(), AgoriaError> {
        let bytes = Self::signing_bytes(
            &self.channel_id,
            &self.from,
            &self.to,
            self.amount,
            self.sequence_num,
            self.timestamp,
            &self.memo,
        )?;
        agoria_crypto::verify(sender_key, &bytes, &self.signature).map_err(|_| AgoriaError::InvalidSignature)
    }
}

/// Derive a deterministic channel id from the ordered pair of parties and
/// the channel's opening timestamp, so both parties compute the same id
/// without a coordination round.
pub fn derive_channel_id(party_a: &Did, party_b: &Did, opened_at: DateTime<Utc>) -> ChannelId {
    let (first, second) = if party_a.to_string() <= party_b.to_string() {
        (party_a, party_b)
    } else {
        (party_b, party_a)
    };
    let mut input = Vec::new();
    input.extend_from_slice(first.to_string().as_bytes());
    input.push(0);
    input.extend_from_slice(second.to_string().as_bytes());
    input.push(0);
    input.extend_from_slice(opened_at.timestamp_micros().to_be_bytes().as_slice());
    ChannelId::from_bytes(sha256(&input))
}

#[derive(Debug, Clone)]
pub struct DisputeRecord {
    pub channel_id: ChannelId,
    pub raised_by: Did,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_core::did::DidType;

    #[test]
    fn channel_id_is_order_independent() {
        let a = Did::new("agoria", DidType::Agent, "alice");
        let b = Did::new("agoria", DidType::Agent, "bob");
        let now = Utc::now();
        assert_eq!(derive_channel_id(&a, &b, now), derive_channel_id(&b, &a, now));
    }

    #[test]
    fn payment_sign_verify_round_trip() {
        let key_a = agoria_crypto::KeyPair::generate();
        let a = Did::new("agoria", DidType::Agent, "alice");
        let b = Did::new("agoria", DidType::Agent, "bob");
        let now = Utc::now();
        let id = derive_channel_id(&a, &b, now);

        let payment = Payment::new_signed(id, a, b, 30, 1, now, "", &key_a).unwrap();
        assert!(payment.verify(&key_a.public_key).is_ok());
    }

    #[test]
    fn payment_verify_rejects_wrong_key() {
        let key_a = agoria_crypto::KeyPair::generate();
        let key_other = agoria_crypto::KeyPair::generate();
        let a = Did::new("agoria", DidType::Agent, "alice");
        let b = Did::new("agoria", DidType::Agent, "bob");
        let now = Utc::now();
        let id = derive_channel_id(&a, &b, now);

        let payment = Payment::new_signed(id, a, b, 30, 1, now, "", &key_a).unwrap();
        assert!(payment.verify(&key_other.public_key).is_err());
    }
}
