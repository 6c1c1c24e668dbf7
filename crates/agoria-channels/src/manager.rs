//! Payment channel lifecycle: open → active → closed, with strict
//! sequence-number and balance-conservation invariants on every update.
//! Disputes are recorded for downstream reputation scoring; this layer
//! does not attempt on-chain settlement.

use std::collections::HashMap;

use agoria_core::ids::ChannelId;
use agoria_core::{AgoriaError, Did};
use agoria_crypto::KeyPair;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::channel::{derive_channel_id, ChannelStatus, DisputeRecord, Payment, PaymentChannel};

#[derive(Default)]
pub struct ChannelManager {
    channels: RwLock<HashMap<ChannelId, PaymentChannel>>,
    disputes: RwLock<Vec<DisputeRecord>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        &self,
        party_a: Did,
        party_b: Did,
        balance_a: u128,
        balance_b: u128,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<ChannelId, AgoriaError> {
        let id = derive_channel_id(&party_a, &party_b, now);
        let mut channels = self.channels.write();
        if channels.contains_key(&id) {
            return Err(AgoriaError::ChannelExists(id.to_string()));
        }
        channels.insert(
            id,
            PaymentChannel {
                id,
                party_a,
                party_b,
                balance_a,
                balance_b,
                sequence_num: 0,
                status: ChannelStatus::Opening,
                opened_at: now,
                expires_at,
            },
        );
        Ok(id)
    }

    pub fn activate(&self, id: ChannelId) -> Result<(), AgoriaError> {
        let mut channels = self.channels.write();
        let channel = channels
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown channel {id}")))?;
        if channel.status != ChannelStatus::Opening {
            return Err(AgoriaError::ChannelNotActive(id.to_string()));
        }
        channel.status = ChannelStatus::Active;
        Ok(())
    }

    /// Pay `amount` from `from` to `to` on channel `id`, signed by `signer`
    /// (which must be `from`'s keypair). Enforces: the channel is active and
    /// unexpired, `from`/`to` are the channel's two parties, and `amount`
    /// does not exceed the sender's current balance. On success, debits the
    /// sender, credits the recipient, advances `sequence_num` by exactly
    /// one, and returns the signed `Payment`.
    #[allow(clippy::too_many_arguments)]
    pub fn pay(
        &self,
        id: ChannelId,
        from: &Did,
        to: &Did,
        amount: u128,
        memo: impl Into<String>,
        now: DateTime<Utc>,
        signer: &KeyPair,
    ) -> Result<Payment, AgoriaError> {
        let mut channels = self.channels.write();
        let channel = channels
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown channel {id}")))?;

        if channel.status != ChannelStatus::Active {
            return Err(AgoriaError::ChannelNotActive(id.to_string()));
        }
        if channel.is_expired(now) {
            return Err(AgoriaError::ChannelExpired(id.to_string()));
        }

        let sender_is_a = if from == &channel.party_a && to == &channel.party_b {
            true
        } else if from == &channel.party_b && to == &channel.party_a {
            false
        } else {
            return Err(AgoriaError::InvalidField(format!(
                "{from} -> {to} are not channel {id}'s parties"
            )));
        };
        let sender_balance = if sender_is_a { channel.balance_a } else { channel.balance_b };
        if amount > sender_balance {
            return Err(AgoriaError::InsufficientBalance {
                need: amount,
                have: sender_balance,
            });
        }

        let sequence_num = channel.sequence_num + 1;
        let payment = Payment::new_signed(id, from.clone(), to.clone(), amount, sequence_num, now, memo, signer)?;

        if sender_is_a {
            channel.balance_a -= amount;
            channel.balance_b += amount;
        } else {
            channel.balance_b -= amount;
            channel.balance_a += amount;
        }
        channel.sequence_num = sequence_num;
        Ok(payment)
    }

    /// Close the channel, returning the final balances.
    pub fn close(&self, id: ChannelId) -> Result<(u128, u128), AgoriaError> {
        let mut channels = self.channels.write();
        let channel = channels
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown channel {id}")))?;
        if channel.status == ChannelStatus::Closed {
            return Err(AgoriaError::ChannelNotActive(id.to_string()));
        }
        channel.status = ChannelStatus::Closed;
        Ok((channel.balance_a, channel.balance_b))
    }

    /// Record a dispute without attempting settlement. The reputation
    /// layer consumes these via `drain_disputes`.
    pub fn dispute(&self, id: ChannelId, raised_by: Did, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), AgoriaError> {
        if !self.channels.read().contains_key(&id) {
            return Err(AgoriaError::InvalidField(format!("unknown channel {id}")));
        }
        self.disputes.write().push(DisputeRecord {
            channel_id: id,
            raised_by,
            reason: reason.into(),
            recorded_at: now,
        });
        Ok(())
    }

    pub fn drain_disputes(&self) -> Vec<DisputeRecord> {
        std::mem::take(&mut *self.disputes.write())
    }

    pub fn get(&self, id: ChannelId) -> Option<PaymentChannel> {
        self.channels.read().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_core::did::DidType;
    use chrono::Duration;

    fn did(id: &str) -> Did {
        Did::new("agoria", DidType::Agent, id)
    }

    fn setup() -> (ChannelManager, ChannelId, DateTime<Utc>, KeyPair) {
        let manager = ChannelManager::new();
        let now = Utc::now();
        let id = manager
            .open(did("alice"), did("bob"), 100, 50, now, now + Duration::hours(1))
            .unwrap();
        manager.activate(id).unwrap();
        (manager, id, now, KeyPair::generate())
    }

    #[test]
    fn payment_sequence_debits_sender_and_advances_sequence() {
        let (manager, id, now, key_a) = setup();
        let p1 = manager.pay(id, &did("alice"), &did("bob"), 30, "", now, &key_a).unwrap();
        let p2 = manager.pay(id, &did("alice"), &did("bob"), 20, "", now, &key_a).unwrap();
        let p3 = manager.pay(id, &did("alice"), &did("bob"), 15, "", now, &key_a).unwrap();

        let channel = manager.get(id).unwrap();
        assert_eq!(channel.balance_a, 35);
        assert_eq!(channel.balance_b, 115);
        assert_eq!(channel.sequence_num, 3);

        for (payment, expected_seq) in [(p1, 1), (p2, 2), (p3, 3)] {
            assert_eq!(payment.sequence_num, expected_seq);
            assert!(payment.verify(&key_a.public_key).is_ok());
        }
    }

    #[test]
    fn pay_rejects_overspend() {
        let manager = ChannelManager::new();
        let now = Utc::now();
        let id = manager
            .open(did("alice"), did("bob"), 50, 0, now, now + Duration::hours(1))
            .unwrap();
        manager.activate(id).unwrap();
        let key_a = KeyPair::generate();

        let err = manager.pay(id, &did("alice"), &did("bob"), 100, "", now, &key_a).unwrap_err();
        assert!(matches!(err, AgoriaError::InsufficientBalance { need: 100, have: 50 }));
        let channel = manager.get(id).unwrap();
        assert_eq!(channel.balance_a, 50);
        assert_eq!(channel.balance_b, 0);
    }

    #[test]
    fn pay_rejects_unknown_parties() {
        let (manager, id, now, key_a) = setup();
        let err = manager
            .pay(id, &did("alice"), &did("carol"), 10, "", now, &key_a)
            .unwrap_err();
        assert!(matches!(err, AgoriaError::InvalidField(_)));
    }

    #[test]
    fn pay_rejects_after_expiry() {
        let (manager, id, now, key_a) = setup();
        let err = manager
            .pay(id, &did("alice"), &did("bob"), 10, "", now + Duration::hours(2), &key_a)
            .unwrap_err();
        assert!(matches!(err, AgoriaError::ChannelExpired(_)));
    }

    #[test]
    fn open_twice_at_same_instant_conflicts() {
        let manager = ChannelManager::new();
        let now = Utc::now();
        manager
            .open(did("alice"), did("bob"), 100, 0, now, now + Duration::hours(1))
            .unwrap();
        let err = manager
            .open(did("alice"), did("bob"), 100, 0, now, now + Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, AgoriaError::ChannelExists(_)));
    }

    #[test]
    fn dispute_is_recorded_without_settlement() {
        let (manager, id, now, _key_a) = setup();
        manager.dispute(id, did("alice"), "counterparty stopped responding", now).unwrap();
        let disputes = manager.drain_disputes();
        assert_eq!(disputes.len(), 1);
        assert_eq!(manager.get(id).unwrap().status, ChannelStatus::Active);
    }

    #[test]
    fn close_returns_final_balances() {
        let (manager, id, now, key_a) = setup();
        manager.pay(id, &did("alice"), &did("bob"), 60, "", now, &key_a).unwrap();
        let (a, b) = manager.close(id).unwrap();
        assert_eq!((a, b), (40, 110));
    }
}
