//! Ephemeral guild group encryption.
//!
//! Each guild member holds an X25519 keypair. The group key is derived by
//! combining this member's pairwise Diffie-Hellman shared secret with every
//! other member's public key, sorted so every member converges on the same
//! key regardless of iteration order. Control-plane payloads are then
//! sealed with ChaCha20-Poly1305 under that key.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

#[derive(Debug, Error)]
pub enum GuildCryptoError {
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed (wrong key or tampered ciphertext)")]
    DecryptFailed,
    #[error("ciphertext too short to contain a nonce")]
    CiphertextTooShort,
}

pub struct X25519Identity {
    secret: StaticSecret,
    pub public: [u8; 32],
}

impl X25519Identity {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = X25519PublicKey::from(&secret);
        Self {
            secret,
            public: public.to_bytes(),
        }
    }

    fn shared_secret_with(&self, other: &[u8; 32]) -> [u8; 32] {
        let their_public = X25519PublicKey::from(*other);
        self.secret.diffie_hellman(&their_public).to_bytes()
    }
}

/// Derive the shared group key for a guild from this member's identity and
/// the full sorted set of member public keys (including this member's own).
pub fn derive_group_key(me: &X25519Identity, member_publics: &[[u8; 32]]) -> [u8; 32] {
    let mut others: Vec<&[u8; 32]> = member_publics.iter().filter(|p| **p != me.public).collect();
    others.sort();

    let mut hasher = Sha256::new();
    hasher.update(b"agoria-guild-group-key:v1");
    if others.is_empty() {
        // Single-member guild: key derives from the member's own public key only.
        hasher.update(me.public);
    }
    for other in others {
        hasher.update(me.shared_secret_with(other));
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Seal `plaintext` under `group_key`. Output is `nonce || ciphertext`.
pub fn seal(group_key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, GuildCryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(group_key));
    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| GuildCryptoError::EncryptFailed)?;
    let mut out = nonce_bytes.to_vec();
    out.extend(ciphertext);
    Ok(out)
}

/// Open a payload produced by [`seal`].
pub fn open(group_key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, GuildCryptoError> {
    if sealed.len() < 12 {
        return Err(GuildCryptoError::CiphertextTooShort);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(12);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(group_key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| GuildCryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_members_converge_on_same_group_key() {
        let alice = X25519Identity::generate();
        let bob = X25519Identity::generate();
        let members = {
            let mut v = vec![alice.public, bob.public];
            v.sort();
            v
        };

        let key_alice = derive_group_key(&alice, &members);
        let key_bob = derive_group_key(&bob, &members);
        assert_eq!(key_alice, key_bob);
    }

    #[test]
    fn seal_open_round_trip() {
        let alice = X25519Identity::generate();
        let members = vec![alice.public];
        let key = derive_group_key(&alice, &members);

        let sealed = seal(&key, b"hello guild").unwrap();
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(opened, b"hello guild");
    }

    #[test]
    fn open_fails_with_wrong_key() {
        let alice = X25519Identity::generate();
        let bob = X25519Identity::generate();
        let key_a = derive_group_key(&alice, &[alice.public]);
        let key_b = derive_group_key(&bob, &[bob.public]);

        let sealed = seal(&key_a, b"secret").unwrap();
        assert!(open(&key_b, &sealed).is_err());
    }
}
