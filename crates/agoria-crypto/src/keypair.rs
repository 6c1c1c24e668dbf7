use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey, Signature as DalekSignature};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key bytes: {0}")]
    InvalidPublicKey(String),
    #[error("invalid base64 proof value: {0}")]
    InvalidEncoding(String),
}

/// An Ed25519 public key, newtype-wrapped so it can carry `Serialize` and a
/// stable hex `Display`/`Debug` without leaking the underlying crate's type
/// across the public API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "hex_bytes_32")] pub [u8; 32]);

impl PublicKey {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s).map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(SignatureError::InvalidPublicKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    fn to_verifying_key(&self) -> Result<VerifyingKey, SignatureError> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}…)", &self.to_hex()[..8])
    }
}

/// A detached Ed25519 signature, base64-encoded on the wire (the spec's
/// `proofValue` format).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, SignatureError> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
        Ok(Self(bytes))
    }

    fn to_dalek(&self) -> Result<DalekSignature, SignatureError> {
        let arr: [u8; 64] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidSignature)?;
        Ok(DalekSignature::from_bytes(&arr))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}b)", self.0.len())
    }
}

/// An Ed25519 keypair. The secret half lives in a `Zeroizing` buffer and is
/// wiped on drop.
pub struct KeyPair {
    pub public_key: PublicKey,
    secret_bytes: Zeroizing<[u8; 32]>,
}

impl KeyPair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            public_key: PublicKey(signing_key.verifying_key().to_bytes()),
            secret_bytes: Zeroizing::new(signing_key.to_bytes()),
        }
    }

    /// Restore a keypair from a raw 32-byte seed (e.g. loaded from disk).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self {
            public_key: PublicKey(signing_key.verifying_key().to_bytes()),
            secret_bytes: Zeroizing::new(seed),
        }
    }

    pub fn seed_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret_bytes)
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key().sign(message);
        Signature(sig.to_bytes().to_vec())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {:?} }}", self.public_key)
    }
}

/// Verify a detached signature against a message and public key. Returns
/// `Ok(())` on success, a `SignatureError` on any failure (bad key bytes,
/// bad signature bytes, or a signature that does not verify).
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
    let vk = public_key.to_verifying_key()?;
    let sig = signature.to_dalek()?;
    vk.verify(message, &sig).map_err(|_| SignatureError::InvalidSignature)
}

mod hex_bytes_32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let mut arr = [0u8; 32];
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("expected 32 bytes"));
        }
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let keypair = KeyPair::generate();
        let message = b"agoria marketplace";
        let sig = keypair.sign(message);
        assert!(verify(&keypair.public_key, message, &sig).is_ok());
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let keypair = KeyPair::generate();
        let other = KeyPair::generate();
        let message = b"agoria marketplace";
        let sig = keypair.sign(message);
        assert!(verify(&other.public_key, message, &sig).is_err());
    }

    #[test]
    fn verify_fails_on_tampered_message() {
        let keypair = KeyPair::generate();
        let sig = keypair.sign(b"original");
        assert!(verify(&keypair.public_key, b"tampered", &sig).is_err());
    }

    #[test]
    fn signature_base64_round_trips() {
        let keypair = KeyPair::generate();
        let sig = keypair.sign(b"msg");
        let encoded = sig.to_base64();
        let decoded = Signature::from_base64(&encoded).unwrap();
        assert_eq!(sig, decoded);
    }
}
