pub mod guild_key;
pub mod hash;
pub mod keypair;

pub use guild_key::{derive_group_key, open, seal, GuildCryptoError, X25519Identity};
pub use hash::{sha256, sha256_tagged};
pub use keypair::{verify, KeyPair, PublicKey, Signature, SignatureError};
