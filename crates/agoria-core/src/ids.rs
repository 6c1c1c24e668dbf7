use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_uuid_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

opaque_uuid_id!(GuildId, "GuildId");
opaque_uuid_id!(TaskId, "TaskId");

/// A deterministic 32-byte hash-derived identifier (hex-displayed), used
/// where the spec requires the id to be reproducible from its inputs
/// rather than randomly generated (payment channels, payments).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashId(pub [u8; 32]);

impl HashId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes[..32.min(bytes.len())]);
        Ok(Self(arr))
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashId({}…)", &self.to_hex()[..16])
    }
}

pub type ChannelId = HashId;
pub type PaymentId = HashId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guild_id_round_trips_via_display() {
        let id = GuildId::new();
        let parsed: GuildId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn hash_id_hex_round_trip() {
        let id = HashId::from_bytes([7u8; 32]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed = HashId::from_hex(&hex).unwrap();
        assert_eq!(parsed, id);
    }
}
