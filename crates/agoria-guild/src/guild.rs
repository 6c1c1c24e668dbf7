use agoria_core::ids::GuildId;
use agoria_core::Did;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub did: Did,
    pub x25519_public: [u8; 32],
    pub joined_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub owner: Did,
    pub members: Vec<Member>,
    pub max_members: usize,
    pub created_at: DateTime<Utc>,
    pub closed: bool,
}

impl Guild {
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_members
    }

    pub fn is_member(&self, did: &Did) -> bool {
        self.members.iter().any(|m| &m.did == did)
    }

    pub fn member_publics(&self) -> Vec<[u8; 32]> {
        let mut keys: Vec<[u8; 32]> = self.members.iter().map(|m| m.x25519_public).collect();
        keys.sort();
        keys
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}
