//! Guild lifecycle management: create/join/leave/dissolve, membership TTL
//! sweeping, and the ephemeral X25519-derived group key used to encrypt
//! control-plane messages. The group key is rotated on every membership
//! change so a removed member cannot decrypt future traffic.

use std::collections::HashMap;

use agoria_core::ids::GuildId;
use agoria_core::{AgoriaError, Did};
use agoria_crypto::guild_key::{derive_group_key, open, seal, X25519Identity};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::guild::{Guild, Member};

#[derive(Debug, Clone, Copy)]
pub struct GuildManagerConfig {
    pub default_max_members: usize,
    pub heartbeat_ttl: chrono::Duration,
}

impl Default for GuildManagerConfig {
    fn default() -> Self {
        Self {
            default_max_members: 64,
            heartbeat_ttl: chrono::Duration::minutes(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuildStats {
    pub total_guilds: usize,
    pub total_members: usize,
    pub average_size: f64,
    pub oldest_age: Option<chrono::Duration>,
}

struct GuildEntry {
    guild: Guild,
    group_key: [u8; 32],
}

pub struct GuildManager {
    config: GuildManagerConfig,
    guilds: RwLock<HashMap<GuildId, GuildEntry>>,
}

impl GuildManager {
    pub fn new(config: GuildManagerConfig) -> Self {
        Self {
            config,
            guilds: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(
        &self,
        name: impl Into<String>,
        owner: Did,
        owner_identity: &X25519Identity,
        now: DateTime<Utc>,
    ) -> GuildId {
        let id = GuildId::new();
        let owner_member = Member {
            did: owner.clone(),
            x25519_public: owner_identity.public,
            joined_at: now,
            last_heartbeat: now,
        };
        let guild = Guild {
            id,
            name: name.into(),
            owner,
            members: vec![owner_member],
            max_members: self.config.default_max_members,
            created_at: now,
            closed: false,
        };
        let group_key = derive_group_key(owner_identity, &guild.member_publics());
        self.guilds.write().insert(id, GuildEntry { guild, group_key });
        id
    }

    pub fn join(
        &self,
        id: GuildId,
        member: Did,
        member_identity: &X25519Identity,
        now: DateTime<Utc>,
    ) -> Result<(), AgoriaError> {
        let mut guilds = self.guilds.write();
        let entry = guilds
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown guild {id}")))?;

        if entry.guild.closed {
            return Err(AgoriaError::GuildClosed(id.to_string()));
        }
        if entry.guild.is_full() {
            return Err(AgoriaError::GuildFull(id.to_string()));
        }
        if entry.guild.is_member(&member) {
            return Ok(());
        }

        entry.guild.members.push(Member {
            did: member,
            x25519_public: member_identity.public,
            joined_at: now,
            last_heartbeat: now,
        });
        entry.group_key = derive_group_key(member_identity, &entry.guild.member_publics());
        Ok(())
    }

    pub fn leave(&self, id: GuildId, member: &Did, remaining_identity: Option<&X25519Identity>) -> Result<(), AgoriaError> {
        let mut guilds = self.guilds.write();
        let entry = guilds
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown guild {id}")))?;

        let before = entry.guild.members.len();
        entry.guild.members.retain(|m| &m.did != member);
        if entry.guild.members.len() == before {
            return Err(AgoriaError::NotMember(member.to_string(), id.to_string()));
        }

        if let Some(identity) = remaining_identity {
            entry.group_key = derive_group_key(identity, &entry.guild.member_publics());
        }
        Ok(())
    }

    pub fn dissolve(&self, id: GuildId) -> Result<(), AgoriaError> {
        let mut guilds = self.guilds.write();
        let entry = guilds
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown guild {id}")))?;
        entry.guild.closed = true;
        Ok(())
    }

    pub fn update_heartbeat(&self, id: GuildId, member: &Did, now: DateTime<Utc>) -> Result<(), AgoriaError> {
        let mut guilds = self.guilds.write();
        let entry = guilds
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown guild {id}")))?;
        let m = entry
            .guild
            .members
            .iter_mut()
            .find(|m| &m.did == member)
            .ok_or_else(|| AgoriaError::NotMember(member.to_string(), id.to_string()))?;
        m.last_heartbeat = now;
        Ok(())
    }

    /// Remove members whose heartbeat has gone silent past the configured
    /// TTL. Returns the guild ids affected.
    pub fn sweep_expired_members(&self, now: DateTime<Utc>) -> Vec<GuildId> {
        let mut affected = Vec::new();
        let mut guilds = self.guilds.write();
        for (id, entry) in guilds.iter_mut() {
            let before = entry.guild.members.len();
            entry
                .guild
                .members
                .retain(|m| now - m.last_heartbeat <= self.config.heartbeat_ttl);
            if entry.guild.members.len() != before {
                affected.push(*id);
            }
        }
        affected
    }

    pub fn seal_for_guild(&self, id: GuildId, plaintext: &[u8]) -> Result<Vec<u8>, AgoriaError> {
        let guilds = self.guilds.read();
        let entry = guilds
            .get(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown guild {id}")))?;
        seal(&entry.group_key, plaintext).map_err(|e| AgoriaError::InvalidField(e.to_string()))
    }

    pub fn open_for_guild(&self, id: GuildId, sealed: &[u8]) -> Result<Vec<u8>, AgoriaError> {
        let guilds = self.guilds.read();
        let entry = guilds
            .get(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown guild {id}")))?;
        open(&entry.group_key, sealed).map_err(|e| AgoriaError::InvalidField(e.to_string()))
    }

    pub fn get(&self, id: GuildId) -> Option<Guild> {
        self.guilds.read().get(&id).map(|e| e.guild.clone())
    }

    pub fn stats(&self, now: DateTime<Utc>) -> GuildStats {
        let guilds = self.guilds.read();
        let total_guilds = guilds.len();
        let total_members: usize = guilds.values().map(|e| e.guild.members.len()).sum();
        let average_size = if total_guilds == 0 {
            0.0
        } else {
            total_members as f64 / total_guilds as f64
        };
        let oldest_age = guilds.values().map(|e| e.guild.age(now)).max();
        GuildStats {
            total_guilds,
            total_members,
            average_size,
            oldest_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_core::did::DidType;

    fn did(id: &str) -> Did {
        Did::new("agoria", DidType::Agent, id)
    }

    #[test]
    fn create_then_join_grows_membership() {
        let manager = GuildManager::new(GuildManagerConfig::default());
        let owner_identity = X25519Identity::generate();
        let now = Utc::now();
        let guild_id = manager.create("research-guild", did("owner"), &owner_identity, now);

        let member_identity = X25519Identity::generate();
        manager.join(guild_id, did("member-1"), &member_identity, now).unwrap();

        let guild = manager.get(guild_id).unwrap();
        assert_eq!(guild.members.len(), 2);
    }

    #[test]
    fn join_rejects_when_full() {
        let mut config = GuildManagerConfig::default();
        config.default_max_members = 1;
        let manager = GuildManager::new(config);
        let owner_identity = X25519Identity::generate();
        let now = Utc::now();
        let guild_id = manager.create("tiny-guild", did("owner"), &owner_identity, now);

        let member_identity = X25519Identity::generate();
        let err = manager.join(guild_id, did("member-1"), &member_identity, now).unwrap_err();
        assert!(matches!(err, AgoriaError::GuildFull(_)));
    }

    #[test]
    fn dissolved_guild_rejects_new_members() {
        let manager = GuildManager::new(GuildManagerConfig::default());
        let owner_identity = X25519Identity::generate();
        let now = Utc::now();
        let guild_id = manager.create("guild", did("owner"), &owner_identity, now);
        manager.dissolve(guild_id).unwrap();

        let member_identity = X25519Identity::generate();
        let err = manager.join(guild_id, did("member-1"), &member_identity, now).unwrap_err();
        assert!(matches!(err, AgoriaError::GuildClosed(_)));
    }

    #[test]
    fn seal_and_open_round_trip_inside_guild() {
        let manager = GuildManager::new(GuildManagerConfig::default());
        let owner_identity = X25519Identity::generate();
        let now = Utc::now();
        let guild_id = manager.create("guild", did("owner"), &owner_identity, now);

        let sealed = manager.seal_for_guild(guild_id, b"hello").unwrap();
        let opened = manager.open_for_guild(guild_id, &sealed).unwrap();
        assert_eq!(opened, b"hello");
    }

    #[test]
    fn sweep_removes_stale_members() {
        let manager = GuildManager::new(GuildManagerConfig::default());
        let owner_identity = X25519Identity::generate();
        let now = Utc::now();
        let guild_id = manager.create("guild", did("owner"), &owner_identity, now);

        let member_identity = X25519Identity::generate();
        manager.join(guild_id, did("member-1"), &member_identity, now).unwrap();
        manager
            .update_heartbeat(guild_id, &did("member-1"), now - chrono::Duration::hours(1))
            .unwrap();

        let affected = manager.sweep_expired_members(now);
        assert_eq!(affected, vec![guild_id]);
        assert_eq!(manager.get(guild_id).unwrap().members.len(), 1);
    }
}
