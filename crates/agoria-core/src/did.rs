use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AgoriaError;

/// The subject class encoded in a DID's third segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidType {
    Agent,
    User,
    Network,
}

impl fmt::Display for DidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DidType::Agent => "agent",
            DidType::User => "user",
            DidType::Network => "network",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DidType {
    type Err = AgoriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(DidType::Agent),
            "user" => Ok(DidType::User),
            "network" => Ok(DidType::Network),
            other => Err(AgoriaError::InvalidDid(format!("unknown DID type: {other}"))),
        }
    }
}

/// A Decentralized Identifier of the form `did:<method>:<type>:<identifier>`.
///
/// Immutable once constructed. The wrapped string is always the fully
/// validated, canonical form — there is no separate "raw" representation.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did {
    method: String,
    did_type: DidType,
    identifier: String,
}

impl Did {
    pub fn new(method: impl Into<String>, did_type: DidType, identifier: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            did_type,
            identifier: identifier.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn did_type(&self) -> DidType {
        self.did_type
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_agent(&self) -> bool {
        matches!(self.did_type, DidType::Agent)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}:{}", self.method, self.did_type, self.identifier)
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Did({self})")
    }
}

impl FromStr for Did {
    type Err = AgoriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');
        let scheme = parts.next().unwrap_or_default();
        let method = parts.next().unwrap_or_default();
        let did_type = parts.next().unwrap_or_default();
        let identifier = parts.next().unwrap_or_default();

        if scheme != "did" || method.is_empty() || identifier.is_empty() {
            return Err(AgoriaError::InvalidDid(s.to_string()));
        }

        Ok(Did {
            method: method.to_string(),
            did_type: did_type.parse()?,
            identifier: identifier.to_string(),
        })
    }
}

impl TryFrom<String> for Did {
    type Error = AgoriaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let did = Did::new("agoria", DidType::Agent, "math-001");
        let s = did.to_string();
        assert_eq!(s, "did:agoria:agent:math-001");
        let parsed: Did = s.parse().unwrap();
        assert_eq!(parsed, did);
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!("agoria:agent:math-001".parse::<Did>().is_err());
    }

    #[test]
    fn rejects_unknown_type() {
        assert!("did:agoria:planet:math-001".parse::<Did>().is_err());
    }
}
