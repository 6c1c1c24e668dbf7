use agoria_telemetry::TraceContext;
use serde::{Deserialize, Serialize};

/// The three gossip planes of the overlay network. Each carries
/// independently serialized payloads from the layer above (cards, guilds,
/// channels) — the overlay never interprets the payload, only routes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Card,
    Guild,
    Channel,
}

/// `trace` carries the causal context of whatever produced the payload (a
/// card update, a guild event, a channel payment) so the receiving side can
/// correlate its own logs and metrics with the sender's, without the
/// overlay itself knowing anything about the payload's contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayMessage {
    pub payload: Vec<u8>,
    pub trace: Option<TraceContext>,
}

impl OverlayMessage {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload, trace: None }
    }

    pub fn with_trace(payload: Vec<u8>, trace: TraceContext) -> Self {
        Self {
            payload,
            trace: Some(trace),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("OverlayMessage serialization is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
