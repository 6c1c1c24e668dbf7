//! Trace context carried on outbound messages (guild messages, channel
//! updates, DHT lookups) and extracted on receive, so causality across
//! components survives the message-passing boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trace id identifies one logical operation across components; a span id
/// identifies one hop within it. Both are plain UUIDs, serialized as part of
/// the message envelope rather than out-of-band headers, since there is no
/// HTTP boundary between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
}

impl TraceContext {
    /// Starts a new trace at the root of a causal chain (e.g. a task is
    /// first enqueued, a payment channel is opened).
    pub fn root() -> Self {
        let trace_id = Uuid::new_v4();
        Self {
            trace_id,
            span_id: trace_id,
        }
    }

    /// Derives the context for the next hop, preserving `trace_id` and
    /// minting a fresh `span_id`.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
        }
    }

    /// Builds a `tracing::Span` with `trace_id`/`span_id` fields populated
    /// from this context, so logs and metrics emitted under it correlate.
    pub fn span(&self, name: &'static str) -> tracing::Span {
        tracing::info_span!(
            "trace",
            op = name,
            trace_id = %self.trace_id,
            span_id = %self.span_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_preserves_trace_id_and_mints_new_span_id() {
        let root = TraceContext::root();
        let child = root.child();
        assert_eq!(root.trace_id, child.trace_id);
        assert_ne!(root.span_id, child.span_id);
    }

    #[test]
    fn root_uses_trace_id_as_its_own_span_id() {
        let root = TraceContext::root();
        assert_eq!(root.trace_id, root.span_id);
    }

    #[test]
    fn round_trips_through_json() {
        let ctx = TraceContext::root();
        let json = serde_json::to_string(&ctx).unwrap();
        let back: TraceContext = serde_json::from_str(&json).unwrap();
        assert_eq!(ctx, back);
    }
}
