//! Abstract traits for metrics reporting, decoupling component logic from
//! the Prometheus backend. One trait per component, a blanket `MetricsSink`
//! covering all of them, and a `NopSink` for tests or a disabled install.

use once_cell::sync::OnceCell;

/// A no-op sink used before `install()` runs, or in tests.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// Global reference to the installed sink. `None` until `install()` succeeds.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the installed sink, or a no-op sink if telemetry was never installed.
pub fn metrics() -> &'static dyn MetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// A sink for the HNSW capability index and card store.
pub trait CardMetricsSink: Send + Sync + std::fmt::Debug {
    fn inc_cards_issued(&self);
    fn inc_card_conflicts(&self);
    fn set_card_store_size(&self, count: u64);
    fn observe_capability_query_duration(&self, duration_secs: f64);
}
impl CardMetricsSink for NopSink {
    fn inc_cards_issued(&self) {}
    fn inc_card_conflicts(&self) {}
    fn set_card_store_size(&self, _count: u64) {}
    fn observe_capability_query_duration(&self, _duration_secs: f64) {}
}

/// A sink for guild formation, membership, and dissolution.
pub trait GuildMetricsSink: Send + Sync + std::fmt::Debug {
    fn inc_guilds_formed(&self);
    fn inc_guilds_dissolved(&self);
    fn inc_member_joins(&self);
    fn inc_member_departures(&self);
    fn set_active_guild_count(&self, count: u64);
}
impl GuildMetricsSink for NopSink {
    fn inc_guilds_formed(&self) {}
    fn inc_guilds_dissolved(&self) {}
    fn inc_member_joins(&self) {}
    fn inc_member_departures(&self) {}
    fn set_active_guild_count(&self, _count: u64) {}
}

/// A sink for payment channel opens, payments, closes, and disputes.
pub trait ChannelMetricsSink: Send + Sync + std::fmt::Debug {
    fn inc_channels_opened(&self);
    fn inc_channels_closed(&self);
    fn inc_payments_applied(&self);
    fn inc_disputes_raised(&self);
    fn set_open_channel_count(&self, count: u64);
}
impl ChannelMetricsSink for NopSink {
    fn inc_channels_opened(&self) {}
    fn inc_channels_closed(&self) {}
    fn inc_payments_applied(&self) {}
    fn inc_disputes_raised(&self) {}
    fn set_open_channel_count(&self, _count: u64) {}
}

/// A sink for reputation score updates and blacklist transitions.
pub trait ReputationMetricsSink: Send + Sync + std::fmt::Debug {
    fn inc_outcomes_recorded(&self, success: bool);
    fn inc_peers_blacklisted(&self);
    fn inc_peers_unblacklisted(&self);
    fn set_tracked_peer_count(&self, count: u64);
}
impl ReputationMetricsSink for NopSink {
    fn inc_outcomes_recorded(&self, _success: bool) {}
    fn inc_peers_blacklisted(&self) {}
    fn inc_peers_unblacklisted(&self) {}
    fn set_tracked_peer_count(&self, _count: u64) {}
}

/// A sink for task queue depth and eviction behavior.
pub trait QueueMetricsSink: Send + Sync + std::fmt::Debug {
    fn inc_tasks_enqueued(&self, priority: &'static str);
    fn inc_tasks_evicted(&self);
    fn inc_enqueue_rejected(&self);
    fn set_queue_depth(&self, priority: &'static str, depth: u64);
}
impl QueueMetricsSink for NopSink {
    fn inc_tasks_enqueued(&self, _priority: &'static str) {}
    fn inc_tasks_evicted(&self) {}
    fn inc_enqueue_rejected(&self) {}
    fn set_queue_depth(&self, _priority: &'static str, _depth: u64) {}
}

/// A sink for orchestrator task dispatch, retries, and worker pool sizing.
pub trait OrchestratorMetricsSink: Send + Sync + std::fmt::Debug {
    fn observe_task_duration(&self, outcome: &'static str, duration_secs: f64);
    fn inc_tasks_total(&self, outcome: &'static str);
    fn inc_retries(&self);
    fn inc_timeouts(&self);
    fn set_active_workers(&self, count: u64);
}
impl OrchestratorMetricsSink for NopSink {
    fn observe_task_duration(&self, _outcome: &'static str, _duration_secs: f64) {}
    fn inc_tasks_total(&self, _outcome: &'static str) {}
    fn inc_retries(&self) {}
    fn inc_timeouts(&self) {}
    fn set_active_workers(&self, _count: u64) {}
}

/// A sink for overlay network and DHT lookup activity.
pub trait OverlayMetricsSink: Send + Sync + std::fmt::Debug {
    fn inc_connected_peers(&self);
    fn dec_connected_peers(&self);
    fn observe_dht_lookup_duration(&self, duration_secs: f64);
    fn inc_gossip_messages(&self, topic: &str);
}
impl OverlayMetricsSink for NopSink {
    fn inc_connected_peers(&self) {}
    fn dec_connected_peers(&self) {}
    fn observe_dht_lookup_duration(&self, _duration_secs: f64) {}
    fn inc_gossip_messages(&self, _topic: &str) {}
}

/// A sink for structured error counting across all components.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    fn inc_error(&self, component: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _component: &'static str, _variant: &'static str) {}
}

/// A unified sink implementing every domain-specific trait, giving a single
/// point of implementation for a metrics backend.
pub trait MetricsSink:
    CardMetricsSink
    + GuildMetricsSink
    + ChannelMetricsSink
    + ReputationMetricsSink
    + QueueMetricsSink
    + OrchestratorMetricsSink
    + OverlayMetricsSink
    + ErrorMetricsSink
{
}

impl<T> MetricsSink for T where
    T: CardMetricsSink
        + GuildMetricsSink
        + ChannelMetricsSink
        + ReputationMetricsSink
        + QueueMetricsSink
        + OrchestratorMetricsSink
        + OverlayMetricsSink
        + ErrorMetricsSink
{
}
