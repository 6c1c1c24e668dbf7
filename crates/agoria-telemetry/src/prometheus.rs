//! Concrete `MetricsSink` implementation backed by the `prometheus` crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_histogram_vec,
    register_int_counter, register_int_counter_vec, Gauge, GaugeVec, Histogram, HistogramVec,
    IntCounter, IntCounterVec,
};

/// The duration histogram buckets shared by every component, in seconds.
pub const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static CARD_ISSUED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CARD_CONFLICTS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CARD_STORE_SIZE: OnceCell<Gauge> = OnceCell::new();
static CAPABILITY_QUERY_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();

static GUILDS_FORMED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static GUILDS_DISSOLVED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static MEMBER_JOINS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static MEMBER_DEPARTURES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static ACTIVE_GUILD_COUNT: OnceCell<Gauge> = OnceCell::new();

static CHANNELS_OPENED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CHANNELS_CLOSED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static PAYMENTS_APPLIED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static DISPUTES_RAISED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static OPEN_CHANNEL_COUNT: OnceCell<Gauge> = OnceCell::new();

static OUTCOMES_RECORDED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static PEERS_BLACKLISTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static PEERS_UNBLACKLISTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static TRACKED_PEER_COUNT: OnceCell<Gauge> = OnceCell::new();

static TASKS_ENQUEUED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static TASKS_EVICTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static ENQUEUE_REJECTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static QUEUE_DEPTH: OnceCell<GaugeVec> = OnceCell::new();

static TASK_DURATION_SECONDS: OnceCell<HistogramVec> = OnceCell::new();
static TASKS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static RETRIES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static TIMEOUTS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static ACTIVE_WORKERS: OnceCell<Gauge> = OnceCell::new();

static CONNECTED_PEERS: OnceCell<Gauge> = OnceCell::new();
static DHT_LOOKUP_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static GOSSIP_MESSAGES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Panics if `install()` was never called — a missing install is an
/// application wiring bug, not a condition to degrade around silently.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("agoria telemetry not installed: call agoria_telemetry::prometheus::install() first")
    };
}

impl CardMetricsSink for PrometheusSink {
    fn inc_cards_issued(&self) {
        get_metric!(CARD_ISSUED_TOTAL).inc();
    }
    fn inc_card_conflicts(&self) {
        get_metric!(CARD_CONFLICTS_TOTAL).inc();
    }
    fn set_card_store_size(&self, count: u64) {
        get_metric!(CARD_STORE_SIZE).set(count as f64);
    }
    fn observe_capability_query_duration(&self, duration_secs: f64) {
        get_metric!(CAPABILITY_QUERY_DURATION_SECONDS).observe(duration_secs);
    }
}

impl GuildMetricsSink for PrometheusSink {
    fn inc_guilds_formed(&self) {
        get_metric!(GUILDS_FORMED_TOTAL).inc();
    }
    fn inc_guilds_dissolved(&self) {
        get_metric!(GUILDS_DISSOLVED_TOTAL).inc();
    }
    fn inc_member_joins(&self) {
        get_metric!(MEMBER_JOINS_TOTAL).inc();
    }
    fn inc_member_departures(&self) {
        get_metric!(MEMBER_DEPARTURES_TOTAL).inc();
    }
    fn set_active_guild_count(&self, count: u64) {
        get_metric!(ACTIVE_GUILD_COUNT).set(count as f64);
    }
}

impl ChannelMetricsSink for PrometheusSink {
    fn inc_channels_opened(&self) {
        get_metric!(CHANNELS_OPENED_TOTAL).inc();
    }
    fn inc_channels_closed(&self) {
        get_metric!(CHANNELS_CLOSED_TOTAL).inc();
    }
    fn inc_payments_applied(&self) {
        get_metric!(PAYMENTS_APPLIED_TOTAL).inc();
    }
    fn inc_disputes_raised(&self) {
        get_metric!(DISPUTES_RAISED_TOTAL).inc();
    }
    fn set_open_channel_count(&self, count: u64) {
        get_metric!(OPEN_CHANNEL_COUNT).set(count as f64);
    }
}

impl ReputationMetricsSink for PrometheusSink {
    fn inc_outcomes_recorded(&self, success: bool) {
        get_metric!(OUTCOMES_RECORDED_TOTAL)
            .with_label_values(&[if success { "success" } else { "failure" }])
            .inc();
    }
    fn inc_peers_blacklisted(&self) {
        get_metric!(PEERS_BLACKLISTED_TOTAL).inc();
    }
    fn inc_peers_unblacklisted(&self) {
        get_metric!(PEERS_UNBLACKLISTED_TOTAL).inc();
    }
    fn set_tracked_peer_count(&self, count: u64) {
        get_metric!(TRACKED_PEER_COUNT).set(count as f64);
    }
}

impl QueueMetricsSink for PrometheusSink {
    fn inc_tasks_enqueued(&self, priority: &'static str) {
        get_metric!(TASKS_ENQUEUED_TOTAL)
            .with_label_values(&[priority])
            .inc();
    }
    fn inc_tasks_evicted(&self) {
        get_metric!(TASKS_EVICTED_TOTAL).inc();
    }
    fn inc_enqueue_rejected(&self) {
        get_metric!(ENQUEUE_REJECTED_TOTAL).inc();
    }
    fn set_queue_depth(&self, priority: &'static str, depth: u64) {
        get_metric!(QUEUE_DEPTH)
            .with_label_values(&[priority])
            .set(depth as f64);
    }
}

impl OrchestratorMetricsSink for PrometheusSink {
    fn observe_task_duration(&self, outcome: &'static str, duration_secs: f64) {
        get_metric!(TASK_DURATION_SECONDS)
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }
    fn inc_tasks_total(&self, outcome: &'static str) {
        get_metric!(TASKS_TOTAL).with_label_values(&[outcome]).inc();
    }
    fn inc_retries(&self) {
        get_metric!(RETRIES_TOTAL).inc();
    }
    fn inc_timeouts(&self) {
        get_metric!(TIMEOUTS_TOTAL).inc();
    }
    fn set_active_workers(&self, count: u64) {
        get_metric!(ACTIVE_WORKERS).set(count as f64);
    }
}

impl OverlayMetricsSink for PrometheusSink {
    fn inc_connected_peers(&self) {
        get_metric!(CONNECTED_PEERS).inc();
    }
    fn dec_connected_peers(&self) {
        get_metric!(CONNECTED_PEERS).dec();
    }
    fn observe_dht_lookup_duration(&self, duration_secs: f64) {
        get_metric!(DHT_LOOKUP_DURATION_SECONDS).observe(duration_secs);
    }
    fn inc_gossip_messages(&self, topic: &str) {
        get_metric!(GOSSIP_MESSAGES_TOTAL)
            .with_label_values(&[topic])
            .inc();
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, component: &'static str, variant: &'static str) {
        get_metric!(ERRORS_TOTAL)
            .with_label_values(&[component, variant])
            .inc();
    }
}

/// Registers every collector exactly once and returns a static reference to
/// the sink. Must be called once at node startup before any component
/// reports a metric.
#[allow(clippy::expect_used)]
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    CARD_ISSUED_TOTAL
        .set(register_int_counter!(
            "agoria_cards_issued_total",
            "Total agent cards issued."
        )?)
        .expect("static already initialized");
    CARD_CONFLICTS_TOTAL
        .set(register_int_counter!(
            "agoria_card_conflicts_total",
            "Total concurrent card-update conflicts surfaced by the card store."
        )?)
        .expect("static already initialized");
    CARD_STORE_SIZE
        .set(register_gauge!(
            "agoria_card_store_size",
            "Current number of distinct subjects tracked in the card store."
        )?)
        .expect("static already initialized");
    CAPABILITY_QUERY_DURATION_SECONDS
        .set(register_histogram!(
            "agoria_capability_query_duration_seconds",
            "Latency of an HNSW capability index query.",
            DURATION_BUCKETS.to_vec()
        )?)
        .expect("static already initialized");

    GUILDS_FORMED_TOTAL
        .set(register_int_counter!(
            "agoria_guilds_formed_total",
            "Total guilds formed."
        )?)
        .expect("static already initialized");
    GUILDS_DISSOLVED_TOTAL
        .set(register_int_counter!(
            "agoria_guilds_dissolved_total",
            "Total guilds dissolved."
        )?)
        .expect("static already initialized");
    MEMBER_JOINS_TOTAL
        .set(register_int_counter!(
            "agoria_member_joins_total",
            "Total guild membership joins."
        )?)
        .expect("static already initialized");
    MEMBER_DEPARTURES_TOTAL
        .set(register_int_counter!(
            "agoria_member_departures_total",
            "Total guild membership departures."
        )?)
        .expect("static already initialized");
    ACTIVE_GUILD_COUNT
        .set(register_gauge!(
            "agoria_active_guild_count",
            "Current number of active guilds."
        )?)
        .expect("static already initialized");

    CHANNELS_OPENED_TOTAL
        .set(register_int_counter!(
            "agoria_channels_opened_total",
            "Total payment channels opened."
        )?)
        .expect("static already initialized");
    CHANNELS_CLOSED_TOTAL
        .set(register_int_counter!(
            "agoria_channels_closed_total",
            "Total payment channels closed."
        )?)
        .expect("static already initialized");
    PAYMENTS_APPLIED_TOTAL
        .set(register_int_counter!(
            "agoria_payments_applied_total",
            "Total in-channel payments applied."
        )?)
        .expect("static already initialized");
    DISPUTES_RAISED_TOTAL
        .set(register_int_counter!(
            "agoria_disputes_raised_total",
            "Total payment channel disputes raised."
        )?)
        .expect("static already initialized");
    OPEN_CHANNEL_COUNT
        .set(register_gauge!(
            "agoria_open_channel_count",
            "Current number of open payment channels."
        )?)
        .expect("static already initialized");

    OUTCOMES_RECORDED_TOTAL
        .set(register_int_counter_vec!(
            "agoria_outcomes_recorded_total",
            "Total execution outcomes recorded, labeled by success/failure.",
            &["result"]
        )?)
        .expect("static already initialized");
    PEERS_BLACKLISTED_TOTAL
        .set(register_int_counter!(
            "agoria_peers_blacklisted_total",
            "Total peers transitioned into a blacklisted state."
        )?)
        .expect("static already initialized");
    PEERS_UNBLACKLISTED_TOTAL
        .set(register_int_counter!(
            "agoria_peers_unblacklisted_total",
            "Total peers whose blacklist expired."
        )?)
        .expect("static already initialized");
    TRACKED_PEER_COUNT
        .set(register_gauge!(
            "agoria_tracked_peer_count",
            "Current number of peers with a reputation score."
        )?)
        .expect("static already initialized");

    TASKS_ENQUEUED_TOTAL
        .set(register_int_counter_vec!(
            "agoria_tasks_enqueued_total",
            "Total tasks enqueued, labeled by priority lane.",
            &["priority"]
        )?)
        .expect("static already initialized");
    TASKS_EVICTED_TOTAL
        .set(register_int_counter!(
            "agoria_tasks_evicted_total",
            "Total tasks evicted to make room under queue capacity."
        )?)
        .expect("static already initialized");
    ENQUEUE_REJECTED_TOTAL
        .set(register_int_counter!(
            "agoria_enqueue_rejected_total",
            "Total enqueue attempts rejected because the queue was closed."
        )?)
        .expect("static already initialized");
    QUEUE_DEPTH
        .set(register_gauge_vec!(
            "agoria_queue_depth",
            "Current queue depth, labeled by priority lane.",
            &["priority"]
        )?)
        .expect("static already initialized");

    TASK_DURATION_SECONDS
        .set(register_histogram_vec!(
            "agoria_task_duration_seconds",
            "Latency of a dispatched task, labeled by outcome.",
            &["outcome"],
            DURATION_BUCKETS.to_vec()
        )?)
        .expect("static already initialized");
    TASKS_TOTAL
        .set(register_int_counter_vec!(
            "agoria_tasks_total",
            "Total tasks dispatched, labeled by outcome.",
            &["outcome"]
        )?)
        .expect("static already initialized");
    RETRIES_TOTAL
        .set(register_int_counter!(
            "agoria_retries_total",
            "Total task retries scheduled after an executor error or timeout."
        )?)
        .expect("static already initialized");
    TIMEOUTS_TOTAL
        .set(register_int_counter!(
            "agoria_timeouts_total",
            "Total tasks that exceeded their execution timeout."
        )?)
        .expect("static already initialized");
    ACTIVE_WORKERS
        .set(register_gauge!(
            "agoria_active_workers",
            "Current number of running orchestrator worker loops."
        )?)
        .expect("static already initialized");

    CONNECTED_PEERS
        .set(register_gauge!(
            "agoria_connected_peers",
            "Current number of connected overlay peers."
        )?)
        .expect("static already initialized");
    DHT_LOOKUP_DURATION_SECONDS
        .set(register_histogram!(
            "agoria_dht_lookup_duration_seconds",
            "Latency of a DHT lookup.",
            DURATION_BUCKETS.to_vec()
        )?)
        .expect("static already initialized");
    GOSSIP_MESSAGES_TOTAL
        .set(register_int_counter_vec!(
            "agoria_gossip_messages_total",
            "Total gossip messages received, labeled by topic.",
            &["topic"]
        )?)
        .expect("static already initialized");

    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "agoria_errors_total",
            "Total errors, labeled by originating component and error variant.",
            &["component", "variant"]
        )?)
        .expect("static already initialized");

    static SINK_INSTANCE: PrometheusSink = PrometheusSink;
    let sink: &'static dyn MetricsSink = &SINK_INSTANCE;
    let _ = crate::sinks::SINK.set(sink);
    Ok(sink)
}
