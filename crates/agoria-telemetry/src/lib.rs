//! Observability for the Agoria runtime: structured metrics sinks, a
//! Prometheus-backed implementation, a minimal metrics HTTP endpoint, and a
//! trace context carried on peer-to-peer message envelopes.

pub mod http;
pub mod prometheus;
pub mod sinks;
pub mod trace;

pub use sinks::{metrics, MetricsSink, NopSink};
pub use trace::TraceContext;
