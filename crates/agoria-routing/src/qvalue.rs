//! Per-peer quality tracking: exponential moving averages over latency,
//! task success rate, and bandwidth, combined into a single Q-score used
//! to rank candidate peers for task routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smoothing factor for the exponential moving averages. Higher weights
/// recent observations more heavily.
pub const DEFAULT_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QValue {
    pub latency_ms_ema: f64,
    pub success_rate_ema: f64,
    pub bandwidth_bps_ema: f64,
    pub samples: u64,
    pub last_seen: DateTime<Utc>,
}

impl QValue {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            latency_ms_ema: 0.0,
            success_rate_ema: 1.0,
            bandwidth_bps_ema: 0.0,
            samples: 0,
            last_seen: now,
        }
    }

    /// Fold in a single observed interaction.
    pub fn update(&mut self, latency_ms: f64, success: bool, bandwidth_bps: f64, now: DateTime<Utc>, alpha: f64) {
        let success_value = if success { 1.0 } else { 0.0 };
        if self.samples == 0 {
            self.latency_ms_ema = latency_ms;
            self.success_rate_ema = success_value;
            self.bandwidth_bps_ema = bandwidth_bps;
        } else {
            self.latency_ms_ema = ema(self.latency_ms_ema, latency_ms, alpha);
            self.success_rate_ema = ema(self.success_rate_ema, success_value, alpha);
            self.bandwidth_bps_ema = ema(self.bandwidth_bps_ema, bandwidth_bps, alpha);
        }
        self.samples += 1;
        self.last_seen = now;
    }
}

fn ema(previous: f64, sample: f64, alpha: f64) -> f64 {
    alpha * sample + (1.0 - alpha) * previous
}

/// Weights for combining a `QValue`'s components into one composite score.
/// Latency and bandwidth are normalized monotonically (lower latency is
/// better, higher bandwidth is better) before weighting.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub latency: f64,
    pub success: f64,
    pub bandwidth: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            latency: 0.4,
            success: 0.4,
            bandwidth: 0.2,
        }
    }
}

/// A reference latency/bandwidth used to normalize into `[0, 1]`. Values
/// beyond the reference saturate rather than going out of range.
const LATENCY_REFERENCE_MS: f64 = 2000.0;
const BANDWIDTH_REFERENCE_BPS: f64 = 10_000_000.0;

impl QValue {
    pub fn q_score(&self, weights: ScoreWeights) -> f64 {
        let latency_score = 1.0 - (self.latency_ms_ema / LATENCY_REFERENCE_MS).min(1.0);
        let bandwidth_score = (self.bandwidth_bps_ema / BANDWIDTH_REFERENCE_BPS).min(1.0);
        weights.latency * latency_score
            + weights.success * self.success_rate_ema
            + weights.bandwidth * bandwidth_score
    }
}
