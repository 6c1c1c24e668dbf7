//! Multi-factor reputation scoring: a bounded ring of recent outcomes feeds
//! success/speed/cost components, blended with a longevity term and decayed
//! toward zero the longer a peer has gone unobserved.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::outcome::ExecutionOutcome;

pub const DEFAULT_MIN_TASKS_FOR_SCORE: u64 = 5;
pub const DEFAULT_OUTCOME_RING_CAPACITY: usize = 64;
pub const DEFAULT_NEUTRAL_SCORE: f64 = 0.5;
pub const DEFAULT_BLACKLIST_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub success: f64,
    pub speed: f64,
    pub cost: f64,
    pub longevity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            success: 0.50,
            speed: 0.20,
            cost: 0.20,
            longevity: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReputationConfig {
    pub weights: ScoreWeights,
    pub min_tasks_for_score: u64,
    pub baseline_duration: std::time::Duration,
    pub baseline_cost: u128,
    pub half_life: Duration,
    pub decay_enabled: bool,
    pub blacklist_threshold: f64,
    pub blacklist_duration: Duration,
    pub outcome_ring_capacity: usize,
    /// Peers whose score hasn't been refreshed within this window are
    /// treated as stale and sorted after fresh peers of equal score.
    pub staleness_window: Duration,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            min_tasks_for_score: DEFAULT_MIN_TASKS_FOR_SCORE,
            baseline_duration: std::time::Duration::from_secs(30),
            baseline_cost: 1,
            half_life: Duration::days(7),
            decay_enabled: true,
            blacklist_threshold: DEFAULT_BLACKLIST_THRESHOLD,
            blacklist_duration: Duration::hours(24),
            outcome_ring_capacity: DEFAULT_OUTCOME_RING_CAPACITY,
            staleness_window: Duration::hours(1),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Running reputation state for a single peer. Holds a bounded ring of
/// recent outcomes plus lifetime counters; the ring feeds the success/speed/
/// cost components while the counters gate the neutral-score threshold.
#[derive(Debug, Clone)]
pub struct ReputationScore {
    outcomes: VecDeque<ExecutionOutcome>,
    ring_capacity: usize,
    tasks_completed: u64,
    tasks_failed: u64,
    first_seen: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    blacklisted_until: Option<DateTime<Utc>>,
}

impl ReputationScore {
    pub fn new(now: DateTime<Utc>, ring_capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(ring_capacity),
            ring_capacity,
            tasks_completed: 0,
            tasks_failed: 0,
            first_seen: now,
            last_updated: now,
            blacklisted_until: None,
        }
    }

    pub fn record(&mut self, outcome: ExecutionOutcome, now: DateTime<Utc>) {
        if outcome.success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        if self.outcomes.len() == self.ring_capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome);
        self.last_updated = now;
    }

    pub fn sample_count(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }

    pub fn is_stale(&self, now: DateTime<Utc>, staleness_window: Duration) -> bool {
        now - self.last_updated > staleness_window
    }

    /// Lazily resolve blacklist state: an expired entry clears itself.
    pub fn is_blacklisted(&mut self, now: DateTime<Utc>) -> bool {
        match self.blacklisted_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.blacklisted_until = None;
                false
            }
            None => false,
        }
    }

    pub fn score(&self, now: DateTime<Utc>, config: &ReputationConfig) -> f64 {
        if self.sample_count() < config.min_tasks_for_score {
            return DEFAULT_NEUTRAL_SCORE;
        }

        let success_rate = self.tasks_completed as f64 / self.sample_count() as f64;

        let avg_duration_secs: f64 = {
            let total: f64 = self.outcomes.iter().map(|o| o.duration.as_secs_f64()).sum();
            if self.outcomes.is_empty() {
                config.baseline_duration.as_secs_f64()
            } else {
                total / self.outcomes.len() as f64
            }
        };
        let baseline_duration_secs = config.baseline_duration.as_secs_f64().max(f64::EPSILON);
        let speed_component = sigmoid(2.0 * (baseline_duration_secs / avg_duration_secs.max(f64::EPSILON) - 1.0));

        let avg_cost: f64 = {
            let total: f64 = self.outcomes.iter().map(|o| o.cost as f64).sum();
            if self.outcomes.is_empty() {
                config.baseline_cost as f64
            } else {
                total / self.outcomes.len() as f64
            }
        };
        let baseline_cost = (config.baseline_cost as f64).max(f64::EPSILON);
        let cost_component = sigmoid(2.0 * (baseline_cost / avg_cost.max(f64::EPSILON) - 1.0));

        let days_since_first_seen = (now - self.first_seen).num_seconds() as f64 / 86_400.0;
        let longevity_component = (days_since_first_seen / 30.0).tanh();

        let w = config.weights;
        let raw = w.success * success_rate
            + w.speed * speed_component
            + w.cost * cost_component
            + w.longevity * longevity_component;

        let decayed = if config.decay_enabled {
            let half_lives = (now - self.last_updated).num_seconds() as f64 / config.half_life.num_seconds().max(1) as f64;
            raw * 0.5_f64.powf(half_lives)
        } else {
            raw
        };

        decayed.clamp(0.0, 1.0)
    }

    /// Re-evaluate the score and update the blacklist window if it falls
    /// below threshold. Call after each `record`.
    pub fn refresh_blacklist(&mut self, now: DateTime<Utc>, config: &ReputationConfig) {
        if self.sample_count() < config.min_tasks_for_score {
            return;
        }
        let score = self.score(now, config);
        if score < config.blacklist_threshold {
            self.blacklisted_until = Some(now + config.blacklist_duration);
        }
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_core::ids::TaskId;
    use agoria_core::did::DidType;
    use agoria_core::Did;

    fn outcome(success: bool, duration_secs: u64, cost: u128, now: DateTime<Utc>) -> ExecutionOutcome {
        ExecutionOutcome {
            task_id: TaskId::new(),
            executor_id: Did::new("agoria", DidType::Agent, "exec"),
            success,
            duration: std::time::Duration::from_secs(duration_secs),
            cost,
            timestamp: now,
            exit_code: Some(0),
            error: None,
            memory_used: None,
        }
    }

    #[test]
    fn below_min_samples_stays_neutral() {
        let now = Utc::now();
        let mut score = ReputationScore::new(now, 64);
        score.record(outcome(true, 1, 10, now), now);
        let config = ReputationConfig::default();
        assert_eq!(score.score(now, &config), DEFAULT_NEUTRAL_SCORE);
    }

    #[test]
    fn consistent_success_scores_above_neutral() {
        let now = Utc::now();
        let mut score = ReputationScore::new(now, 64);
        let config = ReputationConfig::default();
        for _ in 0..10 {
            score.record(outcome(true, 2, 50, now), now);
        }
        assert!(score.score(now, &config) > DEFAULT_NEUTRAL_SCORE);
    }

    #[test]
    fn heavy_failures_trigger_blacklist() {
        let now = Utc::now();
        let mut score = ReputationScore::new(now, 64);
        let config = ReputationConfig::default();
        for _ in 0..10 {
            score.record(outcome(false, 20, 500, now), now);
        }
        score.refresh_blacklist(now, &config);
        assert!(score.is_blacklisted(now));
    }

    #[test]
    fn blacklist_expires_after_duration() {
        let now = Utc::now();
        let mut score = ReputationScore::new(now, 64);
        let config = ReputationConfig::default();
        for _ in 0..10 {
            score.record(outcome(false, 20, 500, now), now);
        }
        score.refresh_blacklist(now, &config);
        assert!(!score.is_blacklisted(now + config.blacklist_duration + Duration::seconds(1)));
    }
}
