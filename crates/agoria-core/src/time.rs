use chrono::{DateTime, Utc};

/// Injectable source of wall-clock time.
///
/// Components that must reason about TTLs, expiry, or decay (guild
/// membership, channel expiry, reputation half-life, Q-routing staleness)
/// take a `Clock` rather than calling `Utc::now()` directly, so tests can
/// script deterministic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_unix(&self) -> i64 {
        self.now().timestamp()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns a fixed instant, for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
