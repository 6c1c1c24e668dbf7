use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Rolling orchestrator counters. `avg_execution_time` is a simple mean over
/// all completed calls (successes and failures both feed the sum/count),
/// recomputed on read rather than kept as a separate EMA.
#[derive(Default)]
pub struct OrchestratorMetrics {
    tasks_processed: AtomicU64,
    tasks_succeeded: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_timed_out: AtomicU64,
    total_execution_nanos: AtomicU64,
    active_workers: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub tasks_processed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_timed_out: u64,
    pub avg_execution_time: std::time::Duration,
    pub active_workers: usize,
}

impl OrchestratorMetrics {
    pub fn record_success(&self, duration: std::time::Duration) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_execution_nanos.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, duration: std::time::Duration) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.total_execution_nanos.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_stopped(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.tasks_processed.load(Ordering::Relaxed);
        let avg = if processed == 0 {
            std::time::Duration::ZERO
        } else {
            std::time::Duration::from_nanos(self.total_execution_nanos.load(Ordering::Relaxed) / processed)
        };
        MetricsSnapshot {
            tasks_processed: processed,
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_timed_out: self.tasks_timed_out.load(Ordering::Relaxed),
            avg_execution_time: avg,
            active_workers: self.active_workers.load(Ordering::Relaxed),
        }
    }
}
