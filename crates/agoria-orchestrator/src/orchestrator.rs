//! Worker pool: pulls tasks off the queue, selects an agent via the
//! capability index, hands the task to the external `Executor`, and feeds
//! the outcome back to reputation. Mirrors the teacher's `mpsc`-driven main
//! loop shape, generalized into N concurrent workers instead of one.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use agoria_core::AgoriaError;
use agoria_queue::{Priority, Task, TaskQueue, TaskStatus};
use agoria_reputation::{ExecutionOutcome, ReputationManager};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::executor::{Executor, ExecutorReport};
use crate::metrics::{MetricsSnapshot, OrchestratorMetrics};
use crate::selector::AgentSelector;

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub worker_count: usize,
    pub base_backoff: StdDuration,
    pub max_retry_backoff: StdDuration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            base_backoff: StdDuration::from_secs(1),
            max_retry_backoff: StdDuration::from_secs(10),
        }
    }
}

pub struct Orchestrator<E: Executor + 'static> {
    config: OrchestratorConfig,
    queue: Arc<TaskQueue>,
    selector: Arc<AgentSelector>,
    executor: Arc<E>,
    reputation: Arc<ReputationManager>,
    metrics: Arc<OrchestratorMetrics>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl<E: Executor + 'static> Orchestrator<E> {
    pub fn new(
        config: OrchestratorConfig,
        queue: Arc<TaskQueue>,
        selector: Arc<AgentSelector>,
        executor: Arc<E>,
        reputation: Arc<ReputationManager>,
    ) -> Self {
        Self {
            config,
            queue,
            selector,
            executor,
            reputation,
            metrics: Arc::new(OrchestratorMetrics::default()),
            workers: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Spawn `config.worker_count` worker loops.
    pub fn start(self: &Arc<Self>) {
        let mut workers = self.workers.lock();
        for id in 0..self.config.worker_count {
            let this = Arc::clone(self);
            workers.push(tokio::spawn(async move { this.worker_loop(id).await }));
        }
    }

    /// Stop accepting new work and wait for in-flight tasks to drain.
    pub async fn stop(&self) {
        self.queue.close();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn worker_loop(&self, worker_id: usize) {
        self.metrics.worker_started();
        info!(worker_id, "orchestrator worker started");
        while let Some(task) = self.queue.dequeue_wait().await {
            self.handle_task(task, Utc::now()).await;
        }
        self.metrics.worker_stopped();
        info!(worker_id, "orchestrator worker stopped");
    }

    pub async fn handle_task(&self, mut task: Task, now: chrono::DateTime<Utc>) {
        task.set_status(TaskStatus::Assigned, now);

        let agent_card = match self.selector.select(&task.capabilities_required, now) {
            Ok(card) => card,
            Err(err) => {
                self.handle_failure(task, err, now).await;
                return;
            }
        };
        task.assigned_to = Some(agent_card.subject.clone());
        task.set_status(TaskStatus::Running, now);

        let start = std::time::Instant::now();
        let outcome = tokio::time::timeout(task.timeout, self.executor.execute_task(&task, &agent_card)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(report)) => self.finalize_report(task, report, elapsed, now).await,
            Ok(Err(err)) => {
                self.metrics.record_failure(elapsed);
                self.handle_failure(task, err, now).await;
            }
            Err(_timed_out) => {
                self.metrics.record_timeout();
                let timeout_err = AgoriaError::ExecutionTimeout(task.timeout);
                self.handle_failure(task, timeout_err, now).await;
            }
        }
    }

    async fn finalize_report(&self, mut task: Task, report: ExecutorReport, elapsed: StdDuration, now: chrono::DateTime<Utc>) {
        task.set_status(report.status, now);
        task.result = report.result.clone();
        task.error = report.error.clone();

        let success = matches!(report.status, TaskStatus::Completed);
        if success {
            self.metrics.record_success(elapsed);
        } else {
            self.metrics.record_failure(elapsed);
        }
        self.emit_outcome(&task, success, elapsed, report.cost, report.exit_code, report.error, report.memory_used, now);
    }

    pub async fn handle_failure(&self, mut task: Task, err: AgoriaError, now: chrono::DateTime<Utc>) {
        task.error = Some(err.to_string());
        task.set_status(TaskStatus::Failed, now);

        if task.can_retry() {
            task.retry_count += 1;
            task.set_status(TaskStatus::Pending, now);
            let backoff = self.config.base_backoff.saturating_mul(task.retry_count).min(self.config.max_retry_backoff);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            if self.queue.enqueue(task.clone()).is_ok() {
                return;
            }
            warn!(task_id = %task.id, "re-enqueue failed, finalizing as failed");
            task.set_status(TaskStatus::Failed, now);
        }

        self.emit_outcome(&task, false, StdDuration::ZERO, 0, None, Some(err.to_string()), None, now);
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_outcome(
        &self,
        task: &Task,
        success: bool,
        duration: StdDuration,
        cost: u128,
        exit_code: Option<i32>,
        error: Option<String>,
        memory_used: Option<u64>,
        now: chrono::DateTime<Utc>,
    ) {
        let Some(executor_id) = task.assigned_to.clone() else {
            return;
        };
        let peer = executor_id.to_string();
        let outcome = ExecutionOutcome {
            task_id: task.id,
            executor_id,
            success,
            duration,
            cost,
            timestamp: now,
            exit_code,
            error,
            memory_used,
        };
        self.reputation.record(&peer, outcome, now);
    }
}

/// Convenience constructor for a task with a default priority of `Normal`
/// and a generous default timeout, used by callers that don't need the
/// full builder.
pub fn quick_task(task_type: &str, description: &str, capabilities: Vec<String>, input: serde_json::Value, now: chrono::DateTime<Utc>) -> Task {
    Task::new(task_type, description, capabilities, input, Priority::Normal, StdDuration::from_secs(30), 3, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agoria_cards::card::{AgentCard, AgentCardBuilder, EconomicTerms, NetworkInfo, RuntimeInfo};
    use agoria_cards::store::{CardStore, InMemoryCardStore};
    use agoria_core::did::DidType;
    use agoria_core::Did;
    use agoria_crypto::KeyPair;
    use agoria_embeddings::CapabilityIndex;
    use agoria_queue::TaskQueueConfig;
    use agoria_reputation::ReputationConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubExecutor {
        calls: AtomicUsize,
        fail_first_n: usize,
        business_fail: bool,
    }

    impl Executor for StubExecutor {
        async fn execute_task(&self, _task: &Task, _agent_card: &AgentCard) -> Result<ExecutorReport, AgoriaError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.business_fail {
                return Ok(ExecutorReport::failure("simulated business failure"));
            }
            if call < self.fail_first_n {
                Err(AgoriaError::ExecutionFailed("simulated transport failure".into()))
            } else {
                Ok(ExecutorReport::success(serde_json::json!({"ok": true}), 10))
            }
        }
    }

    fn sample_card(subject: &Did, now: chrono::DateTime<Utc>) -> AgentCard {
        let keypair = KeyPair::generate();
        AgentCardBuilder::new(subject.clone(), subject.clone(), now, now + chrono::Duration::days(1))
            .capability("demo.task")
            .runtime(RuntimeInfo {
                binary_hash: "sha256:abc".into(),
                entrypoint: "run".into(),
                max_concurrency: 1,
            })
            .economic(EconomicTerms {
                price_per_task: 1,
                currency: "AGO".into(),
            })
            .network(NetworkInfo {
                peer_id: "peer".into(),
                endpoints: vec![],
            })
            .sign(&keypair)
            .unwrap()
    }

    fn build_orchestrator(fail_first_n: usize, config: OrchestratorConfig) -> Arc<Orchestrator<StubExecutor>> {
        let now = Utc::now();
        let index = Arc::new(CapabilityIndex::new());
        let subject = Did::new("agoria", DidType::Agent, "worker-1");
        index.upsert_capabilities(&subject.to_string(), &["demo.task".to_string()]);

        let cards: Arc<dyn CardStore> = Arc::new(InMemoryCardStore::new());
        let card = sample_card(&subject, now);
        cards
            .apply_update(card, Default::default(), "test-harness".into(), now)
            .unwrap();

        let reputation = Arc::new(ReputationManager::new(ReputationConfig::default()));
        let selector = Arc::new(AgentSelector::new(index, cards, Arc::clone(&reputation)));
        let queue = Arc::new(TaskQueue::new(TaskQueueConfig::default()));
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            fail_first_n,
            business_fail: false,
        });

        Arc::new(Orchestrator::new(config, queue, selector, executor, reputation))
    }

    fn build_empty_orchestrator() -> Arc<Orchestrator<StubExecutor>> {
        let index = Arc::new(CapabilityIndex::new());
        let cards: Arc<dyn CardStore> = Arc::new(InMemoryCardStore::new());
        let reputation = Arc::new(ReputationManager::new(ReputationConfig::default()));
        let selector = Arc::new(AgentSelector::new(index, cards, Arc::clone(&reputation)));
        let queue = Arc::new(TaskQueue::new(TaskQueueConfig::default()));
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
            business_fail: false,
        });
        Arc::new(Orchestrator::new(OrchestratorConfig::default(), queue, selector, executor, reputation))
    }

    fn build_business_fail_orchestrator() -> Arc<Orchestrator<StubExecutor>> {
        let now = Utc::now();
        let index = Arc::new(CapabilityIndex::new());
        let subject = Did::new("agoria", DidType::Agent, "worker-1");
        index.upsert_capabilities(&subject.to_string(), &["demo.task".to_string()]);

        let cards: Arc<dyn CardStore> = Arc::new(InMemoryCardStore::new());
        cards
            .apply_update(sample_card(&subject, now), Default::default(), "test-harness".into(), now)
            .unwrap();

        let reputation = Arc::new(ReputationManager::new(ReputationConfig::default()));
        let selector = Arc::new(AgentSelector::new(index, cards, Arc::clone(&reputation)));
        let queue = Arc::new(TaskQueue::new(TaskQueueConfig::default()));
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
            business_fail: true,
        });
        Arc::new(Orchestrator::new(OrchestratorConfig::default(), queue, selector, executor, reputation))
    }

    #[tokio::test]
    async fn successful_task_updates_metrics_and_status() {
        let orchestrator = build_orchestrator(0, OrchestratorConfig::default());
        let now = Utc::now();
        let task = quick_task("demo", "demo task", vec!["demo.task".to_string()], serde_json::json!({}), now);
        orchestrator.handle_task(task, now).await;

        let snapshot = orchestrator.metrics();
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.tasks_failed, 0);
    }

    #[tokio::test]
    async fn missing_capability_records_no_suitable_agent_failure() {
        let orchestrator = build_empty_orchestrator();
        let now = Utc::now();
        let task = quick_task("demo", "demo task", vec!["nonexistent.capability".to_string()], serde_json::json!({}), now);
        orchestrator.handle_task(task, now).await;

        // No executor call was ever made (metrics only count executor-level outcomes).
        let snapshot = orchestrator.metrics();
        assert_eq!(snapshot.tasks_processed, 0);
    }

    #[tokio::test]
    async fn business_level_failure_is_terminal_without_retry() {
        // A `Failed` status reported by a successfully-called Executor is
        // final: only executor-level errors/timeouts go through the retry
        // path in `handle_failure`.
        let orchestrator = build_business_fail_orchestrator();
        let now = Utc::now();
        let mut task = quick_task("demo", "demo task", vec!["demo.task".to_string()], serde_json::json!({}), now);
        task.max_retries = 5;
        orchestrator.handle_task(task, now).await;

        assert!(orchestrator.queue.is_empty());
        let snapshot = orchestrator.metrics();
        assert_eq!(snapshot.tasks_failed, 1);
    }

    #[tokio::test]
    async fn retry_eventually_succeeds() {
        let config = OrchestratorConfig {
            base_backoff: StdDuration::from_millis(1),
            max_retry_backoff: StdDuration::from_millis(2),
            ..OrchestratorConfig::default()
        };
        let orchestrator = build_orchestrator(1, config);
        let now = Utc::now();

        let task = quick_task("demo", "demo task", vec!["demo.task".to_string()], serde_json::json!({}), now);
        orchestrator.handle_task(task, now).await;

        let requeued = orchestrator.queue.dequeue_wait().await.unwrap();
        assert_eq!(requeued.status, TaskStatus::Pending);
        assert_eq!(requeued.retry_count, 1);
        orchestrator.handle_task(requeued, now).await;

        let snapshot = orchestrator.metrics();
        assert_eq!(snapshot.tasks_succeeded, 1);
    }
}
