use agoria_cards::card::AgentCard;
use agoria_core::AgoriaError;
use agoria_queue::{Task, TaskStatus};

/// What an `Executor` reports back after running (or failing to run) a task.
/// `status` must be `Completed` or `Failed` — the orchestrator treats any
/// other value as a programming error on the executor's part.
#[derive(Debug, Clone)]
pub struct ExecutorReport {
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub cost: u128,
    pub memory_used: Option<u64>,
}

impl ExecutorReport {
    pub fn success(result: serde_json::Value, cost: u128) -> Self {
        Self {
            status: TaskStatus::Completed,
            result: Some(result),
            error: None,
            exit_code: Some(0),
            cost,
            memory_used: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
            exit_code: None,
            cost: 0,
            memory_used: None,
        }
    }
}

/// The boundary the orchestrator calls through to actually run a task
/// against the selected agent. Implementations are expected to honor the
/// deadline the orchestrator imposes via `tokio::time::timeout` around the
/// call — this trait itself carries no timeout logic.
pub trait Executor: Send + Sync {
    fn execute_task(
        &self,
        task: &Task,
        agent_card: &AgentCard,
    ) -> impl std::future::Future<Output = Result<ExecutorReport, AgoriaError>> + Send;
}
