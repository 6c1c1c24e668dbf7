use agoria_core::ids::TaskId;
use agoria_core::Did;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single completed (or failed) task execution, as reported by the
/// orchestrator after an Executor call returns or times out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub task_id: TaskId,
    pub executor_id: Did,
    pub success: bool,
    pub duration: std::time::Duration,
    pub cost: u128,
    pub timestamp: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub memory_used: Option<u64>,
}
