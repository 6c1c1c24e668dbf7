use agoria_core::ids::TaskId;
use agoria_core::Did;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Index into the queue's 4 priority lanes, 0 = highest.
    pub(crate) fn rank(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: String,
    pub description: String,
    pub capabilities_required: Vec<String>,
    pub input: serde_json::Value,
    pub priority: Priority,
    pub timeout: std::time::Duration,
    pub max_retries: u32,
    pub retry_count: u32,
    pub status: TaskStatus,
    pub assigned_to: Option<Did>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status_history: Vec<(TaskStatus, DateTime<Utc>)>,
}

impl Task {
    pub fn new(
        task_type: impl Into<String>,
        description: impl Into<String>,
        capabilities_required: Vec<String>,
        input: serde_json::Value,
        priority: Priority,
        timeout: std::time::Duration,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            task_type: task_type.into(),
            description: description.into(),
            capabilities_required,
            input,
            priority,
            timeout,
            max_retries,
            retry_count: 0,
            status: TaskStatus::Pending,
            assigned_to: None,
            result: None,
            error: None,
            created_at: now,
            status_history: vec![(TaskStatus::Pending, now)],
        }
    }

    /// Monotonic transition, except `Failed -> Pending` on retry.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.status_history.push((status, now));
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries && self.status == TaskStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending_with_one_history_entry() {
        let now = Utc::now();
        let task = Task::new("echo", "demo", vec!["shell".into()], serde_json::json!({}), Priority::Normal, std::time::Duration::from_secs(30), 3, now);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.status_history.len(), 1);
    }

    #[test]
    fn can_retry_requires_failed_status_and_remaining_budget() {
        let now = Utc::now();
        let mut task = Task::new("echo", "demo", vec![], serde_json::json!({}), Priority::Normal, std::time::Duration::from_secs(30), 2, now);
        assert!(!task.can_retry());
        task.set_status(TaskStatus::Failed, now);
        assert!(task.can_retry());
        task.retry_count = 2;
        assert!(!task.can_retry());
    }

    #[test]
    fn priority_ordering_is_critical_highest() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
