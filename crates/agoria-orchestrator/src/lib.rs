pub mod executor;
pub mod metrics;
pub mod orchestrator;
pub mod selector;

pub use executor::{Executor, ExecutorReport};
pub use metrics::{MetricsSnapshot, OrchestratorMetrics};
pub use orchestrator::{quick_task, Orchestrator, OrchestratorConfig};
pub use selector::AgentSelector;
