pub mod queue;
pub mod task;

pub use queue::{TaskQueue, TaskQueueConfig};
pub use task::{Priority, Task, TaskStatus};
