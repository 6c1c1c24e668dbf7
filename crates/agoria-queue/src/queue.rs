//! Four-level priority queue. Each lane is FIFO by insertion (which, since
//! tasks are appended in `created_at` order, also orders by `created_at`
//! ascending); dequeue drains the highest non-empty lane first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use agoria_core::ids::TaskId;
use agoria_core::AgoriaError;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::task::{Priority, Task, TaskStatus};

const LANES: usize = 4;

pub struct TaskQueueConfig {
    pub capacity: usize,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

struct Inner {
    tasks: HashMap<TaskId, Task>,
    lanes: [VecDeque<TaskId>; LANES],
}

impl Inner {
    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn pop_highest(&mut self) -> Option<Task> {
        for lane in self.lanes.iter_mut() {
            if let Some(id) = lane.pop_front() {
                return self.tasks.remove(&id);
            }
        }
        None
    }

    /// Evict the single oldest task from the lowest-priority non-empty
    /// lane, to make room under a capacity overflow.
    fn evict_oldest_lowest_priority(&mut self) {
        for lane in self.lanes.iter_mut().rev() {
            if let Some(id) = lane.pop_front() {
                self.tasks.remove(&id);
                return;
            }
        }
    }
}

pub struct TaskQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new(config: TaskQueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: HashMap::new(),
                lanes: Default::default(),
            }),
            notify: Notify::new(),
            capacity: config.capacity,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    /// Stop accepting new tasks and wake every blocked `dequeue_wait`.
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::Release);
        self.notify.notify_waiters();
    }

    /// Non-blocking, bounded. Evicts the oldest lowest-priority task when
    /// at capacity rather than rejecting the new one.
    pub fn enqueue(&self, task: Task) -> Result<(), AgoriaError> {
        if self.is_closed() {
            return Err(AgoriaError::QueueClosed);
        }
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            inner.evict_oldest_lowest_priority();
        }
        let rank = task.priority.rank();
        let id = task.id;
        inner.tasks.insert(id, task);
        inner.lanes[rank].push_back(id);
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    fn try_dequeue(&self) -> Option<Task> {
        self.inner.lock().pop_highest()
    }

    /// Blocks until a task is available or the queue is closed, in which
    /// case `None` is returned once the backlog is drained.
    pub async fn dequeue_wait(&self) -> Option<Task> {
        loop {
            if let Some(task) = self.try_dequeue() {
                return Some(task);
            }
            if self.is_closed() {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Mutate a still-queued task's mutable fields in place without
    /// reordering its position in its lane.
    pub fn update(&self, id: TaskId, f: impl FnOnce(&mut Task)) -> Result<(), AgoriaError> {
        let mut inner = self.inner.lock();
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or_else(|| AgoriaError::InvalidField(format!("unknown task {id}")))?;
        f(task);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
