//! Priority scheduler for the periodic jobs.
//!
//! Keeps a registry of running tasks. Lower-priority tasks can be preempted
//! gracefully (their flush hook runs) and everything can be drained forcibly
//! at the end of shutdown. Tasks are taken out of the registry before any
//! cancellation work runs.

mod job;
mod task;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use job::PeriodicJob;
pub use task::{Cadence, CancelMode, ScheduledTask, TaskPriority, TaskState, TICK_WIND_DOWN};

#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScheduledTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a task. Registering the same task twice keeps two entries.
    pub fn register(&self, task: ScheduledTask) {
        tracing::debug!(task = task.name(), priority = task.priority().as_str(), "task registered");
        self.lock().push(task);
    }

    /// Start `job` on `cadence` and register it.
    pub fn schedule(
        &self,
        job: Arc<dyn PeriodicJob>,
        priority: TaskPriority,
        cadence: Cadence,
    ) -> ScheduledTask {
        let task = ScheduledTask::spawn(job, priority, cadence);
        self.register(task.clone());
        task
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered tasks, in registration order.
    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.lock().clone()
    }

    /// Gracefully cancel and remove every task with priority strictly below `base`.
    /// Returns how many were cancelled.
    pub async fn preempt_below(&self, base: TaskPriority) -> usize {
        let preempted: Vec<ScheduledTask> = {
            let mut tasks = self.lock();
            let (lower, keep): (Vec<_>, Vec<_>) =
                tasks.drain(..).partition(|t| t.priority() < base);
            *tasks = keep;
            lower
        };
        for task in &preempted {
            task.cancel_graceful().await;
        }
        tracing::info!(
            base = base.as_str(),
            count = preempted.len(),
            "preempted lower-priority tasks"
        );
        preempted.len()
    }

    /// Force-cancel every task (no flush) and clear the registry.
    pub fn drain_all(&self) -> usize {
        let drained: Vec<ScheduledTask> = std::mem::take(&mut *self.lock());
        for task in &drained {
            task.cancel_forced();
        }
        tracing::info!(count = drained.len(), "drained all tasks");
        drained.len()
    }
}
