//! One periodic job on its own tokio task, with a priority and a lifecycle.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::control::CancelToken;

use super::job::PeriodicJob;

/// How long a graceful cancel waits for an in-flight tick before aborting it.
pub const TICK_WIND_DOWN: Duration = Duration::from_secs(30);

/// Ordered: a higher priority preempts a lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
        }
    }
}

/// How the task was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Flush hook ran.
    Graceful,
    /// Aborted without flushing.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Registered,
    Running,
    Cancelled(CancelMode),
}

/// Fixed-delay cadence: the next tick starts `period` after the previous one ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub initial_delay: Duration,
    pub period: Duration,
}

impl Cadence {
    pub fn new(initial_delay: Duration, period: Duration) -> Self {
        Self {
            initial_delay,
            period,
        }
    }
}

/// Cheap to clone; clones share the state, cancel token, and task handle.
#[derive(Clone)]
pub struct ScheduledTask {
    job: Arc<dyn PeriodicJob>,
    priority: TaskPriority,
    cadence: Cadence,
    cancel: CancelToken,
    state: Arc<Mutex<TaskState>>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.job.name())
            .field("priority", &self.priority)
            .field("cadence", &self.cadence)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScheduledTask {
    pub fn new(job: Arc<dyn PeriodicJob>, priority: TaskPriority, cadence: Cadence) -> Self {
        Self {
            job,
            priority,
            cadence,
            cancel: CancelToken::new(),
            state: Arc::new(Mutex::new(TaskState::Registered)),
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Create and start in one step.
    pub fn spawn(job: Arc<dyn PeriodicJob>, priority: TaskPriority, cadence: Cadence) -> Self {
        let task = Self::new(job, priority, cadence);
        task.start();
        task
    }

    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn state(&self) -> TaskState {
        *lock(&self.state)
    }

    /// Spawn the tick loop. No-op unless the task is still `Registered`.
    pub fn start(&self) {
        {
            let mut state = lock(&self.state);
            if *state != TaskState::Registered {
                return;
            }
            *state = TaskState::Running;
        }
        let job = Arc::clone(&self.job);
        let cancel = self.cancel.clone();
        let cadence = self.cadence;
        let handle = tokio::spawn(run_loop(job, cadence, cancel));
        *lock(&self.handle) = Some(handle);
        tracing::debug!(
            task = self.name(),
            priority = self.priority.as_str(),
            initial_delay_secs = cadence.initial_delay.as_secs(),
            period_secs = cadence.period.as_secs(),
            "task started"
        );
    }

    /// Stop future ticks, wait for the tick loop to exit, run the flush hook,
    /// mark `Cancelled(Graceful)`.
    ///
    /// A tick still running after [`TICK_WIND_DOWN`] is aborted, so the flush
    /// never overlaps tick work.
    pub async fn cancel_graceful(&self) {
        if matches!(self.state(), TaskState::Cancelled(_)) {
            return;
        }
        self.cancel.cancel();
        let handle = lock(&self.handle).take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(TICK_WIND_DOWN, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    tracing::error!(task = self.name(), error = %e, "task loop ended abnormally")
                }
                Err(_) => {
                    tracing::warn!(
                        task = self.name(),
                        wind_down_secs = TICK_WIND_DOWN.as_secs(),
                        "tick still running after cancel, aborting"
                    );
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }
        match AssertUnwindSafe(self.job.flush()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(task = self.name(), error = %e, "flush failed"),
            Err(_) => tracing::error!(task = self.name(), "flush panicked"),
        }
        *lock(&self.state) = TaskState::Cancelled(CancelMode::Graceful);
        tracing::info!(task = self.name(), "task cancelled gracefully");
    }

    /// Stop and abort the task without flushing; mark `Cancelled(Forced)`.
    pub fn cancel_forced(&self) {
        self.cancel.cancel();
        if let Some(handle) = lock(&self.handle).take() {
            handle.abort();
        }
        let mut state = lock(&self.state);
        if !matches!(*state, TaskState::Cancelled(_)) {
            *state = TaskState::Cancelled(CancelMode::Forced);
            tracing::info!(task = self.name(), "task cancelled forcibly");
        }
    }

    /// Wait for the tick loop to exit (after a cancel).
    pub async fn join(&self) {
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!(task = self.name(), error = %e, "task loop ended abnormally");
                }
            }
        }
    }
}

async fn run_loop(job: Arc<dyn PeriodicJob>, cadence: Cadence, cancel: CancelToken) {
    if cancel
        .run_until_cancelled(tokio::time::sleep(cadence.initial_delay))
        .await
        .is_err()
    {
        return;
    }
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match AssertUnwindSafe(job.tick(&cancel)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(task = job.name(), error = %e, "tick failed"),
            Err(_) => tracing::error!(task = job.name(), "tick panicked"),
        }
        if cancel
            .run_until_cancelled(tokio::time::sleep(cadence.period))
            .await
            .is_err()
        {
            break;
        }
    }
    tracing::debug!(task = job.name(), "task loop exited");
}
