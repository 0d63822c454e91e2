//! Per-operation-class call budget shared by everything that talks to the source.
//!
//! The source reports `remaining` and `reset_at` with each response; callers
//! report those here after every call and `await_budget` before the next one.
//! When the remaining budget hits zero the caller sleeps until the reset time.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::source::{OperationClass, RateLimitInfo};

/// Extra wait past the reported reset so the first call after it isn't rejected.
pub const DEFAULT_RESET_MARGIN: Duration = Duration::from_secs(5);

/// Last known budget for one operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetEntry {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Calls reported for this class since startup.
    pub calls: u64,
    /// Times the budget was found exhausted (reported 0 or rejected with 429).
    pub exhausted_events: u32,
}

#[derive(Debug)]
pub struct RateLimitCoordinator {
    entries: Mutex<HashMap<OperationClass, BudgetEntry>>,
    reset_margin: Duration,
}

impl Default for RateLimitCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_MARGIN)
    }
}

impl RateLimitCoordinator {
    pub fn new(reset_margin: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            reset_margin,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OperationClass, BudgetEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the budget reported with a response for `class`.
    pub fn report_usage(&self, class: OperationClass, info: &RateLimitInfo) {
        let mut entries = self.lock();
        let entry = entries.entry(class).or_insert(BudgetEntry {
            remaining: info.remaining,
            reset_at: info.reset_at,
            calls: 0,
            exhausted_events: 0,
        });
        entry.remaining = info.remaining;
        entry.reset_at = info.reset_at;
        entry.calls = entry.calls.saturating_add(1);
        if info.remaining == 0 {
            entry.exhausted_events = entry.exhausted_events.saturating_add(1);
        }
        tracing::trace!(
            class = class.as_str(),
            remaining = info.remaining,
            reset_at = %info.reset_at,
            "rate limit reported"
        );
    }

    /// Record that the source rejected a call for `class` until `reset_at`.
    pub fn record_rate_limited(&self, class: OperationClass, reset_at: DateTime<Utc>) {
        self.report_usage(
            class,
            &RateLimitInfo {
                class,
                remaining: 0,
                reset_at,
            },
        );
    }

    pub fn get(&self, class: OperationClass) -> Option<BudgetEntry> {
        self.lock().get(&class).copied()
    }

    /// How long a caller must wait before the next `class` call, if at all.
    pub fn wait_time(&self, class: OperationClass, now: DateTime<Utc>) -> Option<Duration> {
        let entry = self.get(class)?;
        if entry.remaining > 0 || entry.reset_at <= now {
            return None;
        }
        let until_reset = (entry.reset_at - now).to_std().unwrap_or_default();
        Some(until_reset + self.reset_margin)
    }

    /// Suspend until the budget for `class` is available again.
    ///
    /// Returns immediately when budget remains or nothing is known yet. The lock
    /// is never held while sleeping.
    pub async fn await_budget(&self, class: OperationClass) {
        if let Some(wait) = self.wait_time(class, Utc::now()) {
            tracing::info!(
                class = class.as_str(),
                wait_secs = wait.as_secs(),
                "rate limit exhausted, waiting for reset"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
