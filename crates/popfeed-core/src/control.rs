//! Cooperative cancellation shared between the scheduler and running jobs.
//!
//! A job checks `is_cancelled` between units of work (pages, ticks) and can
//! `await` `cancelled()` to wake out of a sleep. Whoever holds a clone may
//! request cancellation; the request is sticky.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Error returned by work that stopped because its token was cancelled.
#[derive(Debug, thiserror::Error)]
#[error("task cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel isn't missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `fut` unless cancelled first. `Err(Cancelled)` when the token won.
    pub async fn run_until_cancelled<F, T>(&self, fut: F) -> Result<T, Cancelled>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }
}
