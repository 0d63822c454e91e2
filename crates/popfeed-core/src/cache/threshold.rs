//! Shared handle to the cache's minimum score.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

const UNSET: u64 = u64::MAX;

/// Minimum score among cached items, owned by the cache and readable anywhere.
///
/// Cloning yields another handle to the same value.
#[derive(Debug, Clone)]
pub struct MinScoreThreshold {
    min: Arc<AtomicU64>,
    at_capacity: Arc<AtomicBool>,
}

impl Default for MinScoreThreshold {
    fn default() -> Self {
        Self {
            min: Arc::new(AtomicU64::new(UNSET)),
            at_capacity: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MinScoreThreshold {
    /// Lowest cached score, or None while the cache is empty.
    pub fn current(&self) -> Option<u64> {
        match self.min.load(Ordering::Acquire) {
            UNSET => None,
            v => Some(v),
        }
    }

    /// Score a new candidate must reach to stand a chance of surviving eviction.
    ///
    /// None while the cache still has free slots: anything can get in then.
    pub fn admission(&self) -> Option<u64> {
        if self.at_capacity.load(Ordering::Acquire) {
            self.current()
        } else {
            None
        }
    }

    pub(super) fn publish(&self, min: Option<u64>, at_capacity: bool) {
        self.min.store(min.unwrap_or(UNSET), Ordering::Release);
        self.at_capacity.store(at_capacity, Ordering::Release);
    }
}
