//! Bounded, author-deduplicated cache of the highest-scoring items.
//!
//! Holds at most one item per author and at most `capacity` items once an
//! eviction pass finishes. Eviction first revalidates stale entries against
//! the source (dropping deleted ones, refreshing the rest) and only then trims
//! by score. The cache owns the `MinScoreThreshold` and republishes it after
//! every change.
//!
//! The internal maps sit behind one async mutex held for the duration of a
//! single operation. Source lookups happen with the lock released.

mod revalidate;
mod state;
mod threshold;

use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;

use crate::control::CancelToken;
use crate::item::{ItemId, ScoredItem, StorageId};

use state::CacheState;

pub use revalidate::{RevalidationReport, Revalidator};
pub use state::UpsertOutcome;
pub use threshold::MinScoreThreshold;

/// Counts from one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub revalidation: RevalidationReport,
    pub trimmed: usize,
    pub remaining: usize,
}

pub struct ScoreCache {
    state: tokio::sync::Mutex<CacheState>,
    threshold: MinScoreThreshold,
    stale_after: Duration,
    revalidator: Revalidator,
}

impl ScoreCache {
    pub fn new(capacity: usize, stale_after: Duration, revalidator: Revalidator) -> Self {
        Self {
            state: tokio::sync::Mutex::new(CacheState::new(capacity)),
            threshold: MinScoreThreshold::default(),
            stale_after,
            revalidator,
        }
    }

    /// Handle to the cache's minimum score; stays live as the cache changes.
    pub fn threshold(&self) -> MinScoreThreshold {
        self.threshold.clone()
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn capacity(&self) -> usize {
        self.state.lock().await.capacity()
    }

    pub async fn is_full(&self) -> bool {
        self.state.lock().await.at_capacity()
    }

    /// Number of changes applied since construction (inserts, updates, removals).
    pub async fn mutation_count(&self) -> u64 {
        self.state.lock().await.mutations()
    }

    pub async fn get(&self, id: ItemId) -> Option<ScoredItem> {
        self.state.lock().await.get(id).cloned()
    }

    fn publish_threshold(&self, state: &CacheState) {
        self.threshold
            .publish(state.min_score(), state.at_capacity());
    }

    /// Offer a candidate. Same item: score refresh. Same author: replace only if
    /// strictly better. Otherwise insert, then evict if over capacity.
    pub async fn upsert(&self, candidate: ScoredItem) -> UpsertOutcome {
        self.upsert_cancellable(candidate, &CancelToken::new()).await
    }

    /// `upsert` whose eviction stops issuing lookups once `cancel` fires.
    pub async fn upsert_cancellable(
        &self,
        candidate: ScoredItem,
        cancel: &CancelToken,
    ) -> UpsertOutcome {
        let id = candidate.id;
        let score = candidate.score;
        let (outcome, over_capacity) = {
            let mut state = self.state.lock().await;
            let outcome = state.upsert(candidate);
            if outcome.is_mutation() {
                self.publish_threshold(&state);
            }
            (outcome, state.over_capacity())
        };

        match outcome {
            UpsertOutcome::Inserted => tracing::debug!(item = %id, score, "item added to cache"),
            UpsertOutcome::Updated { previous_score } => {
                tracing::debug!(item = %id, score, previous_score, "item score updated")
            }
            UpsertOutcome::Replaced { incumbent } => {
                tracing::debug!(item = %id, score, %incumbent, "author's item replaced")
            }
            UpsertOutcome::Discarded | UpsertOutcome::Unchanged => {}
        }

        if outcome.is_insertion() && over_capacity {
            self.evict_cancellable(cancel).await;
        }
        outcome
    }

    /// Revalidate stale items, trim to capacity by score, republish the threshold.
    pub async fn evict(&self) -> EvictionReport {
        self.evict_cancellable(&CancelToken::new()).await
    }

    /// `evict` that skips the remaining lookups once `cancel` fires. Trimming
    /// still runs; it needs no upstream call.
    pub async fn evict_cancellable(&self, cancel: &CancelToken) -> EvictionReport {
        let revalidation = self.revalidate_cancellable(self.stale_after, cancel).await;

        let mut state = self.state.lock().await;
        let trimmed = state.trim();
        for item in &trimmed {
            tracing::debug!(item = %item.id, score = item.score, link = %item.link, "item evicted");
        }
        self.publish_threshold(&state);

        let report = EvictionReport {
            revalidation,
            trimmed: trimmed.len(),
            remaining: state.len(),
        };
        tracing::debug!(
            trimmed = report.trimmed,
            remaining = report.remaining,
            min_score = ?self.threshold.current(),
            "eviction pass complete"
        );
        report
    }

    /// Look up every item not refreshed within `stale_after`.
    ///
    /// Not-found items are removed immediately; found items get their score and
    /// fetched_at refreshed in place; any other failure leaves the item as is
    /// so the next pass retries it.
    pub async fn revalidate(&self, stale_after: Duration) -> RevalidationReport {
        self.revalidate_cancellable(stale_after, &CancelToken::new())
            .await
    }

    /// `revalidate` that issues no new lookup once `cancel` fires, including
    /// while waiting for lookup budget.
    pub async fn revalidate_cancellable(
        &self,
        stale_after: Duration,
        cancel: &CancelToken,
    ) -> RevalidationReport {
        let stale = self.state.lock().await.stale_ids(Utc::now(), stale_after);
        let mut report = RevalidationReport::default();

        for (i, &id) in stale.iter().enumerate() {
            let result = match self.revalidator.lookup(id, cancel).await {
                Ok(result) => result,
                Err(_) => {
                    report.skipped = stale.len() - i;
                    tracing::debug!(skipped = report.skipped, "revalidation cancelled");
                    break;
                }
            };
            report.checked += 1;
            let mut state = self.state.lock().await;
            match result {
                Ok(found) => {
                    if state.refresh(id, found.score(), Utc::now()) {
                        report.refreshed += 1;
                    }
                }
                Err(e) if e.is_not_found() => {
                    if let Some(removed) = state.remove(id) {
                        tracing::info!(item = %id, link = %removed.link, "item removed upstream, evicted");
                        report.removed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(item = %id, error = %e, "revalidation lookup failed");
                    report.failed += 1;
                }
            }
        }

        if report.refreshed > 0 || report.removed > 0 {
            let state = self.state.lock().await;
            self.publish_threshold(&state);
        }
        report
    }

    /// Point-in-time copy of every cached item.
    pub async fn snapshot(&self) -> HashMap<ItemId, ScoredItem> {
        self.state.lock().await.snapshot()
    }

    /// Record the store's id for an item. An id already set is never replaced.
    ///
    /// Returns false if the item has left the cache in the meantime.
    pub async fn assign_storage_id(&self, id: ItemId, storage_id: StorageId) -> bool {
        let mut state = self.state.lock().await;
        match state.assign_storage_id(id, storage_id) {
            Some(current) if current != storage_id => {
                tracing::warn!(item = %id, current, rejected = storage_id, "storage id already assigned");
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Seed the cache from persisted items (startup). Dedup rules apply; the
    /// result is trimmed to capacity without revalidation.
    pub async fn warm(&self, items: Vec<ScoredItem>) -> usize {
        let mut state = self.state.lock().await;
        for item in items {
            state.restore(item);
        }
        state.trim();
        self.publish_threshold(&state);
        state.len()
    }
}

#[cfg(test)]
mod tests;
