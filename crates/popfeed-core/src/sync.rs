//! Diff-based reconciliation of the cache with the store.
//!
//! For every item id in either side: present in both with different scores
//! → update; cache only → insert (and hand the new storage id back to the
//! cache); store only → delete. A failed write is logged and skipped, the
//! rest of the pass continues.

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::cache::ScoreCache;
use crate::item::{ItemId, ScoredItem};
use crate::store::{PersistedRecord, Store};

/// What one synchronize pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn writes(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

pub struct Synchronizer {
    store: Arc<dyn Store>,
    cache: Arc<ScoreCache>,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn Store>, cache: Arc<ScoreCache>) -> Self {
        Self { store, cache }
    }

    /// Snapshot the cache, re-read the store's current period, reconcile.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let snapshot = self.cache.snapshot().await;
        let persisted = self
            .store
            .read_current_period()
            .await
            .context("read current period from store")?;
        Ok(self.synchronize(&snapshot, persisted).await)
    }

    /// Reconcile a cache snapshot with a persisted snapshot.
    ///
    /// Ids are visited in ascending order so runs are reproducible.
    pub async fn synchronize(
        &self,
        snapshot: &HashMap<ItemId, ScoredItem>,
        persisted: Vec<PersistedRecord>,
    ) -> SyncReport {
        let persisted: HashMap<ItemId, PersistedRecord> =
            persisted.into_iter().map(|r| (r.id, r)).collect();
        let ids: BTreeSet<ItemId> = snapshot.keys().chain(persisted.keys()).copied().collect();

        let mut report = SyncReport::default();
        for id in ids {
            match (snapshot.get(&id), persisted.get(&id)) {
                (Some(item), Some(record)) => {
                    if item.score == record.score {
                        continue;
                    }
                    match self.store.update(id, item.score).await {
                        Ok(()) => report.updated += 1,
                        Err(e) => {
                            tracing::warn!(item = %id, error = %e, "store update failed");
                            report.failed += 1;
                        }
                    }
                }
                (Some(item), None) => match self.store.insert(item).await {
                    Ok(storage_id) => {
                        report.inserted += 1;
                        if !self.cache.assign_storage_id(id, storage_id).await {
                            tracing::debug!(item = %id, storage_id, "item left the cache before write-back");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(item = %id, error = %e, "store insert failed");
                        report.failed += 1;
                    }
                },
                (None, Some(_)) => match self.store.delete(id).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        tracing::warn!(item = %id, error = %e, "store delete failed");
                        report.failed += 1;
                    }
                },
                (None, None) => {}
            }
        }

        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            failed = report.failed,
            "synchronized cache with store"
        );
        report
    }
}
