//! In-process fakes for the source client and the store (unit tests only).

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::cache::{Revalidator, ScoreCache};
use crate::item::{ItemId, RawItem, ScoredItem, StorageId};
use crate::rate_limit::RateLimitCoordinator;
use crate::source::{LookupResult, SearchPage, SearchQuery, SourceClient, SourceError};
use crate::store::{PersistedRecord, Store};

/// Scripted source: search pages are served in order, lookups by id.
#[derive(Default)]
pub struct FakeSource {
    pages: Mutex<VecDeque<Result<SearchPage, SourceError>>>,
    lookups: Mutex<HashMap<ItemId, Result<RawItem, SourceError>>>,
    pub search_calls: Mutex<Vec<SearchQuery>>,
    pub lookup_calls: Mutex<Vec<ItemId>>,
}

impl FakeSource {
    pub fn push_page(&self, page: Result<SearchPage, SourceError>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn set_lookup(&self, id: ItemId, result: Result<RawItem, SourceError>) {
        self.lookups.lock().unwrap().insert(id, result);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_calls.lock().unwrap().len()
    }

    pub fn search_count(&self) -> usize {
        self.search_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        self.search_calls.lock().unwrap().push(query.clone());
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }

    async fn lookup(&self, id: ItemId) -> Result<LookupResult, SourceError> {
        self.lookup_calls.lock().unwrap().push(id);
        let result = self
            .lookups
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::Transient("no fixture".to_string())));
        result.map(|item| LookupResult {
            item,
            rate_limit: None,
        })
    }
}

/// One store call, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Insert(ItemId),
    Update(ItemId, u64),
    Delete(ItemId),
}

/// Store kept in a map; can be told to fail writes for chosen ids.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<ItemId, PersistedRecord>>,
    next_id: Mutex<StorageId>,
    pub ops: Mutex<Vec<StoreOp>>,
    pub failing: Mutex<Vec<ItemId>>,
}

impl MemoryStore {
    pub fn seed(&self, id: u64, author: u64, score: u64) -> StorageId {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let item = crate::item::fixtures::scored(id, author, score);
        self.records.lock().unwrap().insert(
            ItemId(id),
            PersistedRecord {
                storage_id: *next,
                id: item.id,
                author_id: item.author_id,
                score,
                link: item.link,
                fetched_at: item.fetched_at,
            },
        );
        *next
    }

    pub fn take_ops(&self) -> Vec<StoreOp> {
        std::mem::take(&mut *self.ops.lock().unwrap())
    }

    pub fn score_of(&self, id: u64) -> Option<u64> {
        self.records.lock().unwrap().get(&ItemId(id)).map(|r| r.score)
    }

    fn check(&self, id: ItemId) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(&id) {
            anyhow::bail!("injected failure for {}", id);
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read_current_period(&self) -> anyhow::Result<Vec<PersistedRecord>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn insert(&self, item: &ScoredItem) -> anyhow::Result<StorageId> {
        self.check(item.id)?;
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        self.records.lock().unwrap().insert(
            item.id,
            PersistedRecord {
                storage_id: *next,
                id: item.id,
                author_id: item.author_id,
                score: item.score,
                link: item.link.clone(),
                fetched_at: item.fetched_at,
            },
        );
        self.ops.lock().unwrap().push(StoreOp::Insert(item.id));
        Ok(*next)
    }

    async fn update(&self, id: ItemId, score: u64) -> anyhow::Result<()> {
        self.check(id)?;
        if let Some(r) = self.records.lock().unwrap().get_mut(&id) {
            r.score = score;
        }
        self.ops.lock().unwrap().push(StoreOp::Update(id, score));
        Ok(())
    }

    async fn delete(&self, id: ItemId) -> anyhow::Result<()> {
        self.check(id)?;
        self.records.lock().unwrap().remove(&id);
        self.ops.lock().unwrap().push(StoreOp::Delete(id));
        Ok(())
    }
}

pub fn cache_with(source: Arc<FakeSource>, capacity: usize) -> ScoreCache {
    let revalidator = Revalidator::new(source, Arc::new(RateLimitCoordinator::default()));
    ScoreCache::new(capacity, std::time::Duration::from_secs(15 * 60), revalidator)
}
