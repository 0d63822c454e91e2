//! Process wiring: cache, store, jobs, scheduler, and the ordered shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::cache::{Revalidator, ScoreCache};
use crate::config::PopfeedConfig;
use crate::filter::BasicFilter;
use crate::item::ScoredItem;
use crate::jobs::{FetchJob, SyncJob};
use crate::rate_limit::RateLimitCoordinator;
use crate::scheduler::{Cadence, Scheduler, TaskPriority};
use crate::source::SourceClient;
use crate::store::Store;
use crate::sync::{SyncReport, Synchronizer};

pub struct Runtime {
    cache: Arc<ScoreCache>,
    rate_limit: Arc<RateLimitCoordinator>,
    synchronizer: Arc<Synchronizer>,
    scheduler: Scheduler,
}

impl Runtime {
    /// Validate config, warm the cache from today's records, start both jobs.
    ///
    /// Fetch runs at low priority right away; sync runs at high priority after
    /// its initial delay.
    pub async fn start(
        cfg: &PopfeedConfig,
        source: Arc<dyn SourceClient>,
        store: Arc<dyn Store>,
    ) -> Result<Self> {
        cfg.validate()?;

        let rate_limit = Arc::new(RateLimitCoordinator::default());
        let revalidator = Revalidator::new(Arc::clone(&source), Arc::clone(&rate_limit));
        let cache = Arc::new(ScoreCache::new(
            cfg.capacity,
            cfg.stale_after(),
            revalidator,
        ));

        let persisted = store
            .read_current_period()
            .await
            .context("load today's records from store")?;
        let loaded = persisted.len();
        let kept = cache
            .warm(persisted.into_iter().map(ScoredItem::from).collect())
            .await;
        tracing::info!(loaded, kept, "cache warmed from store");

        let synchronizer = Arc::new(Synchronizer::new(store, Arc::clone(&cache)));

        let fetch = FetchJob::new(
            source,
            Arc::clone(&rate_limit),
            Arc::clone(&cache),
            Arc::new(BasicFilter::from_config(cfg)),
            cfg.language_key.clone(),
            cfg.source.page_size,
        )
        .with_flush(Arc::clone(&synchronizer));
        let sync = SyncJob::new(Arc::clone(&synchronizer));

        let scheduler = Scheduler::new();
        scheduler.schedule(
            Arc::new(fetch),
            TaskPriority::Low,
            Cadence::new(std::time::Duration::ZERO, cfg.fetch_period()),
        );
        scheduler.schedule(
            Arc::new(sync),
            TaskPriority::High,
            Cadence::new(cfg.sync_initial_delay(), cfg.sync_period()),
        );
        tracing::info!(
            language = %cfg.language_key,
            capacity = cfg.capacity,
            "popfeed runtime started"
        );

        Ok(Self {
            cache,
            rate_limit,
            synchronizer,
            scheduler,
        })
    }

    pub fn cache(&self) -> &Arc<ScoreCache> {
        &self.cache
    }

    pub fn rate_limit(&self) -> &Arc<RateLimitCoordinator> {
        &self.rate_limit
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Preempt everything below high priority (fetch flushes), run sync once
    /// more, then drain whatever is left.
    pub async fn shutdown(&self) -> Result<SyncReport> {
        tracing::info!("shutting down");
        self.scheduler.preempt_below(TaskPriority::High).await;
        let report = self
            .synchronizer
            .run_once()
            .await
            .context("final synchronize");
        self.scheduler.drain_all();
        let report = report?;
        tracing::info!(writes = report.writes(), failed = report.failed, "shutdown complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::fixtures::raw;
    use crate::item::ItemId;
    use crate::source::SearchPage;
    use crate::testutil::{FakeSource, MemoryStore};
    use std::time::Duration;

    fn cfg() -> PopfeedConfig {
        PopfeedConfig {
            language_key: "en".to_string(),
            capacity: 2,
            ..PopfeedConfig::default()
        }
    }

    #[tokio::test]
    async fn invalid_config_is_fatal() {
        let bad = PopfeedConfig::default();
        let res = Runtime::start(
            &bad,
            Arc::new(FakeSource::default()),
            Arc::new(MemoryStore::default()),
        )
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn start_warms_cache_from_store() {
        let store = Arc::new(MemoryStore::default());
        let sid = store.seed(1, 1, 5);
        store.seed(2, 2, 9);
        store.seed(3, 3, 1);
        let rt = Runtime::start(&cfg(), Arc::new(FakeSource::default()), store.clone())
            .await
            .unwrap();

        assert_eq!(rt.cache().len().await, 2);
        assert_eq!(rt.cache().get(ItemId(1)).await.unwrap().storage_id, Some(sid));
        assert_eq!(rt.scheduler().len(), 2);
        rt.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_persists_fetched_items() {
        let source = Arc::new(FakeSource::default());
        let mut env = raw(100, 9, 0);
        env.retweeted = Some(Box::new(raw(7, 7, 42)));
        source.push_page(Ok(SearchPage {
            items: vec![env],
            ..SearchPage::default()
        }));
        let store = Arc::new(MemoryStore::default());
        let rt = Runtime::start(&cfg(), source.clone(), store.clone())
            .await
            .unwrap();

        for _ in 0..100 {
            if rt.cache().get(ItemId(7)).await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(rt.cache().get(ItemId(7)).await.is_some());

        rt.shutdown().await.unwrap();
        assert!(rt.scheduler().is_empty());
        assert_eq!(store.score_of(7), Some(42));
    }
}
