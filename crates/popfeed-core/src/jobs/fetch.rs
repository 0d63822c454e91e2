//! Search polling: pull new items for the configured language into the cache.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::ScoreCache;
use crate::control::CancelToken;
use crate::filter::EligibilityFilter;
use crate::item::{ItemId, ScoredItem};
use crate::rate_limit::RateLimitCoordinator;
use crate::scheduler::PeriodicJob;
use crate::source::{OperationClass, SearchQuery, SourceClient, SourceError};
use crate::sync::Synchronizer;

/// Counts from one fetch tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub pages: usize,
    pub candidates: usize,
    pub filtered: usize,
    pub admitted: usize,
    /// False when the tick stopped early (cancelled).
    pub completed: bool,
}

pub struct FetchJob {
    source: Arc<dyn SourceClient>,
    rate_limit: Arc<RateLimitCoordinator>,
    cache: Arc<ScoreCache>,
    filter: Arc<dyn EligibilityFilter>,
    language: String,
    page_size: u32,
    /// Highest item id seen by the last completed tick.
    watermark: Mutex<Option<ItemId>>,
    synchronizer: Option<Arc<Synchronizer>>,
}

impl FetchJob {
    pub fn new(
        source: Arc<dyn SourceClient>,
        rate_limit: Arc<RateLimitCoordinator>,
        cache: Arc<ScoreCache>,
        filter: Arc<dyn EligibilityFilter>,
        language: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            source,
            rate_limit,
            cache,
            filter,
            language: language.into(),
            page_size,
            watermark: Mutex::new(None),
            synchronizer: None,
        }
    }

    /// Synchronize once more when the job is gracefully cancelled.
    pub fn with_flush(mut self, synchronizer: Arc<Synchronizer>) -> Self {
        self.synchronizer = Some(synchronizer);
        self
    }

    pub fn watermark(&self) -> Option<ItemId> {
        *self.watermark.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn first_query(&self) -> SearchQuery {
        SearchQuery {
            language: self.language.clone(),
            since: Utc::now().date_naive(),
            since_id: self.watermark(),
            page_token: None,
            page_size: self.page_size,
        }
    }

    /// Page through every result newer than the watermark.
    pub async fn fetch_once(&self, cancel: &CancelToken) -> Result<FetchReport> {
        let mut query = self.first_query();
        let mut report = FetchReport::default();
        let mut newest = query.since_id;
        let threshold = self.cache.threshold();

        'pages: loop {
            if cancel.is_cancelled() {
                break;
            }
            if cancel
                .run_until_cancelled(self.rate_limit.await_budget(OperationClass::Search))
                .await
                .is_err()
            {
                break;
            }

            let page = match self.source.search(&query).await {
                Ok(page) => page,
                Err(SourceError::RateLimited { class, reset_at }) => {
                    self.rate_limit.record_rate_limited(class, reset_at);
                    if self.rate_limit.wait_time(class, Utc::now()).is_some() {
                        // Same page again once the budget resets.
                        continue;
                    }
                    return Err(SourceError::RateLimited { class, reset_at })
                        .context("search rejected with no usable reset time");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("search page {}", report.pages + 1))
                }
            };
            report.pages += 1;
            if let Some(info) = &page.rate_limit {
                self.rate_limit.report_usage(OperationClass::Search, info);
            }

            for envelope in &page.items {
                newest = newest.max(Some(envelope.id));
                for original in envelope.originals() {
                    if cancel.is_cancelled() {
                        break 'pages;
                    }
                    report.candidates += 1;
                    if !self.filter.is_eligible(original, threshold.admission()) {
                        report.filtered += 1;
                        continue;
                    }
                    let outcome = self
                        .cache
                        .upsert_cancellable(ScoredItem::from_raw(original, Utc::now()), cancel)
                        .await;
                    if outcome.is_mutation() {
                        report.admitted += 1;
                    }
                }
            }

            match page.next_page {
                Some(token) => query = query.next_page(token),
                None => {
                    report.completed = true;
                    break;
                }
            }
        }

        if report.completed {
            *self.watermark.lock().unwrap_or_else(PoisonError::into_inner) = newest;
        }
        Ok(report)
    }
}

#[async_trait]
impl PeriodicJob for FetchJob {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn tick(&self, cancel: &CancelToken) -> Result<()> {
        let report = self.fetch_once(cancel).await?;
        let cached = self.cache.len().await;
        tracing::info!(
            pages = report.pages,
            candidates = report.candidates,
            filtered = report.filtered,
            admitted = report.admitted,
            completed = report.completed,
            watermark = ?self.watermark(),
            cached,
            min_score = ?self.cache.threshold().current(),
            "fetch tick done"
        );
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        if let Some(sync) = &self.synchronizer {
            sync.run_once().await.context("final synchronize on fetch shutdown")?;
        }
        Ok(())
    }
}
