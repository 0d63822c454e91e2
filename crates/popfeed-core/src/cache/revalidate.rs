//! Single-item lookups used to refresh stale cache entries.

use std::sync::Arc;

use crate::control::{CancelToken, Cancelled};
use crate::item::{ItemId, RawItem};
use crate::rate_limit::RateLimitCoordinator;
use crate::source::{OperationClass, SourceClient, SourceError};

/// Looks items up through the source, honouring the lookup budget.
#[derive(Clone)]
pub struct Revalidator {
    source: Arc<dyn SourceClient>,
    rate_limit: Arc<RateLimitCoordinator>,
}

impl Revalidator {
    pub fn new(source: Arc<dyn SourceClient>, rate_limit: Arc<RateLimitCoordinator>) -> Self {
        Self { source, rate_limit }
    }

    /// `Err(Cancelled)` when `cancel` fired while waiting for budget; no call is made then.
    pub(super) async fn lookup(
        &self,
        id: ItemId,
        cancel: &CancelToken,
    ) -> Result<Result<RawItem, SourceError>, Cancelled> {
        cancel
            .run_until_cancelled(self.rate_limit.await_budget(OperationClass::Lookup))
            .await?;
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        Ok(match self.source.lookup(id).await {
            Ok(found) => {
                if let Some(info) = &found.rate_limit {
                    self.rate_limit.report_usage(OperationClass::Lookup, info);
                }
                Ok(found.item)
            }
            Err(SourceError::RateLimited { class, reset_at }) => {
                self.rate_limit.record_rate_limited(class, reset_at);
                Err(SourceError::RateLimited { class, reset_at })
            }
            Err(e) => Err(e),
        })
    }
}

/// Counts from one revalidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevalidationReport {
    pub checked: usize,
    /// Stale items left unchecked because the pass was cancelled.
    pub skipped: usize,
    pub refreshed: usize,
    pub removed: usize,
    pub failed: usize,
}
