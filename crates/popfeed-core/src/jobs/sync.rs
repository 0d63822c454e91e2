//! Periodic persistence of the cache.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::control::CancelToken;
use crate::scheduler::PeriodicJob;
use crate::sync::Synchronizer;

pub struct SyncJob {
    synchronizer: Arc<Synchronizer>,
}

impl SyncJob {
    pub fn new(synchronizer: Arc<Synchronizer>) -> Self {
        Self { synchronizer }
    }
}

#[async_trait]
impl PeriodicJob for SyncJob {
    fn name(&self) -> &str {
        "sync"
    }

    async fn tick(&self, _cancel: &CancelToken) -> Result<()> {
        self.synchronizer.run_once().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.synchronizer.run_once().await?;
        Ok(())
    }
}
