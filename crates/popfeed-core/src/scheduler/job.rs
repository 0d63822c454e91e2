use async_trait::async_trait;

use crate::control::CancelToken;

/// Work run on a fixed cadence by the scheduler.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &str;

    /// One unit of periodic work. Long ticks should check `cancel` between steps.
    async fn tick(&self, cancel: &CancelToken) -> anyhow::Result<()>;

    /// Runs once on graceful cancellation.
    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
