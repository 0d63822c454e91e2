//! Persistent per-day record set (SQLite via sqlx).
//!
//! The synchronizer only needs the `Store` contract: read the current
//! period's records, insert, update a score, delete. `StatusDb` is the
//! SQLite implementation; rows are tagged with the UTC day they belong to.

mod db;
mod records;
mod types;

use async_trait::async_trait;

use crate::item::{ItemId, ScoredItem, StorageId};

pub use db::{default_db_path, Period, StatusDb};
pub use types::PersistedRecord;

#[async_trait]
pub trait Store: Send + Sync {
    /// Every record of the current period, read fresh.
    async fn read_current_period(&self) -> anyhow::Result<Vec<PersistedRecord>>;

    /// Persist a new item; returns the id the store assigned to it.
    async fn insert(&self, item: &ScoredItem) -> anyhow::Result<StorageId>;

    /// Overwrite the score of a current-period record.
    async fn update(&self, id: ItemId, score: u64) -> anyhow::Result<()>;

    /// Remove a current-period record.
    async fn delete(&self, id: ItemId) -> anyhow::Result<()>;
}
