//! Types used by the record store.

use chrono::{DateTime, Utc};

use crate::item::{AuthorId, ItemId, ScoredItem, StorageId};

/// One stored item of the current period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRecord {
    pub storage_id: StorageId,
    pub id: ItemId,
    pub author_id: AuthorId,
    pub score: u64,
    pub link: String,
    pub fetched_at: DateTime<Utc>,
}

impl From<PersistedRecord> for ScoredItem {
    fn from(r: PersistedRecord) -> Self {
        ScoredItem {
            id: r.id,
            author_id: r.author_id,
            score: r.score,
            link: r.link,
            fetched_at: r.fetched_at,
            storage_id: Some(r.storage_id),
        }
    }
}
