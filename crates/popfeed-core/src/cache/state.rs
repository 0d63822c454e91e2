//! Lock-free core of the score cache: the maps and every synchronous rule.
//!
//! `ScoreCache` wraps this in a mutex and adds the parts that need the source
//! (revalidation). Everything here runs under that lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::item::{AuthorId, ItemId, ScoredItem, StorageId};

/// What `upsert` did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New author; candidate inserted.
    Inserted,
    /// Same item seen with a different score; score and fetched_at overwritten.
    Updated { previous_score: u64 },
    /// Candidate beat the author's incumbent, which was removed.
    Replaced { incumbent: ItemId },
    /// Candidate did not beat the author's incumbent.
    Discarded,
    /// Same item, same score. Nothing touched.
    Unchanged,
}

impl UpsertOutcome {
    pub fn is_mutation(self) -> bool {
        !matches!(self, UpsertOutcome::Discarded | UpsertOutcome::Unchanged)
    }

    pub fn is_insertion(self) -> bool {
        matches!(self, UpsertOutcome::Inserted | UpsertOutcome::Replaced { .. })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    item: ScoredItem,
    /// Insertion order; earlier entries win score ties when trimming.
    seq: u64,
}

#[derive(Debug)]
pub(super) struct CacheState {
    entries: HashMap<ItemId, Entry>,
    by_author: HashMap<AuthorId, ItemId>,
    next_seq: u64,
    capacity: usize,
    mutations: u64,
}

impl CacheState {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_author: HashMap::new(),
            next_seq: 0,
            capacity: capacity.max(1),
            mutations: 0,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(super) fn mutations(&self) -> u64 {
        self.mutations
    }

    pub(super) fn over_capacity(&self) -> bool {
        self.entries.len() > self.capacity
    }

    pub(super) fn at_capacity(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub(super) fn get(&self, id: ItemId) -> Option<&ScoredItem> {
        self.entries.get(&id).map(|e| &e.item)
    }

    pub(super) fn upsert(&mut self, candidate: ScoredItem) -> UpsertOutcome {
        if let Some(entry) = self.entries.get_mut(&candidate.id) {
            if entry.item.score == candidate.score {
                return UpsertOutcome::Unchanged;
            }
            let previous_score = entry.item.score;
            entry.item.score = candidate.score;
            entry.item.fetched_at = candidate.fetched_at;
            self.mutations += 1;
            return UpsertOutcome::Updated { previous_score };
        }

        if let Some(&incumbent) = self.by_author.get(&candidate.author_id) {
            let incumbent_score = self.entries.get(&incumbent).map(|e| e.item.score);
            return match incumbent_score {
                Some(score) if candidate.score > score => {
                    self.remove(incumbent);
                    self.insert(ScoredItem {
                        storage_id: None,
                        ..candidate
                    });
                    UpsertOutcome::Replaced { incumbent }
                }
                Some(_) => UpsertOutcome::Discarded,
                None => {
                    // Index pointed at a missing entry; repair it and treat as new author.
                    self.by_author.remove(&candidate.author_id);
                    self.insert(candidate);
                    UpsertOutcome::Inserted
                }
            };
        }

        self.insert(candidate);
        UpsertOutcome::Inserted
    }

    fn insert(&mut self, item: ScoredItem) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_author.insert(item.author_id, item.id);
        self.entries.insert(item.id, Entry { item, seq });
        self.mutations += 1;
    }

    /// Insert a record restored from the store, keeping its storage id.
    pub(super) fn restore(&mut self, item: ScoredItem) -> UpsertOutcome {
        let storage_id = item.storage_id;
        let id = item.id;
        let outcome = self.upsert(item);
        if outcome.is_insertion() {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.item.storage_id = storage_id;
            }
        }
        outcome
    }

    pub(super) fn remove(&mut self, id: ItemId) -> Option<ScoredItem> {
        let entry = self.entries.remove(&id)?;
        if self.by_author.get(&entry.item.author_id) == Some(&id) {
            self.by_author.remove(&entry.item.author_id);
        }
        self.mutations += 1;
        Some(entry.item)
    }

    /// Ids whose last observation is older than `stale_after`.
    pub(super) fn stale_ids(&self, now: DateTime<Utc>, stale_after: Duration) -> Vec<ItemId> {
        let mut stale: Vec<(u64, ItemId)> = self
            .entries
            .values()
            .filter(|e| {
                (now - e.item.fetched_at)
                    .to_std()
                    .map(|age| age > stale_after)
                    .unwrap_or(false)
            })
            .map(|e| (e.seq, e.item.id))
            .collect();
        stale.sort_unstable();
        stale.into_iter().map(|(_, id)| id).collect()
    }

    /// Refresh score and fetched_at in place. Returns false if the item is gone.
    pub(super) fn refresh(&mut self, id: ItemId, score: u64, fetched_at: DateTime<Utc>) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.item.score = score;
        entry.item.fetched_at = fetched_at;
        self.mutations += 1;
        true
    }

    /// Drop everything ranked beyond `capacity` by score (descending, earlier
    /// insertion first on ties). Returns the dropped items.
    pub(super) fn trim(&mut self) -> Vec<ScoredItem> {
        if !self.over_capacity() {
            return Vec::new();
        }
        let mut ranked: Vec<(u64, u64, ItemId)> = self
            .entries
            .values()
            .map(|e| (e.item.score, e.seq, e.item.id))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked
            .into_iter()
            .skip(self.capacity)
            .filter_map(|(_, _, id)| self.remove(id))
            .collect()
    }

    pub(super) fn min_score(&self) -> Option<u64> {
        self.entries.values().map(|e| e.item.score).min()
    }

    /// Set the storage id if none is set yet. Returns the id now on the entry.
    pub(super) fn assign_storage_id(&mut self, id: ItemId, storage_id: StorageId) -> Option<StorageId> {
        let entry = self.entries.get_mut(&id)?;
        Some(*entry.item.storage_id.get_or_insert(storage_id))
    }

    pub(super) fn snapshot(&self) -> HashMap<ItemId, ScoredItem> {
        self.entries
            .iter()
            .map(|(id, e)| (*id, e.item.clone()))
            .collect()
    }

    #[cfg(test)]
    pub(super) fn author_index_consistent(&self) -> bool {
        self.by_author.len() == self.entries.len()
            && self
                .by_author
                .iter()
                .all(|(author, id)| self.entries.get(id).map(|e| e.item.author_id) == Some(*author))
    }
}
