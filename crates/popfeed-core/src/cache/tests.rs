//! Tests for the score cache: dedup, eviction, revalidation, threshold.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::control::CancelToken;
use crate::item::fixtures::{raw, scored};
use crate::item::{AuthorId, ItemId, ScoredItem};
use crate::source::SourceError;
use crate::testutil::{cache_with, FakeSource};

use super::state::CacheState;
use super::UpsertOutcome;

fn stale(id: u64, author: u64, score: u64) -> ScoredItem {
    ScoredItem {
        fetched_at: Utc::now() - ChronoDuration::hours(2),
        ..scored(id, author, score)
    }
}

fn scores(snapshot: &std::collections::HashMap<ItemId, ScoredItem>) -> HashSet<u64> {
    snapshot.values().map(|i| i.score).collect()
}

#[tokio::test]
async fn eviction_keeps_top_scores_and_sets_threshold() {
    let cache = cache_with(Arc::new(FakeSource::default()), 3);
    for (i, score) in [5u64, 9, 2, 7].into_iter().enumerate() {
        cache.upsert(scored(i as u64 + 1, i as u64 + 100, score)).await;
    }
    let snap = cache.snapshot().await;
    assert_eq!(snap.len(), 3);
    assert_eq!(scores(&snap), HashSet::from([9, 7, 5]));
    assert_eq!(cache.threshold().current(), Some(5));
    assert_eq!(cache.threshold().admission(), Some(5));
}

#[tokio::test]
async fn author_replacement_and_discard() {
    let cache = cache_with(Arc::new(FakeSource::default()), 10);
    assert_eq!(cache.upsert(scored(1, 7, 3)).await, UpsertOutcome::Inserted);
    assert_eq!(
        cache.upsert(scored(2, 7, 8)).await,
        UpsertOutcome::Replaced {
            incumbent: ItemId(1)
        }
    );
    assert_eq!(cache.upsert(scored(3, 7, 2)).await, UpsertOutcome::Discarded);

    let snap = cache.snapshot().await;
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[&ItemId(2)].score, 8);
    assert!(!snap.contains_key(&ItemId(1)));
    assert!(!snap.contains_key(&ItemId(3)));
}

#[tokio::test]
async fn equal_score_from_same_author_is_discarded() {
    let cache = cache_with(Arc::new(FakeSource::default()), 10);
    cache.upsert(scored(1, 7, 5)).await;
    assert_eq!(cache.upsert(scored(2, 7, 5)).await, UpsertOutcome::Discarded);
    assert!(cache.get(ItemId(1)).await.is_some());
}

#[tokio::test]
async fn replacement_starts_without_storage_id() {
    let cache = cache_with(Arc::new(FakeSource::default()), 10);
    cache.upsert(scored(1, 7, 3)).await;
    assert!(cache.assign_storage_id(ItemId(1), 11).await);

    let mut challenger = scored(2, 7, 9);
    challenger.storage_id = Some(99);
    cache.upsert(challenger).await;
    assert_eq!(cache.get(ItemId(2)).await.unwrap().storage_id, None);
}

#[tokio::test]
async fn score_update_preserves_storage_id_and_refreshes_fetched_at() {
    let cache = cache_with(Arc::new(FakeSource::default()), 10);
    let old = stale(1, 1, 10);
    cache.upsert(old.clone()).await;
    cache.assign_storage_id(ItemId(1), 5).await;

    let newer = scored(1, 1, 12);
    assert_eq!(
        cache.upsert(newer.clone()).await,
        UpsertOutcome::Updated { previous_score: 10 }
    );
    let got = cache.get(ItemId(1)).await.unwrap();
    assert_eq!(got.score, 12);
    assert_eq!(got.storage_id, Some(5));
    assert_eq!(got.fetched_at, newer.fetched_at);
}

#[tokio::test]
async fn unchanged_upsert_is_a_noop() {
    let cache = cache_with(Arc::new(FakeSource::default()), 10);
    let first = stale(1, 1, 10);
    cache.upsert(first.clone()).await;
    let before = cache.mutation_count().await;

    // Same id and score, newer timestamp: nothing changes, fetched_at included.
    assert_eq!(cache.upsert(scored(1, 1, 10)).await, UpsertOutcome::Unchanged);
    assert_eq!(cache.mutation_count().await, before);
    assert_eq!(cache.get(ItemId(1)).await.unwrap().fetched_at, first.fetched_at);
}

#[tokio::test]
async fn not_found_lookup_evicts_regardless_of_score() {
    let source = Arc::new(FakeSource::default());
    source.set_lookup(ItemId(1), Err(SourceError::NotFound));
    let cache = cache_with(Arc::clone(&source), 2);
    cache.upsert(stale(1, 1, 1000)).await;
    cache.upsert(scored(2, 2, 1)).await;

    let report = cache.evict().await;
    assert_eq!(report.revalidation.removed, 1);
    assert!(cache.get(ItemId(1)).await.is_none());
    assert_eq!(cache.threshold().current(), Some(1));
    assert_eq!(source.lookup_count(), 1);
}

#[tokio::test]
async fn successful_lookup_refreshes_in_place() {
    let source = Arc::new(FakeSource::default());
    source.set_lookup(ItemId(1), Ok(raw(1, 1, 40)));
    let cache = cache_with(Arc::clone(&source), 5);
    cache.upsert(stale(1, 1, 10)).await;
    cache.assign_storage_id(ItemId(1), 3).await;

    let report = cache.revalidate(cache.stale_after()).await;
    assert_eq!(report.refreshed, 1);
    let got = cache.get(ItemId(1)).await.unwrap();
    assert_eq!(got.score, 40);
    assert_eq!(got.author_id, AuthorId(1));
    assert_eq!(got.storage_id, Some(3));
    assert!(Utc::now() - got.fetched_at < ChronoDuration::minutes(1));

    // Fresh now: a second pass looks nothing up.
    let report = cache.revalidate(cache.stale_after()).await;
    assert_eq!(report.checked, 0);
    assert_eq!(source.lookup_count(), 1);
}

#[tokio::test]
async fn transient_lookup_failure_leaves_item_and_retries_next_pass() {
    let source = Arc::new(FakeSource::default());
    source.set_lookup(ItemId(1), Err(SourceError::Transient("timeout".to_string())));
    let cache = cache_with(Arc::clone(&source), 5);
    let item = stale(1, 1, 10);
    cache.upsert(item.clone()).await;

    let report = cache.revalidate(cache.stale_after()).await;
    assert_eq!(report.failed, 1);
    assert_eq!(cache.get(ItemId(1)).await.unwrap(), item);

    cache.revalidate(cache.stale_after()).await;
    assert_eq!(source.lookup_count(), 2);
}

#[tokio::test]
async fn cancelled_revalidation_skips_remaining_lookups() {
    let source = Arc::new(FakeSource::default());
    source.set_lookup(ItemId(1), Err(SourceError::NotFound));
    source.set_lookup(ItemId(2), Err(SourceError::NotFound));
    let cache = cache_with(Arc::clone(&source), 5);
    cache.upsert(stale(1, 1, 10)).await;
    cache.upsert(stale(2, 2, 20)).await;

    let cancel = CancelToken::new();
    cancel.cancel();
    let report = cache.revalidate_cancellable(cache.stale_after(), &cancel).await;
    assert_eq!(report.checked, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(source.lookup_count(), 0);
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn fresh_items_are_not_looked_up() {
    let source = Arc::new(FakeSource::default());
    let cache = cache_with(Arc::clone(&source), 1);
    cache.upsert(scored(1, 1, 1)).await;
    cache.upsert(scored(2, 2, 2)).await;
    assert_eq!(source.lookup_count(), 0);
    assert_eq!(cache.len().await, 1);
    assert!(cache.get(ItemId(2)).await.is_some());
}

#[tokio::test]
async fn threshold_unset_when_cache_empties() {
    let source = Arc::new(FakeSource::default());
    source.set_lookup(ItemId(1), Err(SourceError::NotFound));
    let cache = cache_with(Arc::clone(&source), 3);
    cache.upsert(stale(1, 1, 4)).await;
    assert_eq!(cache.threshold().current(), Some(4));
    assert_eq!(cache.threshold().admission(), None);

    cache.evict().await;
    assert!(cache.is_empty().await);
    assert_eq!(cache.threshold().current(), None);
}

#[tokio::test]
async fn storage_id_is_assigned_once() {
    let cache = cache_with(Arc::new(FakeSource::default()), 3);
    cache.upsert(scored(1, 1, 4)).await;
    assert!(cache.assign_storage_id(ItemId(1), 10).await);
    assert!(cache.assign_storage_id(ItemId(1), 20).await);
    assert_eq!(cache.get(ItemId(1)).await.unwrap().storage_id, Some(10));
    assert!(!cache.assign_storage_id(ItemId(99), 30).await);
}

#[tokio::test]
async fn warm_restores_storage_ids_and_trims() {
    let cache = cache_with(Arc::new(FakeSource::default()), 2);
    let items: Vec<ScoredItem> = [(1u64, 1u64, 5u64, 100i64), (2, 2, 9, 101), (3, 3, 1, 102)]
        .into_iter()
        .map(|(id, author, score, sid)| ScoredItem {
            storage_id: Some(sid),
            ..stale(id, author, score)
        })
        .collect();

    assert_eq!(cache.warm(items).await, 2);
    let snap = cache.snapshot().await;
    assert_eq!(snap[&ItemId(2)].storage_id, Some(101));
    assert_eq!(snap[&ItemId(1)].storage_id, Some(100));
    assert_eq!(cache.threshold().admission(), Some(5));
}

#[tokio::test]
async fn snapshot_is_detached_from_later_changes() {
    let cache = cache_with(Arc::new(FakeSource::default()), 3);
    cache.upsert(scored(1, 1, 4)).await;
    let snap = cache.snapshot().await;
    cache.upsert(scored(1, 1, 8)).await;
    cache.upsert(scored(2, 2, 8)).await;
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[&ItemId(1)].score, 4);
}

#[test]
fn trim_breaks_ties_by_insertion_order() {
    let mut state = CacheState::new(2);
    state.upsert(scored(1, 1, 5));
    state.upsert(scored(2, 2, 5));
    state.upsert(scored(3, 3, 5));
    let dropped = state.trim();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].id, ItemId(3));
}

#[test]
fn capacity_and_author_uniqueness_hold_over_mixed_sequences() {
    // Deterministic pseudo-random sequence over few authors and ids.
    let mut state = CacheState::new(4);
    let mut x: u64 = 0x2545_f491;
    for _ in 0..500 {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        let id = x % 40;
        let author = (x >> 8) % 9;
        let score = (x >> 16) % 100;
        // Items keep their author for life.
        let author = if state.get(ItemId(id)).is_some() {
            state.get(ItemId(id)).unwrap().author_id.0
        } else {
            author
        };
        state.upsert(scored(id, author, score));
        if state.over_capacity() {
            state.trim();
        }
        assert!(state.len() <= 4);
        assert!(state.author_index_consistent());
        let authors: HashSet<AuthorId> = state.snapshot().values().map(|i| i.author_id).collect();
        assert_eq!(authors.len(), state.len());
    }
}
