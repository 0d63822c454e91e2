//! Post model: raw items as returned by the source and scored cache entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public URL prefix used to build display links.
pub const LINK_BASE: &str = "https://twitter.com";

/// Item identifier. Source ids increase with recency, which the fetch watermark relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

/// Author identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub u64);

/// Row id assigned by the store on first insert.
pub type StorageId = i64;

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interaction counters reported by the source. Missing counters are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionCounts {
    pub retweets: u64,
    pub favorites: u64,
    pub quotes: u64,
    pub replies: u64,
}

impl InteractionCounts {
    /// Score used for ranking: the plain sum of all interactions.
    pub fn total(&self) -> u64 {
        self.retweets
            .saturating_add(self.favorites)
            .saturating_add(self.quotes)
            .saturating_add(self.replies)
    }
}

/// A post as returned by search or lookup, before it is admitted to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub id: ItemId,
    pub author_id: AuthorId,
    pub author_handle: String,
    pub text: String,
    pub counts: InteractionCounts,
    /// Original post when this item is a retweet.
    pub retweeted: Option<Box<RawItem>>,
    /// Post quoted by this item, if any.
    pub quoted: Option<Box<RawItem>>,
}

impl RawItem {
    pub fn score(&self) -> u64 {
        self.counts.total()
    }

    pub fn link(&self) -> String {
        item_link(&self.author_handle, self.id)
    }

    /// Originals carried by this envelope: the retweeted post, then the post quoted
    /// by whichever of the two is the effective original.
    ///
    /// Retweets and quotes are how popularity shows up in a recency-ordered search,
    /// so the envelope itself is never a candidate.
    pub fn originals(&self) -> Vec<&RawItem> {
        let mut out = Vec::with_capacity(2);
        let base = match self.retweeted.as_deref() {
            Some(original) => {
                out.push(original);
                original
            }
            None => self,
        };
        if let Some(quoted) = base.quoted.as_deref() {
            out.push(quoted);
        }
        out
    }
}

pub fn item_link(handle: &str, id: ItemId) -> String {
    format!("{}/{}/status/{}", LINK_BASE, handle, id)
}

/// One tracked post inside the score cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredItem {
    pub id: ItemId,
    pub author_id: AuthorId,
    pub score: u64,
    pub link: String,
    pub fetched_at: DateTime<Utc>,
    /// Set once the store has accepted the item; never changes afterwards.
    pub storage_id: Option<StorageId>,
}

impl ScoredItem {
    pub fn from_raw(raw: &RawItem, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: raw.id,
            author_id: raw.author_id,
            score: raw.score(),
            link: raw.link(),
            fetched_at,
            storage_id: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn raw(id: u64, author: u64, score: u64) -> RawItem {
        RawItem {
            id: ItemId(id),
            author_id: AuthorId(author),
            author_handle: format!("user{author}"),
            text: format!("post {id}"),
            counts: InteractionCounts {
                retweets: score,
                ..InteractionCounts::default()
            },
            retweeted: None,
            quoted: None,
        }
    }

    pub fn scored(id: u64, author: u64, score: u64) -> ScoredItem {
        ScoredItem::from_raw(&raw(id, author, score), Utc::now())
    }
}
