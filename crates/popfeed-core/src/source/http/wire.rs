//! JSON shapes of the v1.1-style search and show endpoints.

use serde::Deserialize;

use crate::item::{AuthorId, InteractionCounts, ItemId, RawItem};

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub search_metadata: SearchMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchMetadata {
    /// Query string (starting with `?`) for the next, older page.
    #[serde(default)]
    pub next_results: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    pub id: u64,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    pub user: User,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub quote_count: Option<u64>,
    #[serde(default)]
    pub reply_count: Option<u64>,
    #[serde(default)]
    pub retweeted_status: Option<Box<Status>>,
    #[serde(default)]
    pub quoted_status: Option<Box<Status>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct User {
    pub id: u64,
    pub screen_name: String,
}

impl From<Status> for RawItem {
    fn from(s: Status) -> Self {
        RawItem {
            id: ItemId(s.id),
            author_id: AuthorId(s.user.id),
            author_handle: s.user.screen_name,
            text: s.full_text.or(s.text).unwrap_or_default(),
            counts: InteractionCounts {
                retweets: s.retweet_count,
                favorites: s.favorite_count,
                quotes: s.quote_count.unwrap_or(0),
                replies: s.reply_count.unwrap_or(0),
            },
            retweeted: s.retweeted_status.map(|b| Box::new(RawItem::from(*b))),
            quoted: s.quoted_status.map(|b| Box::new(RawItem::from(*b))),
        }
    }
}
