//! Search/lookup API client contract.
//!
//! The fetch job and cache revalidation only see the `SourceClient` trait and
//! the typed `SourceError` taxonomy. `HttpSourceClient` is the curl-backed
//! implementation used by the CLI.

mod classify;
mod http;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::item::{ItemId, RawItem};

pub use classify::{classify_curl_error, classify_response, NOT_FOUND_ERROR_CODES};
pub use http::HttpSourceClient;

/// API operation classes; each has its own call budget upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationClass {
    Search,
    Lookup,
}

impl OperationClass {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationClass::Search => "search",
            OperationClass::Lookup => "lookup",
        }
    }
}

/// Remaining budget reported alongside an upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub class: OperationClass,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// One search request. `page_token` is `None` for the first page of a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub language: String,
    /// Only items created on or after this day (the current period).
    pub since: NaiveDate,
    /// Only items newer than this id (the fetch watermark).
    pub since_id: Option<ItemId>,
    pub page_token: Option<String>,
    pub page_size: u32,
}

impl SearchQuery {
    /// Query for the page following `token`, keeping every other filter.
    pub fn next_page(&self, token: String) -> Self {
        Self {
            page_token: Some(token),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<RawItem>,
    pub next_page: Option<String>,
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Clone)]
pub struct LookupResult {
    pub item: RawItem,
    pub rate_limit: Option<RateLimitInfo>,
}

/// Failure kinds the rest of the system distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The item was deleted or is no longer visible. Authoritative.
    #[error("item not found or removed upstream")]
    NotFound,
    /// Budget for `class` is exhausted until `reset_at`.
    #[error("rate limited on {} until {reset_at}", class.as_str())]
    RateLimited {
        class: OperationClass,
        reset_at: DateTime<Utc>,
    },
    /// Network, timeout, 5xx, or any other failure worth retrying later.
    #[error("transient source failure: {0}")]
    Transient(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound)
    }
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError>;

    async fn lookup(&self, id: ItemId) -> Result<LookupResult, SourceError>;
}
