//! curl-backed `SourceClient` for a v1.1-style search/show API.
//!
//! Requests run on the blocking pool (`spawn_blocking`), one libcurl Easy
//! handle per call. Rate-limit headers are returned with every result so the
//! caller can report them to the coordinator.

mod parse;
mod wire;

use async_trait::async_trait;
use std::str;
use std::time::Duration;
use url::Url;

use crate::config::{ConfigError, SourceConfig};
use crate::item::{ItemId, RawItem};

use super::classify::{classify_curl_error, classify_response};
use super::{
    LookupResult, OperationClass, RateLimitInfo, SearchPage, SearchQuery, SourceClient,
    SourceError,
};

/// Raw pieces of one HTTP exchange.
struct Response {
    code: u32,
    headers: Vec<String>,
    body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    base_url: String,
    bearer_token: String,
    timeout: Duration,
}

impl HttpSourceClient {
    pub fn new(base_url: &str, bearer_token: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
            timeout,
        }
    }

    pub fn from_config(cfg: &SourceConfig) -> Result<Self, ConfigError> {
        let token = cfg.resolve_bearer_token()?;
        Ok(Self::new(
            &cfg.base_url,
            &token,
            Duration::from_secs(cfg.timeout_secs),
        ))
    }

    async fn get(
        &self,
        url: String,
        class: OperationClass,
    ) -> Result<(Vec<u8>, Option<RateLimitInfo>), SourceError> {
        let token = self.bearer_token.clone();
        let timeout = self.timeout;
        tracing::trace!(url = %url, class = class.as_str(), "source request");

        let resp = tokio::task::spawn_blocking(move || perform(&url, &token, timeout))
            .await
            .map_err(|e| SourceError::Transient(format!("request task join: {}", e)))?
            .map_err(|e| classify_curl_error(&e))?;

        let rate_limit = parse::parse_rate_limit(&resp.headers, class);
        if !(200..300).contains(&resp.code) {
            return Err(classify_response(
                resp.code,
                &resp.body,
                class,
                rate_limit.as_ref(),
            ));
        }
        Ok((resp.body, rate_limit))
    }
}

/// Performs a GET with the bearer token. Runs in the current thread.
fn perform(url: &str, token: &str, timeout: Duration) -> Result<Response, curl::Error> {
    let mut headers: Vec<String> = Vec::new();
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(timeout)?;
    easy.accept_encoding("")?;

    let mut list = curl::easy::List::new();
    list.append(&format!("Authorization: Bearer {}", token))?;
    list.append("Accept: application/json")?;
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok(Response {
        code,
        headers,
        body,
    })
}

/// URL for a search page. Continuation tokens are the `next_results` query
/// string handed back by the previous page.
pub(crate) fn search_url(base_url: &str, query: &SearchQuery) -> Result<String, url::ParseError> {
    let endpoint = format!("{}/search/tweets.json", base_url);
    if let Some(token) = &query.page_token {
        let token = token.strip_prefix('?').unwrap_or(token);
        let url = Url::parse(&format!("{}?{}", endpoint, token))?;
        return Ok(url.into());
    }

    let q = format!("lang:{} since:{}", query.language, query.since.format("%Y-%m-%d"));
    let count = query.page_size.to_string();
    let mut params: Vec<(&str, String)> = vec![
        ("q", q),
        ("count", count),
        ("result_type", "recent".to_string()),
        ("tweet_mode", "extended".to_string()),
    ];
    if let Some(since_id) = query.since_id {
        params.push(("since_id", since_id.to_string()));
    }
    Ok(Url::parse_with_params(&endpoint, &params)?.into())
}

pub(crate) fn lookup_url(base_url: &str, id: ItemId) -> Result<String, url::ParseError> {
    let endpoint = format!("{}/statuses/show.json", base_url);
    let id = id.to_string();
    Ok(Url::parse_with_params(&endpoint, &[("id", id.as_str()), ("tweet_mode", "extended")])?.into())
}

fn decode_error(e: serde_json::Error) -> SourceError {
    SourceError::Transient(format!("malformed response body: {}", e))
}

fn url_error(e: url::ParseError) -> SourceError {
    SourceError::Transient(format!("invalid request url: {}", e))
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        let url = search_url(&self.base_url, query).map_err(url_error)?;
        let (body, rate_limit) = self.get(url, OperationClass::Search).await?;
        let resp: wire::SearchResponse = serde_json::from_slice(&body).map_err(decode_error)?;
        Ok(SearchPage {
            items: resp.statuses.into_iter().map(RawItem::from).collect(),
            next_page: resp
                .search_metadata
                .next_results
                .filter(|n| !n.is_empty()),
            rate_limit,
        })
    }

    async fn lookup(&self, id: ItemId) -> Result<LookupResult, SourceError> {
        let url = lookup_url(&self.base_url, id).map_err(url_error)?;
        let (body, rate_limit) = self.get(url, OperationClass::Lookup).await?;
        let status: wire::Status = serde_json::from_slice(&body).map_err(decode_error)?;
        Ok(LookupResult {
            item: RawItem::from(status),
            rate_limit,
        })
    }
}
