// src/fetch.rs
//! Respectful fetch client for the content source, plus the cache-backed
//! layer the rest of the pipeline talks to.
//!
//! The raw client sets an identifying User-Agent, enforces a bounded request
//! timeout, and translates transport/HTTP failures into `FetchError`. It
//! never retries and never touches the cache; memoization lives in
//! `ContentFetcher`, so tests can swap or bypass either half independently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CachedValue, ResponseCache};
use crate::threads::flatten_reply_tree;
use crate::types::{clean_text, ContentItem, ReplyItem, TimeWindow};

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
pub const DEFAULT_USER_AGENT: &str = "topic-digest/0.1 (respectful content aggregation)";

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Failures surfaced by the fetch client. All variants are recoverable at
/// the aggregation layer; none abort a whole digest run.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("access to r/{community} is forbidden; the community may be private or restricted")]
    AccessForbidden { community: String },

    #[error("community r/{community} does not exist")]
    NotFound { community: String },

    #[error("upstream rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("request timed out: {context}")]
    Timeout { context: String },

    #[error("network unreachable: {context}")]
    NetworkUnreachable { context: String },

    #[error("invalid response shape: {details}")]
    InvalidResponseShape { details: String },
}

/// Seam between the pipeline and the live HTTP source. Tests substitute
/// programmable implementations.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Currently popular items in a community.
    async fn community_items(
        &self,
        community: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, FetchError>;

    /// Top items of a community within a recency window.
    async fn community_items_by_window(
        &self,
        community: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ContentItem>, FetchError>;

    /// Raw nested reply structure for one item; flattening is the thread
    /// fetcher's job.
    async fn reply_tree(&self, item_id: &str) -> Result<serde_json::Value, FetchError>;
}

/* ----------------------------
Upstream listing payloads
---------------------------- */

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RawItem,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    author: String,
    subreddit: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    created_utc: f64,
    permalink: String,
}

impl From<RawItem> for ContentItem {
    fn from(raw: RawItem) -> Self {
        let body = clean_text(&raw.selftext);
        Self {
            id: raw.id,
            title: clean_text(&raw.title),
            body: if body.is_empty() { None } else { Some(body) },
            author: raw.author,
            community: raw.subreddit,
            score: raw.score,
            reply_count: raw.num_comments,
            created_utc: raw.created_utc as i64,
            permalink: raw.permalink,
            relevance_score: None,
        }
    }
}

/* ----------------------------
Live HTTP client
---------------------------- */

pub struct RedditSource {
    http: reqwest::Client,
    base_url: String,
}

impl RedditSource {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json(
        &self,
        url: &str,
        community: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        ensure_metrics_described();
        counter!("digest_fetch_requests_total").increment(1);

        let response = self.http.get(url).send().await.map_err(|e| {
            counter!("digest_fetch_errors_total").increment(1);
            transport_error(&e, url)
        })?;

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(err) = classify_status(response.status(), community, retry_after) {
            counter!("digest_fetch_errors_total").increment(1);
            return Err(err);
        }

        response.json::<serde_json::Value>().await.map_err(|e| {
            counter!("digest_fetch_errors_total").increment(1);
            FetchError::InvalidResponseShape {
                details: e.to_string(),
            }
        })
    }

    fn parse_listing(
        value: serde_json::Value,
        community: &str,
    ) -> Result<Vec<ContentItem>, FetchError> {
        let listing: Listing =
            serde_json::from_value(value).map_err(|e| FetchError::InvalidResponseShape {
                details: format!("listing for r/{community}: {e}"),
            })?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect())
    }
}

#[async_trait]
impl ContentSource for RedditSource {
    async fn community_items(
        &self,
        community: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, FetchError> {
        let url = format!("{}/r/{}/hot.json?limit={}", self.base_url, community, limit);
        let value = self.get_json(&url, Some(community)).await?;
        let items = Self::parse_listing(value, community)?;
        debug!(community, count = items.len(), "fetched community items");
        Ok(items)
    }

    async fn community_items_by_window(
        &self,
        community: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ContentItem>, FetchError> {
        let url = format!(
            "{}/r/{}/top.json?t={}&limit={}",
            self.base_url,
            community,
            window.as_str(),
            limit
        );
        let value = self.get_json(&url, Some(community)).await?;
        let items = Self::parse_listing(value, community)?;
        debug!(
            community,
            window = window.as_str(),
            count = items.len(),
            "fetched windowed community items"
        );
        Ok(items)
    }

    async fn reply_tree(&self, item_id: &str) -> Result<serde_json::Value, FetchError> {
        let url = format!("{}/comments/{}.json", self.base_url, item_id);
        self.get_json(&url, None).await
    }
}

/// Map an upstream HTTP status onto the error taxonomy. `None` means the
/// response is usable.
fn classify_status(
    status: StatusCode,
    community: Option<&str>,
    retry_after: Option<u64>,
) -> Option<FetchError> {
    let community = community.unwrap_or("?").to_string();
    match status {
        StatusCode::FORBIDDEN => Some(FetchError::AccessForbidden { community }),
        StatusCode::NOT_FOUND => Some(FetchError::NotFound { community }),
        StatusCode::TOO_MANY_REQUESTS => Some(FetchError::RateLimited {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        }),
        s if !s.is_success() => Some(FetchError::InvalidResponseShape {
            details: format!("unexpected upstream status {s}"),
        }),
        _ => None,
    }
}

fn transport_error(err: &reqwest::Error, url: &str) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            context: url.to_string(),
        }
    } else {
        // Connect failures and everything else transport-level.
        FetchError::NetworkUnreachable {
            context: err.to_string(),
        }
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_fetch_requests_total",
            "Outbound requests to the content source."
        );
        describe_counter!(
            "digest_fetch_errors_total",
            "Outbound requests that failed or returned an error status."
        );
    });
}

/* ----------------------------
Cache-backed fetch layer
---------------------------- */

pub fn items_key(community: &str, limit: u32) -> String {
    format!("items:{community}:{limit}")
}

pub fn windowed_items_key(community: &str, window: TimeWindow, limit: u32) -> String {
    format!("items:{community}:{}:{limit}", window.as_str())
}

pub fn replies_key(item_id: &str) -> String {
    format!("replies:{item_id}")
}

/// Memoizes fetch results by request signature so repeated identical
/// requests within the TTL never re-hit the network.
#[derive(Clone)]
pub struct ContentFetcher {
    source: Arc<dyn ContentSource>,
    cache: Arc<ResponseCache>,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn ContentSource>, cache: Arc<ResponseCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn community_items(
        &self,
        community: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, FetchError> {
        let key = items_key(community, limit);
        if let Some(CachedValue::Items(items)) = self.cache.get(&key) {
            debug!(community, "cache hit for community items");
            return Ok(items);
        }
        let items = self.source.community_items(community, limit).await?;
        self.cache.set(key, CachedValue::Items(items.clone()));
        Ok(items)
    }

    pub async fn community_items_by_window(
        &self,
        community: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ContentItem>, FetchError> {
        let key = windowed_items_key(community, window, limit);
        if let Some(CachedValue::Items(items)) = self.cache.get(&key) {
            debug!(community, window = window.as_str(), "cache hit for windowed items");
            return Ok(items);
        }
        let items = self
            .source
            .community_items_by_window(community, window, limit)
            .await?;
        self.cache.set(key, CachedValue::Items(items.clone()));
        Ok(items)
    }

    /// Flattened reply list for one item, memoized post-flattening.
    pub async fn replies(&self, item_id: &str) -> Result<Vec<ReplyItem>, FetchError> {
        let key = replies_key(item_id);
        if let Some(CachedValue::Replies(replies)) = self.cache.get(&key) {
            debug!(item_id, "cache hit for reply thread");
            return Ok(replies);
        }
        let tree = self.source.reply_tree(item_id).await?;
        let replies = flatten_reply_tree(&tree);
        self.cache.set(key, CachedValue::Replies(replies.clone()));
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_deterministic_and_disjoint() {
        assert_eq!(items_key("rust", 10), items_key("rust", 10));
        assert_ne!(items_key("rust", 10), items_key("rust", 25));
        assert_ne!(
            items_key("rust", 10),
            windowed_items_key("rust", TimeWindow::Week, 10)
        );
        assert_ne!(
            windowed_items_key("rust", TimeWindow::Week, 10),
            windowed_items_key("rust", TimeWindow::Month, 10)
        );
        assert!(replies_key("abc").starts_with("replies:"));
    }

    #[test]
    fn status_classification_matches_taxonomy() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, Some("private_club"), None),
            Some(FetchError::AccessForbidden { community }) if community == "private_club"
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, Some("nope"), None),
            Some(FetchError::NotFound { .. })
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None, Some(17)),
            Some(FetchError::RateLimited { retry_after: 17 })
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None, None),
            Some(FetchError::RateLimited { retry_after: 60 })
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, None),
            Some(FetchError::InvalidResponseShape { .. })
        ));
        assert!(classify_status(StatusCode::OK, None, None).is_none());
    }

    #[test]
    fn raw_item_conversion_normalizes_text() {
        let raw = RawItem {
            id: "abc".into(),
            title: "Rust &amp; friends".into(),
            selftext: String::new(),
            author: "someone".into(),
            subreddit: "rust".into(),
            score: 42,
            num_comments: 7,
            created_utc: 1_700_000_000.0,
            permalink: "/r/rust/comments/abc/".into(),
        };
        let item: ContentItem = raw.into();
        assert_eq!(item.title, "Rust & friends");
        assert_eq!(item.body, None);
        assert_eq!(item.created_utc, 1_700_000_000);
        assert!(item.relevance_score.is_none());
    }
}
