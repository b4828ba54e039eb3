// src/types.rs
//! Core data model shared across the aggregation pipeline.
//!
//! Items and replies are created fresh on every upstream fetch (or returned
//! from cache) and are never updated in place; the result structs are built
//! once by the orchestrator and handed to the caller as-is.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Recency filter applied to a community fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Week,
    Month,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl std::str::FromStr for TimeWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(anyhow::anyhow!("unsupported time window: {other}")),
        }
    }
}

/// A top-level post within a community. Immutable once fetched; the scorer
/// decorates owned copies with `relevance_score`, never the cached ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub author: String,
    pub community: String,
    pub score: i64,
    pub reply_count: u64,
    pub created_utc: i64,
    pub permalink: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// A threaded response to an item or to another reply, flattened out of the
/// nested reply tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyItem {
    pub id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub created_utc: i64,
    pub parent_id: String,
    pub permalink: String,
}

/// Aggregate counters over the full collected item set (not the top slice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_posts: usize,
    pub total_upvotes: i64,
    pub total_comments: usize,
    pub average_score: i64,
    pub communities_searched: usize,
}

/// Engagement totals for a domain analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementStats {
    pub total_upvotes: i64,
    pub total_comments: u64,
    pub average_score: i64,
    pub total_posts: usize,
}

/// A vocabulary keyword observed in item titles, with its engagement share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingKeyword {
    pub keyword: String,
    pub frequency: usize,
    pub total_score: i64,
    pub average_score: i64,
    pub sample_items: Vec<ContentItem>,
}

/// Per-author engagement rollup. The removed-author sentinel is excluded
/// before grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub author: String,
    pub post_count: usize,
    pub total_score: i64,
    pub total_replies: u64,
    pub average_score: i64,
    pub best_item: ContentItem,
}

/// The finished digest for one topic query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub topic: String,
    #[serde(rename = "timeFilter")]
    pub window: TimeWindow,
    pub generated_at: String,
    pub summary: SummaryStats,
    pub top_posts: Vec<ContentItem>,
    pub top_comments: Vec<ReplyItem>,
    pub insights: Vec<String>,
    pub related_topics: Vec<String>,
}

/// Cross-community engagement analysis for a fixed community set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainAnalysis {
    pub communities: Vec<String>,
    #[serde(rename = "timeFilter")]
    pub window: TimeWindow,
    pub total_posts: usize,
    pub top_posts: Vec<ContentItem>,
    pub trending_keywords: Vec<TrendingKeyword>,
    pub top_contributors: Vec<Contributor>,
    pub engagement: EngagementStats,
    pub generated_at: String,
}

/// ISO-8601 generation timestamp.
pub fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// Keeps \t and \n; strips the rest of C0 plus DEL so downstream renderers
// never see raw control characters.
static RE_CTRL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B-\x1F\x7F]").expect("control-char regex"));

/// Normalize upstream text: decode HTML entities, strip control characters,
/// trim. The source encodes entities inside its JSON payloads.
pub fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    RE_CTRL.replace_all(&decoded, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_parses_case_insensitively() {
        assert_eq!("week".parse::<TimeWindow>().unwrap(), TimeWindow::Week);
        assert_eq!("Month".parse::<TimeWindow>().unwrap(), TimeWindow::Month);
        assert!("fortnight".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn clean_text_decodes_entities_and_strips_controls() {
        let out = clean_text("Rust &amp; Tokio\u{0} \x1b[31m");
        assert_eq!(out, "Rust & Tokio [31m");
    }

    #[test]
    fn clean_text_keeps_newlines() {
        let out = clean_text("line one\nline two");
        assert_eq!(out, "line one\nline two");
    }
}
