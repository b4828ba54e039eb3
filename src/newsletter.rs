// src/newsletter.rs
//! Boundary contract for the downstream narrative generator.
//!
//! The generator itself (a language-model service) lives outside this
//! crate. What is pinned down here is the exact input it may receive —
//! deduplicated, ranked, capped — and the shape of the document it returns
//! to the email renderer.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{AggregationResult, ContentItem, ReplyItem, TimeWindow};

/// Items forwarded to the generator, after dedup.
pub const MAX_GENERATOR_ITEMS: usize = 12;
/// Replies forwarded to the generator, after dedup.
pub const MAX_GENERATOR_REPLIES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsletterFormat {
    Brief,
    Detailed,
    Visual,
}

impl std::str::FromStr for NewsletterFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(Self::Brief),
            "detailed" => Ok(Self::Detailed),
            "visual" => Ok(Self::Visual),
            other => Err(anyhow::anyhow!("unsupported newsletter format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsletterTone {
    Professional,
    Casual,
    Enthusiastic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsletterSection {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub section_type: String,
}

/// Structured newsletter returned by a generator implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterDocument {
    pub title: String,
    pub introduction: String,
    pub sections: Vec<NewsletterSection>,
    pub key_takeaways: Vec<String>,
    pub conclusion: String,
    pub tone: NewsletterTone,
}

/// Input handed to a generator: already deduplicated, ranked, and capped.
/// A generator never sees unranked raw data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeRequest {
    pub topic: String,
    #[serde(rename = "timeFilter")]
    pub window: TimeWindow,
    pub format: NewsletterFormat,
    pub items: Vec<ContentItem>,
    pub replies: Vec<ReplyItem>,
}

impl NarrativeRequest {
    /// Build the generator input from a finished aggregation. Rank order is
    /// preserved; duplicate ids are dropped; both lists are capped.
    pub fn from_result(result: &AggregationResult, format: NewsletterFormat) -> Self {
        let mut seen_items = HashSet::new();
        let items: Vec<ContentItem> = result
            .top_posts
            .iter()
            .filter(|p| seen_items.insert(p.id.clone()))
            .take(MAX_GENERATOR_ITEMS)
            .cloned()
            .collect();

        let mut seen_replies = HashSet::new();
        let replies: Vec<ReplyItem> = result
            .top_comments
            .iter()
            .filter(|r| seen_replies.insert(r.id.clone()))
            .take(MAX_GENERATOR_REPLIES)
            .cloned()
            .collect();

        Self {
            topic: result.topic.clone(),
            window: result.window,
            format,
            items,
            replies,
        }
    }
}

/// Narrative synthesis seam: topic + ranked material in, structured
/// newsletter out. Implementations live outside the core.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, request: &NarrativeRequest) -> anyhow::Result<NewsletterDocument>;
}
