// src/topics.rs
//! Topic → community routing.
//!
//! A fixed, ordered table maps free-text topics to a bounded list of
//! communities to search. Matching is case-insensitive and bidirectional
//! substring ("ai" matches an "artificial intelligence" entry and the other
//! way round); the first entry that matches wins, so table order is part of
//! the contract. Topics that match nothing get a single fallback list.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const ENV_TOPIC_MAP_PATH: &str = "TOPIC_MAP_PATH";
pub const DEFAULT_TOPIC_MAP_PATH: &str = "config/topics.toml";

/// Maximum communities returned for any topic.
pub const MAX_COMMUNITIES: usize = 4;

const BUILTIN_TOPIC_MAP: &str = include_str!("../config/topics.toml");

#[derive(Debug, Clone, Deserialize)]
struct TopicMapFile {
    fallback: Vec<String>,
    #[serde(rename = "topic", default)]
    topics: Vec<TopicEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TopicEntry {
    keyword: String,
    communities: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TopicRouter {
    entries: Vec<TopicEntry>,
    fallback: Vec<String>,
}

impl TopicRouter {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let file: TopicMapFile = toml::from_str(toml_str).context("parsing topic map")?;
        anyhow::ensure!(
            !file.fallback.is_empty(),
            "topic map needs a non-empty fallback list"
        );
        Ok(Self {
            entries: file.topics,
            fallback: file.fallback,
        })
    }

    /// Load from $TOPIC_MAP_PATH, then config/topics.toml, then the
    /// compiled-in copy of the table, so the router can never be absent.
    pub fn from_config() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_TOPIC_MAP_PATH) {
            let content = fs::read_to_string(PathBuf::from(&p))
                .with_context(|| format!("reading topic map from {p}"))?;
            return Self::from_toml_str(&content);
        }
        let default = PathBuf::from(DEFAULT_TOPIC_MAP_PATH);
        if default.exists() {
            let content = fs::read_to_string(&default)
                .with_context(|| format!("reading topic map from {}", default.display()))?;
            return Self::from_toml_str(&content);
        }
        Self::builtin()
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TOPIC_MAP)
    }

    /// Ordered, size-bounded community list for a topic. Pure lookup: the
    /// same topic always yields the same list in the same order.
    pub fn communities_for(&self, topic: &str) -> Vec<String> {
        let topic = topic.trim().to_lowercase();
        if topic.is_empty() {
            return self.bounded_fallback();
        }
        for entry in &self.entries {
            let keyword = entry.keyword.to_lowercase();
            if topic.contains(&keyword) || keyword.contains(&topic) {
                return entry
                    .communities
                    .iter()
                    .take(MAX_COMMUNITIES)
                    .cloned()
                    .collect();
            }
        }
        self.bounded_fallback()
    }

    fn bounded_fallback(&self) -> Vec<String> {
        self.fallback
            .iter()
            .take(MAX_COMMUNITIES)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TOML: &str = r#"
fallback = ["technology", "programming"]

[[topic]]
keyword = "ai"
communities = ["artificial", "MachineLearning", "OpenAI"]

[[topic]]
keyword = "web development"
communities = ["webdev", "programming", "javascript"]
"#;

    #[test]
    fn builtin_table_parses() {
        let router = TopicRouter::builtin().expect("builtin topic map is valid");
        assert!(!router.communities_for("anything").is_empty());
    }

    #[test]
    fn lookup_is_case_insensitive_and_stable() {
        let router = TopicRouter::from_toml_str(TEST_TOML).unwrap();
        let upper = router.communities_for("AI");
        let lower = router.communities_for("ai");
        assert_eq!(upper, lower);
        assert_eq!(router.communities_for("ai"), router.communities_for("ai"));
    }

    #[test]
    fn widening_match_hits_longer_keyword() {
        let router = TopicRouter::from_toml_str(TEST_TOML).unwrap();
        // "web" is contained in the "web development" keyword.
        assert_eq!(
            router.communities_for("web"),
            vec!["webdev", "programming", "javascript"]
        );
    }

    #[test]
    fn unmapped_and_empty_topics_share_one_fallback() {
        let router = TopicRouter::from_toml_str(TEST_TOML).unwrap();
        let fallback = vec!["technology".to_string(), "programming".to_string()];
        assert_eq!(router.communities_for("quantum zoology"), fallback);
        assert_eq!(router.communities_for(""), fallback);
        assert_eq!(router.communities_for("   "), fallback);
    }

    #[test]
    fn result_is_bounded() {
        let toml = r#"
fallback = ["a", "b", "c", "d", "e"]

[[topic]]
keyword = "wide"
communities = ["c1", "c2", "c3", "c4", "c5", "c6"]
"#;
        let router = TopicRouter::from_toml_str(toml).unwrap();
        assert_eq!(router.communities_for("wide").len(), MAX_COMMUNITIES);
        assert_eq!(router.communities_for("unmatched").len(), MAX_COMMUNITIES);
    }

    #[test]
    fn empty_fallback_is_rejected() {
        assert!(TopicRouter::from_toml_str("fallback = []").is_err());
    }
}
