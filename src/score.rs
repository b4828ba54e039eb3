// src/score.rs
//! Relevance scoring: a binary topical filter plus a combined
//! relevance × engagement ranking value.

use crate::types::ContentItem;

/// Occurrences of a topic word in the title count this much.
pub const TITLE_MATCH_WEIGHT: f64 = 3.0;
/// Occurrences anywhere in title+body count this much on top.
pub const CONTENT_MATCH_WEIGHT: f64 = 1.0;
/// Keyword relevance is weighted over log-dampened engagement, so a
/// high-karma off-topic item cannot outrank a genuine topical match.
pub const RELEVANCE_WEIGHT: f64 = 2.0;
/// Topic words shorter than this are ignored by filter and scorer.
pub const MIN_TOPIC_WORD_LEN: usize = 3;

/// Lowercased topic words long enough to be meaningful.
pub fn topic_words(topic: &str) -> Vec<String> {
    topic
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TOPIC_WORD_LEN)
        .map(str::to_string)
        .collect()
}

fn searchable_text(item: &ContentItem) -> String {
    let title = item.title.to_lowercase();
    match &item.body {
        Some(body) => format!("{title} {}", body.to_lowercase()),
        None => title,
    }
}

/// Binary relevance filter applied before scoring: any topic word, or the
/// full topic string, appearing as a substring of title+body.
pub fn is_relevant(item: &ContentItem, topic: &str) -> bool {
    let content = searchable_text(item);
    topic_words(topic)
        .iter()
        .any(|w| content.contains(w.as_str()))
        || content.contains(&topic.to_lowercase())
}

fn occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Combined ranking value, rounded to two decimals.
pub fn score_item(item: &ContentItem, topic: &str) -> f64 {
    let title = item.title.to_lowercase();
    let content = searchable_text(item);

    let mut relevance = 0.0;
    for word in topic_words(topic) {
        relevance += occurrences(&title, &word) as f64 * TITLE_MATCH_WEIGHT
            + occurrences(&content, &word) as f64 * CONTENT_MATCH_WEIGHT;
    }

    // Net approval can go negative upstream; clamp before the log.
    let engagement =
        ((item.score.max(0) + 1) as f64).ln() + ((item.reply_count + 1) as f64).ln();

    let combined = relevance * RELEVANCE_WEIGHT + engagement;
    (combined * 100.0).round() / 100.0
}

/// Score and sort descending. The sort is stable, so ties keep fetch order.
/// Decoration happens on the owned copies only; cached lists are never
/// mutated.
pub fn rank_by_relevance(items: Vec<ContentItem>, topic: &str) -> Vec<ContentItem> {
    let mut scored: Vec<ContentItem> = items
        .into_iter()
        .map(|mut item| {
            item.relevance_score = Some(score_item(&item, topic));
            item
        })
        .collect();
    scored.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, body: &str, score: i64, reply_count: u64) -> ContentItem {
        ContentItem {
            id: "t1".into(),
            title: title.to_string(),
            body: if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            },
            author: "someone".into(),
            community: "test".into(),
            score,
            reply_count,
            created_utc: 0,
            permalink: "/r/test/comments/t1/".into(),
            relevance_score: None,
        }
    }

    #[test]
    fn topic_words_drop_short_tokens() {
        assert_eq!(topic_words("Agentic AI"), vec!["agentic"]);
        assert_eq!(topic_words("web of things"), vec!["web", "things"]);
        assert!(topic_words("ai").is_empty());
    }

    #[test]
    fn short_topic_still_matches_as_full_string() {
        let hit = item("AI breakthroughs this week", "", 10, 2);
        let miss = item("Sourdough starter tips", "", 10, 2);
        assert!(is_relevant(&hit, "AI"));
        assert!(!is_relevant(&miss, "AI"));
    }

    #[test]
    fn occurrences_counts_every_match() {
        assert_eq!(occurrences("rust and rustaceans love rust", "rust"), 3);
        assert_eq!(occurrences("nothing here", "rust"), 0);
        assert_eq!(occurrences("anything", ""), 0);
    }

    #[test]
    fn negative_net_approval_scores_stay_finite() {
        let downvoted = item("basketball drama", "", -40, 3);
        let s = score_item(&downvoted, "basketball");
        assert!(s.is_finite());
        assert!(s > 0.0, "keyword match must still contribute: {s}");
    }

    #[test]
    fn ranked_items_carry_their_score() {
        let ranked = rank_by_relevance(vec![item("basketball recap", "", 5, 1)], "basketball");
        assert!(ranked[0].relevance_score.is_some());
    }
}
