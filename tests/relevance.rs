//! Relevance filter precision and ranking order.

use topic_digest::score::{is_relevant, rank_by_relevance, score_item};
use topic_digest::types::ContentItem;

fn item(id: &str, title: &str, body: Option<&str>, score: i64, reply_count: u64) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: title.to_string(),
        body: body.map(str::to_string),
        author: "someone".into(),
        community: "test".into(),
        score,
        reply_count,
        created_utc: 1_700_000_000,
        permalink: format!("/r/test/comments/{id}/"),
        relevance_score: None,
    }
}

#[test]
fn topical_title_passes_the_filter() {
    let post = item("a", "NBA Finals basketball recap", None, 100, 20);
    assert!(is_relevant(&post, "basketball"));
}

#[test]
fn unrelated_title_fails_the_filter() {
    let post = item("a", "weekly recipe roundup", None, 100, 20);
    assert!(!is_relevant(&post, "basketball"));
}

#[test]
fn body_only_match_still_passes_the_filter() {
    let post = item(
        "a",
        "weekly discussion thread",
        Some("plenty of basketball talk in here"),
        10,
        5,
    );
    assert!(is_relevant(&post, "basketball"));
}

#[test]
fn title_match_scores_strictly_higher_than_body_match() {
    // Equal engagement; only the match location differs.
    let in_title = item("a", "basketball trade deadline recap", None, 50, 10);
    let in_body = item(
        "b",
        "weekly discussion thread",
        Some("a lot of basketball talk"),
        50,
        10,
    );
    let title_score = score_item(&in_title, "basketball");
    let body_score = score_item(&in_body, "basketball");
    assert!(
        title_score > body_score,
        "title match {title_score} must beat body match {body_score}"
    );
}

#[test]
fn ranking_is_descending_and_ties_keep_fetch_order() {
    let twin_a = item("first", "basketball news", None, 10, 2);
    let twin_b = item("second", "basketball news", None, 10, 2);
    let strong = item(
        "strong",
        "basketball basketball basketball",
        None,
        10,
        2,
    );

    let ranked = rank_by_relevance(vec![twin_a, twin_b, strong], "basketball");
    let ids: Vec<&str> = ranked.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["strong", "first", "second"]);

    let scores: Vec<f64> = ranked.iter().map(|p| p.relevance_score.unwrap()).collect();
    assert!(scores[0] > scores[1]);
    assert_eq!(scores[1], scores[2], "twins must score identically");
}

#[test]
fn ranking_decorates_copies_without_touching_the_input() {
    let items = vec![item("a", "basketball recap", None, 5, 1)];
    let ranked = rank_by_relevance(items.clone(), "basketball");

    assert!(items[0].relevance_score.is_none(), "input stays undecorated");
    assert!(ranked[0].relevance_score.is_some());
}
