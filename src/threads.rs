// src/threads.rs
//! Flattening of nested reply trees.
//!
//! The comments endpoint returns `[item-listing, reply-listing]`; replies
//! nest arbitrarily under `data.replies`, which is a listing object when
//! present and an empty string when not. Anything that is not a `t1` node
//! (metadata rows, "more" placeholders, deleted stubs without a body) is
//! skipped. No quality filtering happens here; that is the aggregation
//! layer's call.

use serde_json::Value;

use crate::types::{clean_text, ReplyItem};

const REPLY_KIND: &str = "t1";

/// Flatten the raw nested structure into reply records, depth-first,
/// preserving each reply's own score/author/timestamp.
pub fn flatten_reply_tree(tree: &Value) -> Vec<ReplyItem> {
    let mut replies = Vec::new();
    if let Some(children) = tree
        .get(1)
        .and_then(|listing| listing.get("data"))
        .and_then(|data| data.get("children"))
        .and_then(Value::as_array)
    {
        for node in children {
            collect_replies(node, &mut replies);
        }
    }
    replies
}

fn collect_replies(node: &Value, out: &mut Vec<ReplyItem>) {
    let data = match node.get("data") {
        Some(d) => d,
        None => return,
    };

    if node.get("kind").and_then(Value::as_str) == Some(REPLY_KIND) {
        if let Some(reply) = reply_from_node(data) {
            out.push(reply);
        }
    }

    // Nested replies are a full listing when present, "" when empty.
    if let Some(children) = data
        .get("replies")
        .and_then(|r| r.get("data"))
        .and_then(|d| d.get("children"))
        .and_then(Value::as_array)
    {
        for child in children {
            collect_replies(child, out);
        }
    }
}

fn reply_from_node(data: &Value) -> Option<ReplyItem> {
    Some(ReplyItem {
        id: data.get("id")?.as_str()?.to_string(),
        body: clean_text(data.get("body")?.as_str()?),
        author: data
            .get("author")
            .and_then(Value::as_str)
            .unwrap_or("[deleted]")
            .to_string(),
        score: data.get("score").and_then(Value::as_i64).unwrap_or(0),
        created_utc: data
            .get("created_utc")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as i64,
        parent_id: data
            .get("parent_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        permalink: data
            .get("permalink")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
