// src/api.rs
//! HTTP surface: digest generation, raw community fetch, and service
//! status. Validation happens here; everything algorithmic lives in the
//! aggregation pipeline.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::aggregate::Aggregator;
use crate::cache::ResponseCache;
use crate::fetch::{ContentFetcher, FetchError};
use crate::ratelimit::MonthlyRateLimiter;
use crate::types::{iso_now, TimeWindow};

/// Minimum accepted topic length.
pub const MIN_TOPIC_LEN: usize = 2;

const MAX_DIRECT_FETCH_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub fetcher: ContentFetcher,
    pub cache: Arc<ResponseCache>,
    pub limiter: Arc<MonthlyRateLimiter>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/topic-digest", get(topic_digest))
        .route("/api/communities/{community}/items", get(community_items))
        .route("/api/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct DigestParams {
    topic: Option<String>,
    #[serde(rename = "timeFilter")]
    time_filter: Option<String>,
}

async fn topic_digest(
    State(state): State<AppState>,
    Query(params): Query<DigestParams>,
) -> Response {
    let topic = match params.topic.as_deref().map(str::trim) {
        None => return bad_request("Topic parameter is required"),
        Some(t) if t.chars().count() < MIN_TOPIC_LEN => {
            return bad_request("Topic must be at least 2 characters long")
        }
        Some(t) => t.to_string(),
    };

    let window = match params.time_filter.as_deref() {
        None => TimeWindow::Week,
        Some(raw) => match raw.parse::<TimeWindow>() {
            Ok(w) => w,
            Err(_) => return bad_request("timeFilter must be 'week' or 'month'"),
        },
    };

    match state.aggregator.build_topic_result(&topic, window).await {
        Ok(result) => {
            let body = json!({
                "success": true,
                "newsletter": result,
                "meta": {
                    "cache": state.cache.stats(),
                    "searchQuery": topic,
                    "timeFilter": window,
                },
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!(error = %e, %topic, "topic aggregation failed");
            internal_error(&e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ItemsParams {
    limit: Option<u32>,
}

async fn community_items(
    State(state): State<AppState>,
    Path(community): Path<String>,
    Query(params): Query<ItemsParams>,
) -> Response {
    let limit = params.limit.unwrap_or(10).min(MAX_DIRECT_FETCH_LIMIT);
    match state.fetcher.community_items(&community, limit).await {
        Ok(items) => (
            StatusCode::OK,
            Json(json!({ "success": true, "community": community, "items": items })),
        )
            .into_response(),
        Err(e) => fetch_error_response(&e),
    }
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "timestamp": iso_now(),
        "apis": {
            "content": {
                "status": "operational",
                "cache": state.cache.stats(),
                "rateLimit": "delay paced, no call budget",
            },
            "budget": {
                "remainingCalls": state.limiter.remaining_calls(),
            },
        },
    }))
}

/// Map fetch failures onto externally visible status codes: upstream rate
/// limiting surfaces as 429 with a retry hint, timeouts as 408, unreachable
/// network as 503, everything else as 500 with the raw message.
pub fn fetch_error_response(err: &FetchError) -> Response {
    let (status, retry_after) = match err {
        FetchError::RateLimited { retry_after } => {
            (StatusCode::TOO_MANY_REQUESTS, Some(*retry_after))
        }
        FetchError::Timeout { .. } => (StatusCode::REQUEST_TIMEOUT, Some(30)),
        FetchError::NetworkUnreachable { .. } => (StatusCode::SERVICE_UNAVAILABLE, Some(60)),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };

    let mut body = json!({ "success": false, "error": err.to_string() });
    if let Some(secs) = retry_after {
        body["retryAfter"] = json!(secs);
    }
    (status, Json(body)).into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}
