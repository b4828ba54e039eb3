//! Topic digest service — binary entrypoint.
//! Boots the Axum HTTP server, wiring config, shared state, and routes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use topic_digest::aggregate::{Aggregator, Pacing};
use topic_digest::api::{create_router, AppState};
use topic_digest::cache::ResponseCache;
use topic_digest::config::ServiceConfig;
use topic_digest::fetch::{ContentFetcher, RedditSource};
use topic_digest::metrics::Metrics;
use topic_digest::ratelimit::MonthlyRateLimiter;
use topic_digest::topics::TopicRouter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("topic_digest=info,warn")),
        )
        .compact()
        .init();

    let config = ServiceConfig::from_env();
    let router = TopicRouter::from_config().context("loading topic map")?;

    let source = RedditSource::new(&config.user_agent, config.request_timeout)
        .context("building content source client")?;
    let cache = Arc::new(ResponseCache::new(config.cache_ttl));
    let fetcher = ContentFetcher::new(Arc::new(source), cache.clone());
    let aggregator = Aggregator::new(fetcher.clone(), router)
        .with_pacing(Pacing {
            between_communities: config.community_delay,
            between_replies: config.reply_delay,
        })
        .with_per_community_limit(config.per_community_limit);

    let metrics = Metrics::init(config.cache_ttl.as_secs());

    let state = AppState {
        aggregator: Arc::new(aggregator),
        fetcher,
        cache,
        limiter: Arc::new(MonthlyRateLimiter::new(config.monthly_budget)),
    };

    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "topic digest service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
