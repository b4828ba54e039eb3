// src/config.rs
//! Env-driven service configuration.
//!
//! Every knob has an `ENV_*` name and a `DEFAULT_*` value; `from_env` never
//! fails, it falls back to the default on missing or unparsable input.

use std::str::FromStr;
use std::time::Duration;

use crate::fetch::DEFAULT_USER_AGENT;

pub const ENV_BIND_ADDR: &str = "DIGEST_BIND_ADDR";
pub const ENV_CACHE_TTL_SECS: &str = "DIGEST_CACHE_TTL_SECS";
pub const ENV_USER_AGENT: &str = "DIGEST_USER_AGENT";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "DIGEST_REQUEST_TIMEOUT_SECS";
pub const ENV_COMMUNITY_DELAY_MS: &str = "DIGEST_COMMUNITY_DELAY_MS";
pub const ENV_REPLY_DELAY_MS: &str = "DIGEST_REPLY_DELAY_MS";
pub const ENV_PER_COMMUNITY_LIMIT: &str = "DIGEST_PER_COMMUNITY_LIMIT";
pub const ENV_MONTHLY_BUDGET: &str = "DIGEST_MONTHLY_BUDGET";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_COMMUNITY_DELAY_MS: u64 = 1000;
pub const DEFAULT_REPLY_DELAY_MS: u64 = 500;
pub const DEFAULT_PER_COMMUNITY_LIMIT: u32 = 10;
pub const DEFAULT_MONTHLY_BUDGET: u32 = 100;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub cache_ttl: Duration,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub community_delay: Duration,
    pub reply_delay: Duration,
    pub per_community_limit: u32,
    pub monthly_budget: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            community_delay: Duration::from_millis(DEFAULT_COMMUNITY_DELAY_MS),
            reply_delay: Duration::from_millis(DEFAULT_REPLY_DELAY_MS),
            per_community_limit: DEFAULT_PER_COMMUNITY_LIMIT,
            monthly_budget: DEFAULT_MONTHLY_BUDGET,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or(ENV_BIND_ADDR, DEFAULT_BIND_ADDR),
            cache_ttl: Duration::from_secs(env_parsed(ENV_CACHE_TTL_SECS, DEFAULT_CACHE_TTL_SECS)),
            user_agent: env_or(ENV_USER_AGENT, DEFAULT_USER_AGENT),
            request_timeout: Duration::from_secs(env_parsed(
                ENV_REQUEST_TIMEOUT_SECS,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            community_delay: Duration::from_millis(env_parsed(
                ENV_COMMUNITY_DELAY_MS,
                DEFAULT_COMMUNITY_DELAY_MS,
            )),
            reply_delay: Duration::from_millis(env_parsed(
                ENV_REPLY_DELAY_MS,
                DEFAULT_REPLY_DELAY_MS,
            )),
            per_community_limit: env_parsed(ENV_PER_COMMUNITY_LIMIT, DEFAULT_PER_COMMUNITY_LIMIT),
            monthly_budget: env_parsed(ENV_MONTHLY_BUDGET, DEFAULT_MONTHLY_BUDGET),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
