//! Application configuration, environment-driven.

use poolwatch_engine::{BroadcasterConfig, PollEngineConfig};
use poolwatch_feeds::{FeedClientConfig, MarketApiConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Feed API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Base URL of the feed API.
    pub base_url: String,
    /// Optional API key sent with every request.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Trades requested per poll.
    pub trades_limit: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            request_timeout_secs: 15,
            trades_limit: 5,
        }
    }
}

impl FeedSettings {
    pub fn client_config(&self) -> FeedClientConfig {
        FeedClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            api_key: self.api_key.clone(),
            ..Default::default()
        }
    }

    pub fn api_config(&self) -> MarketApiConfig {
        MarketApiConfig {
            base_url: self.base_url.clone(),
            ..Default::default()
        }
    }
}

/// Timer periods for the independent loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSettings {
    /// Poll tick period in milliseconds.
    pub poll_ms: u64,
    /// Watchlist refresh period in seconds.
    pub refresh_secs: u64,
    /// Contest sweep period in seconds.
    pub contest_sweep_secs: u64,
    /// Dedup/cache eviction period in seconds.
    pub evict_secs: u64,
    /// Dedup record TTL in seconds.
    pub dedup_ttl_secs: u64,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self {
            poll_ms: 1500,
            refresh_secs: 10,
            contest_sweep_secs: 30,
            evict_secs: 600,
            dedup_ttl_secs: 2 * 60 * 60,
        }
    }
}

/// Fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastSettings {
    pub enrichment_timeout_secs: u64,
    pub delivery_concurrency: usize,
    /// Explorer prefix for transaction buttons.
    pub tx_link_base: Option<String>,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            enrichment_timeout_secs: 5,
            delivery_concurrency: 16,
            tx_link_base: None,
        }
    }
}

impl BroadcastSettings {
    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            enrichment_timeout: Duration::from_secs(self.enrichment_timeout_secs),
            delivery_concurrency: self.delivery_concurrency,
            tx_link_base: self.tx_link_base.clone(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub feed: FeedSettings,
    pub intervals: IntervalSettings,
    pub broadcast: BroadcastSettings,
    pub telegram_token: String,
    pub database_url: String,
    pub health_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedSettings::default(),
            intervals: IntervalSettings::default(),
            broadcast: BroadcastSettings::default(),
            telegram_token: String::new(),
            database_url: "sqlite://poolwatch.db".to_string(),
            health_port: 8080,
        }
    }
}

impl AppConfig {
    /// Build from environment variables (after dotenv loading).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            feed: FeedSettings {
                base_url: env::var("FEED_BASE_URL")
                    .map_err(|_| ConfigError::Missing("FEED_BASE_URL"))?,
                api_key: env::var("FEED_API_KEY").ok(),
                request_timeout_secs: env_parse(
                    "FEED_TIMEOUT_SECS",
                    defaults.feed.request_timeout_secs,
                )?,
                trades_limit: env_parse("FEED_TRADES_LIMIT", defaults.feed.trades_limit)?,
            },
            intervals: IntervalSettings {
                poll_ms: env_parse("POLL_INTERVAL_MS", defaults.intervals.poll_ms)?,
                refresh_secs: env_parse("REFRESH_INTERVAL_SECS", defaults.intervals.refresh_secs)?,
                contest_sweep_secs: env_parse(
                    "CONTEST_SWEEP_SECS",
                    defaults.intervals.contest_sweep_secs,
                )?,
                evict_secs: env_parse("EVICT_INTERVAL_SECS", defaults.intervals.evict_secs)?,
                dedup_ttl_secs: env_parse("DEDUP_TTL_SECS", defaults.intervals.dedup_ttl_secs)?,
            },
            broadcast: BroadcastSettings {
                enrichment_timeout_secs: env_parse(
                    "ENRICHMENT_TIMEOUT_SECS",
                    defaults.broadcast.enrichment_timeout_secs,
                )?,
                delivery_concurrency: env_parse(
                    "DELIVERY_CONCURRENCY",
                    defaults.broadcast.delivery_concurrency,
                )?,
                tx_link_base: env::var("TX_LINK_BASE").ok(),
            },
            telegram_token: env::var("TELEGRAM_BOT_TOKEN")
                .map_err(|_| ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            health_port: env_parse("HEALTH_PORT", defaults.health_port)?,
        })
    }

    /// Validate once at startup so the loops can trust the values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.base_url.is_empty() {
            return Err(ConfigError::Missing("FEED_BASE_URL"));
        }
        if self.telegram_token.is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
        }
        if self.intervals.poll_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }
        if self.broadcast.delivery_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "DELIVERY_CONCURRENCY",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn engine_config(&self) -> PollEngineConfig {
        PollEngineConfig {
            trades_limit: self.feed.trades_limit,
            dedup_ttl: Duration::from_secs(self.intervals.dedup_ttl_secs),
        }
    }
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}
