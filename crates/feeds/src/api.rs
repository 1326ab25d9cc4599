//! Typed endpoints over the raw feed client.
//!
//! The upstream API wraps everything in a `data`/`attributes` envelope and
//! encodes most numbers as strings; conversion here is lenient, skipping
//! malformed rows instead of failing a whole response.

use crate::client::FeedClient;
use crate::error::FeedError;
use poolwatch_core::{PoolId, PoolStats, TradeEvent, TradeSide};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Configuration for the typed API.
#[derive(Debug, Clone)]
pub struct MarketApiConfig {
    /// Base URL of the feed API, e.g. `https://api.example.com/v2`.
    pub base_url: String,
    /// Cache TTL for trade pages; short, trades go stale fast.
    pub trades_ttl: Duration,
    /// Cache TTL for token lookups; pool/symbol mappings barely change.
    pub token_ttl: Duration,
    /// Cache TTL for pool stats used in enrichment.
    pub stats_ttl: Duration,
}

impl Default for MarketApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/v2".to_string(),
            trades_ttl: Duration::from_secs(3),
            token_ttl: Duration::from_secs(300),
            stats_ttl: Duration::from_secs(60),
        }
    }
}

/// Top pool resolved for a token address.
#[derive(Debug, Clone, PartialEq)]
pub struct TopPool {
    pub pool: PoolId,
    pub symbol: String,
}

/// Typed access to the upstream feed API.
pub struct MarketApi {
    client: Arc<FeedClient>,
    config: MarketApiConfig,
}

impl MarketApi {
    pub fn new(client: Arc<FeedClient>, config: MarketApiConfig) -> Result<Self, FeedError> {
        Url::parse(&config.base_url)
            .map_err(|e| FeedError::Parse(format!("invalid base url {}: {e}", config.base_url)))?;
        Ok(Self { client, config })
    }

    pub fn client(&self) -> &Arc<FeedClient> {
        &self.client
    }

    /// Resolve a token address to its top pool and display symbol.
    pub async fn top_pool(&self, token_address: &str) -> Result<TopPool, FeedError> {
        let url = format!("{}/tokens/{token_address}", self.config.base_url);
        let value = self.client.fetch(&url, self.config.token_ttl).await?;
        parse_top_pool(value)
    }

    /// Most recent trades for a pool, newest-first as the upstream returns
    /// them.
    pub async fn recent_trades(
        &self,
        pool: &PoolId,
        limit: usize,
    ) -> Result<Vec<TradeEvent>, FeedError> {
        let url = format!(
            "{}/pools/{}/trades?limit={limit}",
            self.config.base_url, pool
        );
        let value = self.client.fetch(&url, self.config.trades_ttl).await?;
        Ok(parse_trades(value))
    }

    /// Supplementary pool statistics for alert enrichment.
    pub async fn pool_stats(&self, pool: &PoolId) -> Result<PoolStats, FeedError> {
        let url = format!("{}/pools/{}", self.config.base_url, pool);
        let value = self.client.fetch(&url, self.config.stats_ttl).await?;
        parse_pool_stats(value)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    attributes: TokenAttributes,
    #[serde(default)]
    relationships: Option<TokenRelationships>,
}

#[derive(Debug, Deserialize)]
struct TokenAttributes {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct TokenRelationships {
    #[serde(default)]
    top_pools: Option<RelatedPools>,
}

#[derive(Debug, Deserialize)]
struct RelatedPools {
    #[serde(default)]
    data: Vec<RelatedPool>,
}

#[derive(Debug, Deserialize)]
struct RelatedPool {
    id: String,
}

fn parse_top_pool(value: Value) -> Result<TopPool, FeedError> {
    let response: TokenResponse = serde_json::from_value(value)?;
    let pool_id = response
        .data
        .relationships
        .and_then(|r| r.top_pools)
        .and_then(|p| p.data.into_iter().next())
        .ok_or_else(|| FeedError::Parse("token has no pools".to_string()))?;
    Ok(TopPool {
        pool: PoolId::new(&pool_id.id),
        symbol: response.data.attributes.symbol,
    })
}

#[derive(Debug, Deserialize)]
struct TradesResponse {
    #[serde(default)]
    data: Vec<TradeRow>,
}

#[derive(Debug, Deserialize)]
struct TradeRow {
    id: String,
    attributes: TradeAttributes,
}

#[derive(Debug, Deserialize)]
struct TradeAttributes {
    kind: String,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    tx_from_address: Option<String>,
    #[serde(default)]
    volume_in_usd: Option<String>,
    #[serde(default)]
    to_token_amount: Option<String>,
    #[serde(default)]
    price_to_in_usd: Option<String>,
    #[serde(default)]
    block_timestamp: Option<i64>,
}

fn parse_trades(value: Value) -> Vec<TradeEvent> {
    let response: TradesResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "unparseable trades page");
            return Vec::new();
        }
    };

    response
        .data
        .into_iter()
        .filter_map(|row| {
            let side = match row.attributes.kind.as_str() {
                "buy" => TradeSide::Buy,
                "sell" => TradeSide::Sell,
                other => {
                    debug!(trade = %row.id, kind = other, "skipping trade of unknown kind");
                    return None;
                }
            };
            Some(TradeEvent {
                trade_id: row.id,
                tx_hash: row.attributes.tx_hash.unwrap_or_default(),
                side,
                usd_amount: parse_f64(row.attributes.volume_in_usd.as_deref()),
                token_amount: parse_f64(row.attributes.to_token_amount.as_deref()),
                price_usd: opt_f64(row.attributes.price_to_in_usd.as_deref()),
                actor: row.attributes.tx_from_address,
                timestamp: row.attributes.block_timestamp.unwrap_or(0),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct PoolResponse {
    data: PoolData,
}

#[derive(Debug, Deserialize)]
struct PoolData {
    attributes: PoolAttributes,
}

#[derive(Debug, Deserialize)]
struct PoolAttributes {
    #[serde(default)]
    reserve_in_usd: Option<String>,
    #[serde(default)]
    volume_usd_24h: Option<String>,
    #[serde(default)]
    base_token_price_usd: Option<String>,
    #[serde(default)]
    market_cap_usd: Option<String>,
    #[serde(default)]
    fdv_usd: Option<String>,
    #[serde(default)]
    circulating_supply: Option<String>,
    #[serde(default)]
    total_supply: Option<String>,
    #[serde(default)]
    token_decimals: Option<u32>,
    #[serde(default)]
    holders_count: Option<u64>,
}

fn parse_pool_stats(value: Value) -> Result<PoolStats, FeedError> {
    let response: PoolResponse = serde_json::from_value(value)?;
    let attrs = response.data.attributes;
    Ok(PoolStats {
        liquidity_usd: opt_f64(attrs.reserve_in_usd.as_deref()),
        volume_24h_usd: opt_f64(attrs.volume_usd_24h.as_deref()),
        price_usd: opt_f64(attrs.base_token_price_usd.as_deref()),
        market_cap_usd: opt_f64(attrs.market_cap_usd.as_deref()),
        fdv_usd: opt_f64(attrs.fdv_usd.as_deref()),
        circulating_supply: attrs.circulating_supply,
        total_supply: attrs.total_supply,
        token_decimals: attrs.token_decimals,
        holders: attrs.holders_count,
    })
}

fn parse_f64(raw: Option<&str>) -> f64 {
    opt_f64(raw).unwrap_or(0.0)
}

fn opt_f64(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
}
