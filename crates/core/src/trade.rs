//! Trade events observed on liquidity pool feeds.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one liquidity pool being polled.
///
/// Opaque to the engine; the upstream feed defines its shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(CompactString);

impl PoolId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for PoolId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Buy or sell side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, TradeSide::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, TradeSide::Sell)
    }
}

/// A normalized trade observation from a feed.
///
/// Immutable once fetched; the upstream feed returns trades newest-first
/// and trade ids are unique per pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Unique id of the trade within its pool.
    pub trade_id: String,
    /// On-chain transaction reference.
    pub tx_hash: String,
    /// Trade side as reported upstream.
    pub side: TradeSide,
    /// Notional value in USD.
    pub usd_amount: f64,
    /// Token amount exchanged.
    pub token_amount: f64,
    /// Unit price in USD, when the feed supplies one.
    pub price_usd: Option<f64>,
    /// Wallet address behind the trade, when known.
    pub actor: Option<String>,
    /// Unix timestamp (seconds) of the trade.
    pub timestamp: i64,
}
