//! Supplementary market data and the market-cap fallback arithmetic.

use serde::{Deserialize, Serialize};

/// Best-effort pool statistics used to enrich alerts. Every field is
/// optional; missing data degrades the alert, never fails it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub liquidity_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub fdv_usd: Option<f64>,
    /// Raw supply strings as reported upstream; see [`parse_supply`].
    pub circulating_supply: Option<String>,
    pub total_supply: Option<String>,
    pub token_decimals: Option<u32>,
    pub holders: Option<u64>,
}

/// Which valuation the fallback chain produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapKind {
    MarketCap,
    Fdv,
}

impl CapKind {
    pub fn label(&self) -> &'static str {
        match self {
            CapKind::MarketCap => "MC",
            CapKind::Fdv => "FDV",
        }
    }
}

/// Parse an upstream supply value.
///
/// Raw integer strings longer than `decimals + 2` digits are fixed-point
/// integers and are divided by `10^decimals`; decimal or exponential
/// notation is already adjusted and parses directly.
pub fn parse_supply(raw: &str, decimals: u32) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let is_raw_integer = raw.bytes().all(|b| b.is_ascii_digit());
    if is_raw_integer && raw.len() > decimals as usize + 2 {
        Some(value / 10f64.powi(decimals as i32))
    } else {
        Some(value)
    }
}

/// Resolve the valuation shown on an alert.
///
/// Order: explicit market cap ("MC"); circulating supply x price ("MC");
/// explicit fully-diluted valuation ("FDV"); total supply x price ("FDV");
/// otherwise nothing.
pub fn resolve_market_cap(stats: &PoolStats) -> Option<(f64, CapKind)> {
    if let Some(mc) = stats.market_cap_usd {
        return Some((mc, CapKind::MarketCap));
    }
    let price = stats.price_usd.unwrap_or(0.0);
    let decimals = stats.token_decimals.unwrap_or(0);
    if price > 0.0 {
        if let Some(circulating) = stats
            .circulating_supply
            .as_deref()
            .and_then(|s| parse_supply(s, decimals))
        {
            return Some((circulating * price, CapKind::MarketCap));
        }
    }
    if let Some(fdv) = stats.fdv_usd {
        return Some((fdv, CapKind::Fdv));
    }
    if let Some(total) = stats
        .total_supply
        .as_deref()
        .and_then(|s| parse_supply(s, decimals))
    {
        return Some((total * price, CapKind::Fdv));
    }
    None
}

/// Compact USD rendering: $1.23B / $5.00M / $42.1K / $123.45.
pub fn format_usd_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("${:.1}K", value / 1e3)
    } else {
        format!("${:.2}", value)
    }
}
