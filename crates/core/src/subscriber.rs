//! Subscriber configuration types.

use crate::contest::Contest;
use crate::trade::PoolId;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Current subscriber config schema version. Loaders accept anything up to
/// this value and reject configs written by a newer build.
pub const CONFIG_VERSION: u32 = 2;

/// Identifier of one alert destination (a chat id on the delivery platform).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unsupported config version {0} (newest supported: {CONFIG_VERSION})")]
    UnsupportedVersion(u32),
    #[error("minimum buy amount must be a non-negative finite number, got {0}")]
    InvalidMinBuy(f64),
    #[error("tier thresholds are inverted: small_max {small_max} > large_min {large_min}")]
    InvertedTiers { small_max: f64, large_min: f64 },
    #[error("watched pool has an empty id")]
    EmptyPoolId,
    #[error("contest minimum entry must be a non-negative finite number, got {0}")]
    InvalidContestMinimum(f64),
}

/// One pool on a subscriber's watch list, with the display symbol captured
/// at the time the pool was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedPool {
    pub pool: PoolId,
    pub symbol: CompactString,
}

impl WatchedPool {
    pub fn new(pool: impl Into<PoolId>, symbol: impl AsRef<str>) -> Self {
        Self {
            pool: pool.into(),
            symbol: CompactString::new(symbol.as_ref()),
        }
    }
}

/// Presentation tier of a buy, selected by USD notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeTier {
    Small,
    Mid,
    Large,
}

/// USD thresholds separating the presentation tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Buys strictly below this are small.
    pub small_max_usd: f64,
    /// Buys at or above this are large.
    pub large_min_usd: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            small_max_usd: 500.0,
            large_min_usd: 5000.0,
        }
    }
}

impl TierThresholds {
    /// Large if usd >= large_min, mid if usd >= small_max, else small.
    pub fn tier_for(&self, usd: f64) -> TradeTier {
        if usd >= self.large_min_usd {
            TradeTier::Large
        } else if usd >= self.small_max_usd {
            TradeTier::Mid
        } else {
            TradeTier::Small
        }
    }
}

/// Emoji/labels shown per tier. Defaults match the stock alert style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierLabels {
    pub small: String,
    pub mid: String,
    pub large: String,
}

impl Default for TierLabels {
    fn default() -> Self {
        Self {
            small: "🟢".to_string(),
            mid: "🚀".to_string(),
            large: "🐳".to_string(),
        }
    }
}

impl TierLabels {
    pub fn label_for(&self, tier: TradeTier) -> &str {
        match tier {
            TradeTier::Small => &self.small,
            TradeTier::Mid => &self.mid,
            TradeTier::Large => &self.large,
        }
    }
}

/// Marker shown on every sell alert, regardless of size.
pub const SELL_MARKER: &str = "🔻";

/// Kind of media attached to alerts, inferred from the reference URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Animation,
    Photo,
    Video,
}

/// Outcome of validating a media reference.
///
/// `Unknown` means the reference could not be classified up front; it is
/// attempted as-is and demoted on the first media-classified delivery
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaValidation {
    Valid,
    Invalid,
    Unknown,
}

/// Reference to media attached to every alert for a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

impl MediaRef {
    /// Classify a URL by extension. Returns `None` for URLs that cannot
    /// carry media at all (non-http schemes).
    pub fn from_url(url: &str) -> Option<Self> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return None;
        }
        let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
        let kind = match path.rsplit('.').next() {
            Some("gif") => MediaKind::Animation,
            Some("mp4") | Some("mov") | Some("webm") => MediaKind::Video,
            Some("jpg") | Some("jpeg") | Some("png") | Some("webp") => MediaKind::Photo,
            _ => MediaKind::Animation,
        };
        Some(Self {
            url: url.to_string(),
            kind,
        })
    }

    /// Tri-state validation of the reference.
    pub fn validate(&self) -> MediaValidation {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return MediaValidation::Invalid;
        }
        let path = self.url.split(&['?', '#'][..]).next().unwrap_or(&self.url);
        match path.rsplit('.').next() {
            Some("gif") | Some("mp4") | Some("mov") | Some("webm") | Some("jpg")
            | Some("jpeg") | Some("png") | Some("webp") => MediaValidation::Valid,
            _ => MediaValidation::Unknown,
        }
    }
}

/// Per-subscriber alert configuration.
///
/// Replaced as a whole through the registry; the engine never patches
/// individual fields in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    /// Pools this subscriber receives alerts for.
    #[serde(default)]
    pub watched: Vec<WatchedPool>,
    /// Trades below this USD notional are suppressed.
    #[serde(default)]
    pub min_buy_usd: f64,
    /// When false, sell trades are never delivered.
    #[serde(default = "default_true")]
    pub show_sells: bool,
    #[serde(default)]
    pub tiers: TierThresholds,
    #[serde(default)]
    pub tier_labels: TierLabels,
    /// Media attached to every alert, if configured.
    #[serde(default)]
    pub media: Option<MediaRef>,
    /// Active contest, if one is running.
    #[serde(default)]
    pub contest: Option<Contest>,
    /// Master switch; disabled subscribers receive nothing and their
    /// watched pools do not keep feeds alive.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_config_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            watched: Vec::new(),
            min_buy_usd: 0.0,
            show_sells: true,
            tiers: TierThresholds::default(),
            tier_labels: TierLabels::default(),
            media: None,
            contest: None,
            enabled: true,
        }
    }
}

impl SubscriberConfig {
    /// Validate a loaded config. Run once at load time so read sites can
    /// trust the fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.config_version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.config_version));
        }
        if !self.min_buy_usd.is_finite() || self.min_buy_usd < 0.0 {
            return Err(ConfigError::InvalidMinBuy(self.min_buy_usd));
        }
        if self.tiers.small_max_usd > self.tiers.large_min_usd {
            return Err(ConfigError::InvertedTiers {
                small_max: self.tiers.small_max_usd,
                large_min: self.tiers.large_min_usd,
            });
        }
        if self.watched.iter().any(|w| w.pool.as_str().is_empty()) {
            return Err(ConfigError::EmptyPoolId);
        }
        if let Some(contest) = &self.contest {
            if !contest.min_entry_usd.is_finite() || contest.min_entry_usd < 0.0 {
                return Err(ConfigError::InvalidContestMinimum(contest.min_entry_usd));
            }
        }
        Ok(())
    }

    /// Whether this subscriber watches the given pool.
    pub fn watches(&self, pool: &PoolId) -> bool {
        self.watched.iter().any(|w| &w.pool == pool)
    }

    /// Display symbol stored for a watched pool.
    pub fn symbol_for(&self, pool: &PoolId) -> Option<&str> {
        self.watched
            .iter()
            .find(|w| &w.pool == pool)
            .map(|w| w.symbol.as_str())
    }
}
