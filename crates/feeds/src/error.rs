//! Error types for feed operations.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the feed client.
///
/// Clone so one in-flight request can hand its outcome to every coalesced
/// caller.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by upstream")]
    Throttled { retry_after: Option<Duration> },

    #[error("feed not found: {0}")]
    NotFound(String),

    #[error("upstream error: HTTP {status}")]
    Upstream { status: u16 },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("coalesced request channel closed")]
    ChannelClosed,
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::Parse(err.to_string())
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Network(_) | FeedError::Timeout(_) | FeedError::ChannelClosed => true,
            FeedError::Upstream { status } => *status >= 500,
            FeedError::Throttled { .. } => true,
            FeedError::NotFound(_) | FeedError::Parse(_) => false,
        }
    }

    /// Returns true if this error will not resolve without external change.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FeedError::NotFound(_) | FeedError::Parse(_))
            || matches!(self, FeedError::Upstream { status } if *status < 500)
    }
}
