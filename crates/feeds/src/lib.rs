//! Rate-limited access to the upstream liquidity-pool feed API.
//!
//! ## Architecture
//!
//! - `client` - TTL-cached, request-coalescing HTTP fetcher with a shared
//!   throttle cooldown
//! - `cooldown` - backoff policies and the cooldown/streak state
//! - `api` - typed endpoints (`top_pool`, `recent_trades`, `pool_stats`)
//!   over the raw fetcher

pub mod api;
pub mod client;
pub mod cooldown;
pub mod error;

pub use api::*;
pub use client::*;
pub use cooldown::*;
pub use error::*;
