//! One poll tick: rotate to the next pool, fetch its newest trade, dedup,
//! broadcast.

use crate::broadcast::Broadcaster;
use crate::dedup::DedupTracker;
use crate::scheduler::PollScheduler;
use poolwatch_core::PoolId;
use poolwatch_feeds::{FeedError, MarketApi};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the poll engine.
#[derive(Debug, Clone)]
pub struct PollEngineConfig {
    /// Trades requested per poll; only the newest is evaluated.
    pub trades_limit: usize,
    /// How long idle pools keep their dedup record.
    pub dedup_ttl: Duration,
}

impl Default for PollEngineConfig {
    fn default() -> Self {
        Self {
            trades_limit: 5,
            dedup_ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The polling set is empty.
    Idle,
    /// A previous tick is still running; nothing was scheduled.
    Skipped,
    /// The pool's newest trade was already delivered (or it has none).
    NoNewTrade(PoolId),
    /// A new trade was fanned out.
    Broadcast { pool: PoolId, delivered: usize },
    /// The feed answered 404; watchers were notified and the pool retired.
    FeedGone(PoolId),
    /// The poll failed; this tick degraded to a no-op.
    Degraded(PoolId),
}

/// Drives the round-robin rotation: each tick polls exactly one pool and
/// evaluates only its single newest trade.
pub struct PollEngine {
    scheduler: PollScheduler,
    dedup: DedupTracker,
    api: Arc<MarketApi>,
    broadcaster: Broadcaster,
    config: PollEngineConfig,
}

impl PollEngine {
    pub fn new(api: Arc<MarketApi>, broadcaster: Broadcaster, config: PollEngineConfig) -> Self {
        Self {
            scheduler: PollScheduler::new(),
            dedup: DedupTracker::new(config.dedup_ttl),
            api,
            broadcaster,
            config,
        }
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = self.scheduler.begin_tick() else {
            debug!("previous tick still running, skipping this one");
            return TickOutcome::Skipped;
        };
        let Some(pool) = self.scheduler.next_pool() else {
            return TickOutcome::Idle;
        };

        match self.api.recent_trades(&pool, self.config.trades_limit).await {
            Ok(trades) => {
                let Some(newest) = trades.first() else {
                    debug!(pool = %pool, "feed returned no trades");
                    return TickOutcome::NoNewTrade(pool);
                };
                if !self.dedup.is_new_trade(&pool, &newest.trade_id) {
                    return TickOutcome::NoNewTrade(pool);
                }
                let delivered = self.broadcaster.broadcast(&pool, newest).await;
                TickOutcome::Broadcast { pool, delivered }
            }
            Err(FeedError::NotFound(_)) => {
                info!(pool = %pool, "feed gone, notifying watchers and retiring pool");
                self.broadcaster.notify_feed_gone(&pool).await;
                self.scheduler.remove(&pool);
                TickOutcome::FeedGone(pool)
            }
            Err(e) => {
                warn!(pool = %pool, error = %e, "poll failed, degrading tick to no-op");
                TickOutcome::Degraded(pool)
            }
        }
    }
}
