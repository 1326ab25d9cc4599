//! Last-seen trade tracking per pool.

use dashmap::DashMap;
use poolwatch_core::PoolId;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct SeenTrade {
    trade_id: String,
    recorded_at: Instant,
}

/// Remembers the last delivered trade id per pool to suppress re-delivery.
///
/// Entries expire after a bounded TTL; losing one can at worst re-alert a
/// trade on a pool that has been idle that long, which recency makes moot.
#[derive(Debug)]
pub struct DedupTracker {
    seen: DashMap<PoolId, SeenTrade>,
    ttl: Duration,
}

impl DedupTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
        }
    }

    /// True exactly once per distinct trade id per pool: when the id
    /// differs from the stored last-seen id (or nothing is stored), it is
    /// recorded and the trade counts as new.
    pub fn is_new_trade(&self, pool: &PoolId, trade_id: &str) -> bool {
        let mut entry = self.seen.entry(pool.clone()).or_insert_with(|| SeenTrade {
            trade_id: String::new(),
            recorded_at: Instant::now(),
        });
        if entry.trade_id == trade_id {
            return false;
        }
        entry.trade_id = trade_id.to_string();
        entry.recorded_at = Instant::now();
        true
    }

    /// Drop records whose pool has been quiet longer than the TTL.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.seen.len();
        self.seen
            .retain(|_, seen| now.duration_since(seen.recorded_at) < self.ttl);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_trade_exactly_once() {
        let tracker = DedupTracker::new(Duration::from_secs(3600));
        let pool = PoolId::new("p1");

        assert!(tracker.is_new_trade(&pool, "t1"));
        assert!(!tracker.is_new_trade(&pool, "t1"));
        assert!(!tracker.is_new_trade(&pool, "t1"));

        assert!(tracker.is_new_trade(&pool, "t2"));
        assert!(!tracker.is_new_trade(&pool, "t2"));
    }

    #[test]
    fn test_pools_are_independent() {
        let tracker = DedupTracker::new(Duration::from_secs(3600));
        assert!(tracker.is_new_trade(&PoolId::new("p1"), "t1"));
        // Same id on another pool is still new there.
        assert!(tracker.is_new_trade(&PoolId::new("p2"), "t1"));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_eviction_by_ttl() {
        let tracker = DedupTracker::new(Duration::ZERO);
        let pool = PoolId::new("p1");
        assert!(tracker.is_new_trade(&pool, "t1"));

        assert_eq!(tracker.evict_expired(), 1);
        assert!(tracker.is_empty());

        // After eviction the same id counts as new again.
        assert!(tracker.is_new_trade(&pool, "t1"));
    }
}
