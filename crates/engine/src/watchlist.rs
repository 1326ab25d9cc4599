//! Unions subscribers' watched pools into the active polling set.

use crate::registry::SubscriberRegistry;
use crate::scheduler::PollScheduler;
use poolwatch_core::PoolId;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Periodically rebuilds the polling set from the registry. Runs on its
/// own interval, independent of the poll tick rate.
pub struct WatchlistAggregator {
    registry: Arc<dyn SubscriberRegistry>,
}

impl WatchlistAggregator {
    pub fn new(registry: Arc<dyn SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Union every enabled subscriber's watched pools, dedup preserving
    /// first-seen order, and atomically replace the scheduler's set.
    /// Unreadable subscriber records are skipped, never fatal.
    /// Returns the size of the new set.
    pub async fn refresh(&self, scheduler: &PollScheduler) -> usize {
        let ids = match self.registry.list_all().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "watchlist refresh failed to list subscribers");
                return scheduler.len();
            }
        };

        let mut ordered: Vec<PoolId> = Vec::new();
        let mut seen: HashSet<PoolId> = HashSet::new();
        for id in ids {
            let config = match self.registry.get(id).await {
                Ok(config) => config,
                Err(e) => {
                    warn!(subscriber = %id, error = %e, "skipping unreadable subscriber record");
                    continue;
                }
            };
            if !config.enabled {
                continue;
            }
            if let Err(e) = config.validate() {
                warn!(subscriber = %id, error = %e, "skipping invalid subscriber record");
                continue;
            }
            for watched in &config.watched {
                if seen.insert(watched.pool.clone()) {
                    ordered.push(watched.pool.clone());
                }
            }
        }

        let count = ordered.len();
        scheduler.replace(ordered);
        debug!(pools = count, "watchlist refreshed");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use poolwatch_core::{SubscriberConfig, SubscriberId, WatchedPool};
    use pretty_assertions::assert_eq;

    fn config_watching(pools: &[(&str, &str)]) -> SubscriberConfig {
        SubscriberConfig {
            watched: pools
                .iter()
                .map(|(pool, symbol)| WatchedPool::new(*pool, symbol))
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_unions_and_dedups() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry
            .set(SubscriberId(1), config_watching(&[("p1", "AAA"), ("p2", "BBB")]))
            .await
            .unwrap();
        registry
            .set(SubscriberId(2), config_watching(&[("p2", "BBB"), ("p3", "CCC")]))
            .await
            .unwrap();

        let scheduler = PollScheduler::new();
        let aggregator = WatchlistAggregator::new(registry);
        let count = aggregator.refresh(&scheduler).await;

        assert_eq!(count, 3);
        let mut snapshot = scheduler.snapshot();
        snapshot.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(
            snapshot,
            vec![PoolId::new("p1"), PoolId::new("p2"), PoolId::new("p3")]
        );
    }

    #[tokio::test]
    async fn test_refresh_skips_disabled_and_invalid() {
        let registry = Arc::new(InMemoryRegistry::new());

        let mut disabled = config_watching(&[("p1", "AAA")]);
        disabled.enabled = false;
        registry.set(SubscriberId(1), disabled).await.unwrap();

        let mut invalid = config_watching(&[("p2", "BBB")]);
        invalid.min_buy_usd = -5.0;
        registry.set(SubscriberId(2), invalid).await.unwrap();

        registry
            .set(SubscriberId(3), config_watching(&[("p3", "CCC")]))
            .await
            .unwrap();

        let scheduler = PollScheduler::new();
        let aggregator = WatchlistAggregator::new(registry);
        assert_eq!(aggregator.refresh(&scheduler).await, 1);
        assert_eq!(scheduler.snapshot(), vec![PoolId::new("p3")]);
    }

    #[tokio::test]
    async fn test_refresh_drops_unwatched_pools() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry
            .set(SubscriberId(1), config_watching(&[("p1", "AAA")]))
            .await
            .unwrap();

        let scheduler = PollScheduler::new();
        let aggregator = WatchlistAggregator::new(Arc::clone(&registry) as Arc<dyn SubscriberRegistry>);
        aggregator.refresh(&scheduler).await;
        assert_eq!(scheduler.len(), 1);

        // Subscriber stops watching everything.
        registry
            .set(SubscriberId(1), config_watching(&[]))
            .await
            .unwrap();
        assert_eq!(aggregator.refresh(&scheduler).await, 0);
        assert!(scheduler.is_empty());
    }
}
