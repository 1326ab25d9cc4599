//! Fan-out of one new trade to every watching subscriber.

use crate::registry::SubscriberRegistry;
use crate::render;
use crate::sink::{AlertButton, AlertPayload, AlertSink, DeliveryError};
use crate::unix_now;
use futures_util::stream::{self, StreamExt};
use poolwatch_core::{
    MediaValidation, PoolId, PoolStats, SubscriberConfig, SubscriberId, TradeEvent,
};
use poolwatch_feeds::MarketApi;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the broadcaster.
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Budget for the best-effort stats fetch; overruns degrade the alert.
    pub enrichment_timeout: Duration,
    /// How many deliveries run concurrently per broadcast.
    pub delivery_concurrency: usize,
    /// Explorer prefix for transaction deep links, e.g.
    /// `https://scan.example.com/tx/`. No button when unset.
    pub tx_link_base: Option<String>,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            enrichment_timeout: Duration::from_secs(5),
            delivery_concurrency: 16,
            tx_link_base: None,
        }
    }
}

/// Applies per-subscriber filters, credits contests, composes payloads and
/// hands them to the delivery sink. Failures stay contained to the one
/// subscriber they belong to.
pub struct Broadcaster {
    registry: Arc<dyn SubscriberRegistry>,
    sink: Arc<dyn AlertSink>,
    api: Arc<MarketApi>,
    config: BroadcasterConfig,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<dyn SubscriberRegistry>,
        sink: Arc<dyn AlertSink>,
        api: Arc<MarketApi>,
        config: BroadcasterConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            api,
            config,
        }
    }

    /// Fan one newly detected trade out to every watching subscriber.
    /// Returns the number of successful deliveries.
    pub async fn broadcast(&self, pool: &PoolId, trade: &TradeEvent) -> usize {
        let watchers = self.watchers_of(pool).await;
        if watchers.is_empty() {
            debug!(pool = %pool, "no subscribers watch this pool");
            return 0;
        }

        let stats = self.enrich(pool).await;
        let stats_ref = stats.as_ref();

        let outcomes: Vec<bool> = stream::iter(
            watchers
                .into_iter()
                .map(|(id, config)| self.alert_one(id, config, pool, trade, stats_ref)),
        )
        .buffer_unordered(self.config.delivery_concurrency.max(1))
        .collect()
        .await;

        let delivered = outcomes.into_iter().filter(|ok| *ok).count();
        info!(
            pool = %pool,
            trade_id = %trade.trade_id,
            delivered,
            "broadcast complete"
        );
        delivered
    }

    /// Tell every watcher the pool's feed disappeared upstream and remove
    /// it from their configs so polling stops until someone re-adds it.
    pub async fn notify_feed_gone(&self, pool: &PoolId) -> usize {
        let watchers = self.watchers_of(pool).await;
        let mut notified = 0;
        for (id, mut config) in watchers {
            let symbol = config.symbol_for(pool).unwrap_or("?").to_string();
            let payload = AlertPayload::text_only(render::render_feed_gone(&symbol, pool));
            match self.sink.deliver(id, &payload).await {
                Ok(()) => notified += 1,
                Err(DeliveryError::Gone(reason)) => {
                    warn!(subscriber = %id, reason = %reason, "destination gone, evicting subscriber");
                    if let Err(e) = self.registry.remove(id).await {
                        warn!(subscriber = %id, error = %e, "failed to evict subscriber");
                    }
                    continue;
                }
                Err(e) => debug!(subscriber = %id, error = %e, "feed-gone notice dropped"),
            }
            config.watched.retain(|w| w.pool != *pool);
            if let Err(e) = self.registry.set(id, config).await {
                warn!(subscriber = %id, error = %e, "failed to unwatch retired pool");
            }
        }
        notified
    }

    /// Enabled subscribers watching the pool, with their configs.
    /// Unreadable or invalid records are skipped.
    async fn watchers_of(&self, pool: &PoolId) -> Vec<(SubscriberId, SubscriberConfig)> {
        let ids = match self.registry.list_all().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to list subscribers");
                return Vec::new();
            }
        };

        let mut watchers = Vec::new();
        for id in ids {
            let config = match self.registry.get(id).await {
                Ok(config) => config,
                Err(e) => {
                    warn!(subscriber = %id, error = %e, "skipping unreadable subscriber record");
                    continue;
                }
            };
            if !config.enabled || !config.watches(pool) {
                continue;
            }
            if let Err(e) = config.validate() {
                warn!(subscriber = %id, error = %e, "skipping invalid subscriber record");
                continue;
            }
            watchers.push((id, config));
        }
        watchers
    }

    /// Best-effort stats fetch for enrichment; any failure means a plain
    /// alert, never a failed one.
    async fn enrich(&self, pool: &PoolId) -> Option<PoolStats> {
        match tokio::time::timeout(self.config.enrichment_timeout, self.api.pool_stats(pool)).await
        {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                debug!(pool = %pool, error = %e, "enrichment fetch failed");
                None
            }
            Err(_) => {
                debug!(pool = %pool, "enrichment timed out");
                None
            }
        }
    }

    async fn alert_one(
        &self,
        id: SubscriberId,
        mut config: SubscriberConfig,
        pool: &PoolId,
        trade: &TradeEvent,
        stats: Option<&PoolStats>,
    ) -> bool {
        if trade.side.is_sell() && !config.show_sells {
            return false;
        }
        if trade.usd_amount < config.min_buy_usd {
            return false;
        }

        if let Some(contest) = config.contest.as_mut() {
            if !contest.is_expired(unix_now()) && contest.qualifies(trade) {
                if let Some(actor) = trade.actor.clone() {
                    contest.credit(&actor, trade.usd_amount, trade.timestamp);
                    if let Err(e) = self.registry.set(id, config.clone()).await {
                        warn!(subscriber = %id, error = %e, "failed to persist contest standing");
                    }
                }
            }
        }

        let symbol = config.symbol_for(pool).unwrap_or("?").to_string();
        let text = render::render_trade_alert(&symbol, trade, &config, stats);
        let media = config
            .media
            .clone()
            .filter(|m| m.validate() != MediaValidation::Invalid);
        let payload = AlertPayload {
            text,
            media,
            buttons: self.buttons_for(trade),
        };

        match self.sink.deliver(id, &payload).await {
            Ok(()) => {
                debug!(subscriber = %id, pool = %pool, "alert delivered");
                true
            }
            Err(DeliveryError::MediaRejected(reason)) => {
                warn!(subscriber = %id, reason = %reason, "media rejected, demoting to plain alerts");
                self.demote_media(id).await;
                let plain = AlertPayload {
                    media: None,
                    ..payload
                };
                self.sink.deliver(id, &plain).await.is_ok()
            }
            Err(DeliveryError::Gone(reason)) => {
                warn!(subscriber = %id, reason = %reason, "destination gone, evicting subscriber");
                if let Err(e) = self.registry.remove(id).await {
                    warn!(subscriber = %id, error = %e, "failed to evict subscriber");
                }
                false
            }
            Err(DeliveryError::Transient(reason)) => {
                debug!(subscriber = %id, reason = %reason, "transient delivery failure, alert dropped");
                false
            }
        }
    }

    /// Clear a subscriber's media reference after it was rejected.
    async fn demote_media(&self, id: SubscriberId) {
        match self.registry.get(id).await {
            Ok(mut fresh) => {
                fresh.media = None;
                if let Err(e) = self.registry.set(id, fresh).await {
                    warn!(subscriber = %id, error = %e, "failed to persist media demotion");
                }
            }
            Err(e) => warn!(subscriber = %id, error = %e, "failed to load config for media demotion"),
        }
    }

    fn buttons_for(&self, trade: &TradeEvent) -> Vec<AlertButton> {
        let Some(base) = &self.config.tx_link_base else {
            return Vec::new();
        };
        if trade.tx_hash.is_empty() {
            return Vec::new();
        }
        let url = if base.ends_with('/') {
            format!("{base}{}", trade.tx_hash)
        } else {
            format!("{base}/{}", trade.tx_hash)
        };
        vec![AlertButton {
            label: "View Tx".to_string(),
            url,
        }]
    }
}
