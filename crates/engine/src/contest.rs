//! Contest expiry sweep and final standings announcements.

use crate::registry::{RegistryError, SubscriberRegistry};
use crate::render;
use crate::sink::{AlertPayload, AlertSink, DeliveryError};
use crate::unix_now;
use poolwatch_core::{SubscriberConfig, SubscriberId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finds expired contests, announces their final standings and clears them.
/// Manual early termination goes through the same announce-then-clear path.
pub struct ContestSweeper {
    registry: Arc<dyn SubscriberRegistry>,
    sink: Arc<dyn AlertSink>,
}

impl ContestSweeper {
    pub fn new(registry: Arc<dyn SubscriberRegistry>, sink: Arc<dyn AlertSink>) -> Self {
        Self { registry, sink }
    }

    /// Close every contest whose end time has passed. Returns how many
    /// were closed.
    pub async fn sweep(&self) -> usize {
        let ids = match self.registry.list_all().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "contest sweep failed to list subscribers");
                return 0;
            }
        };

        let now = unix_now();
        let mut closed = 0;
        for id in ids {
            let config = match self.registry.get(id).await {
                Ok(config) => config,
                Err(e) => {
                    warn!(subscriber = %id, error = %e, "skipping unreadable subscriber record");
                    continue;
                }
            };
            let expired = match &config.contest {
                Some(contest) => contest.is_expired(now),
                None => continue,
            };
            if expired && self.finish(id, config).await {
                closed += 1;
            }
        }
        closed
    }

    /// Terminate a subscriber's contest right now, announcing whatever the
    /// leaderboard holds. Returns false when no contest is active.
    pub async fn finish_now(&self, id: SubscriberId) -> Result<bool, RegistryError> {
        let config = self.registry.get(id).await?;
        if config.contest.is_none() {
            return Ok(false);
        }
        Ok(self.finish(id, config).await)
    }

    async fn finish(&self, id: SubscriberId, mut config: SubscriberConfig) -> bool {
        let Some(contest) = config.contest.take() else {
            return false;
        };

        let standings = contest.standings();
        info!(
            subscriber = %id,
            entries = standings.len(),
            "closing contest"
        );

        let payload = AlertPayload::text_only(render::render_contest_results(&contest, &standings));
        match self.sink.deliver(id, &payload).await {
            Ok(()) => {}
            Err(DeliveryError::Gone(reason)) => {
                warn!(subscriber = %id, reason = %reason, "destination gone, evicting subscriber");
                if let Err(e) = self.registry.remove(id).await {
                    warn!(subscriber = %id, error = %e, "failed to evict subscriber");
                }
                // The contest went with the record.
                return true;
            }
            // Announcement lost, but the contest still closes; there is no
            // retry queue for delivery.
            Err(e) => debug!(subscriber = %id, error = %e, "contest announcement dropped"),
        }

        if let Err(e) = self.registry.set(id, config).await {
            warn!(subscriber = %id, error = %e, "failed to clear finished contest");
            return false;
        }
        true
    }
}
