//! Subscriber registry interface and the in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use poolwatch_core::{SubscriberConfig, SubscriberId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subscriber not found: {0}")]
    NotFound(SubscriberId),

    #[error("invalid subscriber record for {id}: {reason}")]
    Invalid { id: SubscriberId, reason: String },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Source of truth for subscriber state.
///
/// `set` replaces the whole config; callers do read-modify-write, never
/// partial patches. Implementations must tolerate concurrent callers.
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    async fn get(&self, id: SubscriberId) -> Result<SubscriberConfig, RegistryError>;
    async fn set(&self, id: SubscriberId, config: SubscriberConfig) -> Result<(), RegistryError>;
    async fn list_all(&self) -> Result<Vec<SubscriberId>, RegistryError>;
    async fn remove(&self, id: SubscriberId) -> Result<(), RegistryError>;
}

/// DashMap-backed registry for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: DashMap<SubscriberId, SubscriberConfig>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriberRegistry for InMemoryRegistry {
    async fn get(&self, id: SubscriberId) -> Result<SubscriberConfig, RegistryError> {
        self.entries
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NotFound(id))
    }

    async fn set(&self, id: SubscriberId, config: SubscriberConfig) -> Result<(), RegistryError> {
        self.entries.insert(id, config);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SubscriberId>, RegistryError> {
        Ok(self.entries.iter().map(|entry| *entry.key()).collect())
    }

    async fn remove(&self, id: SubscriberId) -> Result<(), RegistryError> {
        self.entries.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let registry = InMemoryRegistry::new();
        let id = SubscriberId(42);

        assert!(matches!(
            registry.get(id).await,
            Err(RegistryError::NotFound(_))
        ));

        let mut config = SubscriberConfig::default();
        config.min_buy_usd = 25.0;
        registry.set(id, config.clone()).await.unwrap();

        assert_eq!(registry.get(id).await.unwrap(), config);
        assert_eq!(registry.list_all().await.unwrap(), vec![id]);

        registry.remove(id).await.unwrap();
        assert!(registry.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_replaces_whole_config() {
        let registry = InMemoryRegistry::new();
        let id = SubscriberId(7);

        let mut first = SubscriberConfig::default();
        first.min_buy_usd = 10.0;
        registry.set(id, first).await.unwrap();

        let second = SubscriberConfig::default();
        registry.set(id, second.clone()).await.unwrap();
        assert_eq!(registry.get(id).await.unwrap(), second);
    }
}
