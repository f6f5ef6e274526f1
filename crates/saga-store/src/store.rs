use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{
    InMemorySagaStateCache, InMemorySagaStateRepository, Result, SagaStateCache, SagaStateId,
    SagaStateRecord, SagaStateRepository, StoreError,
};

/// Typed create/get/update/delete over a durable repository and its cache.
///
/// Writes go to the durable repository first and then to the cache. Reads try
/// the cache and fall back to the repository on a miss, repopulating the
/// cache. Cache failures are logged and treated as misses.
///
/// Callers treat a loaded payload as a snapshot and write back a full
/// replacement; there is no partial update.
#[derive(Clone)]
pub struct SagaStateStore {
    repository: Arc<dyn SagaStateRepository>,
    cache: Arc<dyn SagaStateCache>,
}

impl SagaStateStore {
    /// Creates a store over the given repository and cache.
    pub fn new(repository: Arc<dyn SagaStateRepository>, cache: Arc<dyn SagaStateCache>) -> Self {
        Self { repository, cache }
    }

    /// Creates a store backed entirely by memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemorySagaStateRepository::new()),
            Arc::new(InMemorySagaStateCache::default()),
        )
    }

    /// Persists a new payload and returns its freshly generated id.
    #[tracing::instrument(skip(self, payload))]
    pub async fn create<P: Serialize>(&self, payload: &P) -> Result<SagaStateId> {
        let id = SagaStateId::new();
        let value = serde_json::to_value(payload)?;

        self.repository
            .insert(SagaStateRecord::new(id, value.clone()))
            .await?;
        self.refresh_cache(id, value).await;

        tracing::debug!(%id, "saga state created");
        Ok(id)
    }

    /// Loads a payload, reading through the cache.
    #[tracing::instrument(skip(self))]
    pub async fn get<P: DeserializeOwned>(&self, id: SagaStateId) -> Result<P> {
        match self.cache.get(id).await {
            Ok(Some(value)) => {
                metrics::counter!("saga_state_cache_hits_total").increment(1);
                return Ok(serde_json::from_value(value)?);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%id, error = %e, "saga state cache read failed"),
        }

        metrics::counter!("saga_state_cache_misses_total").increment(1);
        tracing::debug!(%id, "saga state cache miss");

        let record = self
            .repository
            .find(id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        let payload = serde_json::from_value(record.payload.clone())?;
        self.refresh_cache(id, record.payload).await;

        Ok(payload)
    }

    /// Replaces a payload durably, then in the cache.
    #[tracing::instrument(skip(self, payload))]
    pub async fn update<P: Serialize>(&self, id: SagaStateId, payload: &P) -> Result<()> {
        let value = serde_json::to_value(payload)?;
        self.repository.replace(id, value.clone()).await?;
        self.refresh_cache(id, value).await;
        Ok(())
    }

    /// Removes a payload from both the repository and the cache.
    ///
    /// Deleting an unknown id is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: SagaStateId) -> Result<()> {
        let existed = self.repository.remove(id).await?;
        if let Err(e) = self.cache.evict(id).await {
            tracing::warn!(%id, error = %e, "saga state cache eviction failed");
        }

        tracing::debug!(%id, existed, "saga state deleted");
        Ok(())
    }

    async fn refresh_cache(&self, id: SagaStateId, value: serde_json::Value) {
        if let Err(e) = self.cache.put(id, value).await {
            tracing::warn!(%id, error = %e, "saga state cache write failed");
            // Never leave a stale entry behind.
            if let Err(e) = self.cache.evict(id).await {
                tracing::error!(%id, error = %e, "stale saga state may remain in cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        buyer: String,
        order_id: Option<String>,
    }

    fn payload() -> Payload {
        Payload {
            buyer: "ada".to_string(),
            order_id: None,
        }
    }

    fn setup() -> (
        SagaStateStore,
        InMemorySagaStateRepository,
        InMemorySagaStateCache,
    ) {
        let repository = InMemorySagaStateRepository::new();
        let cache = InMemorySagaStateCache::default();
        let store = SagaStateStore::new(Arc::new(repository.clone()), Arc::new(cache.clone()));
        (store, repository, cache)
    }

    #[tokio::test]
    async fn test_create_writes_durable_and_cache() {
        let (store, repository, cache) = setup();
        let id = store.create(&payload()).await.unwrap();

        assert!(repository.contains(id).await);
        assert!(cache.contains(id).await);
    }

    #[tokio::test]
    async fn test_get_hits_cache() {
        let (store, _, _) = setup();
        let id = store.create(&payload()).await.unwrap();

        let loaded: Payload = store.get(id).await.unwrap();
        assert_eq!(loaded, payload());
    }

    #[tokio::test]
    async fn test_get_falls_back_to_durable_and_repopulates_cache() {
        let (store, _, cache) = setup();
        let id = store.create(&payload()).await.unwrap();
        cache.evict(id).await.unwrap();

        let loaded: Payload = store.get(id).await.unwrap();
        assert_eq!(loaded, payload());
        assert!(cache.contains(id).await);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (store, _, _) = setup();
        let result = store.get::<Payload>(SagaStateId::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_replaces_both_copies() {
        let (store, repository, cache) = setup();
        let id = store.create(&payload()).await.unwrap();

        let mut updated = payload();
        updated.order_id = Some("order-1".to_string());
        store.update(id, &updated).await.unwrap();

        let cached: Payload = serde_json::from_value(cache.get(id).await.unwrap().unwrap()).unwrap();
        assert_eq!(cached, updated);
        let durable = repository.find(id).await.unwrap().unwrap();
        assert_eq!(durable.payload["order_id"], "order-1");
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let (store, _, _) = setup();
        let result = store.update(SagaStateId::new(), &payload()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_both_copies() {
        let (store, repository, cache) = setup();
        let id = store.create(&payload()).await.unwrap();

        store.delete(id).await.unwrap();

        assert!(!repository.contains(id).await);
        assert!(!cache.contains(id).await);
        assert!(store.delete(id).await.is_ok());
    }

    struct BrokenCache;

    #[async_trait]
    impl SagaStateCache for BrokenCache {
        async fn get(&self, _id: SagaStateId) -> Result<Option<serde_json::Value>> {
            Err(StoreError::Cache("connection refused".to_string()))
        }

        async fn put(&self, _id: SagaStateId, _payload: serde_json::Value) -> Result<()> {
            Err(StoreError::Cache("connection refused".to_string()))
        }

        async fn evict(&self, _id: SagaStateId) -> Result<()> {
            Err(StoreError::Cache("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cache_failures_fall_back_to_durable() {
        let repository = InMemorySagaStateRepository::new();
        let store = SagaStateStore::new(Arc::new(repository.clone()), Arc::new(BrokenCache));

        let id = store.create(&payload()).await.unwrap();
        let loaded: Payload = store.get(id).await.unwrap();
        assert_eq!(loaded, payload());

        store.delete(id).await.unwrap();
        assert!(!repository.contains(id).await);
    }

    /// Accepts reads and evictions but refuses writes.
    #[derive(Clone, Default)]
    struct ReadOnlyCache {
        inner: InMemorySagaStateCache,
    }

    #[async_trait]
    impl SagaStateCache for ReadOnlyCache {
        async fn get(&self, id: SagaStateId) -> Result<Option<serde_json::Value>> {
            self.inner.get(id).await
        }

        async fn put(&self, _id: SagaStateId, _payload: serde_json::Value) -> Result<()> {
            Err(StoreError::Cache("read only".to_string()))
        }

        async fn evict(&self, id: SagaStateId) -> Result<()> {
            self.inner.evict(id).await
        }
    }

    #[tokio::test]
    async fn test_failed_cache_write_evicts_stale_entry() {
        let repository = InMemorySagaStateRepository::new();
        let cache = ReadOnlyCache::default();
        let store = SagaStateStore::new(Arc::new(repository.clone()), Arc::new(cache.clone()));

        let id = store.create(&payload()).await.unwrap();
        cache
            .inner
            .put(id, serde_json::to_value(payload()).unwrap())
            .await
            .unwrap();

        let mut updated = payload();
        updated.order_id = Some("order-1".to_string());
        store.update(id, &updated).await.unwrap();

        assert!(!cache.inner.contains(id).await);
        let loaded: Payload = store.get(id).await.unwrap();
        assert_eq!(loaded, updated);
    }
}
