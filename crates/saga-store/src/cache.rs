use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Result, SagaStateId};

/// Fast mirror of saga payloads, keyed by saga state id.
///
/// The cache is never the source of truth: callers treat an error the same
/// as a miss and fall back to the durable repository.
#[async_trait]
pub trait SagaStateCache: Send + Sync {
    /// Returns the cached payload, or `None` on a miss or expired entry.
    async fn get(&self, id: SagaStateId) -> Result<Option<serde_json::Value>>;

    /// Stores or overwrites a payload.
    async fn put(&self, id: SagaStateId, payload: serde_json::Value) -> Result<()>;

    /// Drops a payload if present.
    async fn evict(&self, id: SagaStateId) -> Result<()>;
}

struct CacheEntry {
    payload: serde_json::Value,
    expires_at: Instant,
}

/// In-process cache with a fixed time-to-live per entry.
#[derive(Clone)]
pub struct InMemorySagaStateCache {
    entries: Arc<RwLock<HashMap<SagaStateId, CacheEntry>>>,
    ttl: Duration,
}

impl InMemorySagaStateCache {
    /// Default lifetime of a cached payload.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

    /// Creates a cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Returns the number of entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns true if a live entry exists for the id.
    pub async fn contains(&self, id: SagaStateId) -> bool {
        self.entries
            .read()
            .await
            .get(&id)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }
}

impl Default for InMemorySagaStateCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

#[async_trait]
impl SagaStateCache for InMemorySagaStateCache {
    async fn get(&self, id: SagaStateId) -> Result<Option<serde_json::Value>> {
        {
            let entries = self.entries.read().await;
            match entries.get(&id) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.payload.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired entries are dropped on read.
        self.entries.write().await.remove(&id);
        Ok(None)
    }

    /// Also drops every expired entry, so states that are never read again
    /// do not outlive their TTL.
    async fn put(&self, id: SagaStateId, payload: serde_json::Value) -> Result<()> {
        let now = Instant::now();
        let entry = CacheEntry {
            payload,
            expires_at: now + self.ttl,
        };
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(id, entry);
        Ok(())
    }

    async fn evict(&self, id: SagaStateId) -> Result<()> {
        self.entries.write().await.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = InMemorySagaStateCache::default();
        let id = SagaStateId::new();
        cache.put(id, json!({"a": 1})).await.unwrap();

        assert_eq!(cache.get(id).await.unwrap(), Some(json!({"a": 1})));
        assert!(cache.contains(id).await);
    }

    #[tokio::test]
    async fn test_miss() {
        let cache = InMemorySagaStateCache::default();
        assert_eq!(cache.get(SagaStateId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evict() {
        let cache = InMemorySagaStateCache::default();
        let id = SagaStateId::new();
        cache.put(id, json!({})).await.unwrap();
        cache.evict(id).await.unwrap();

        assert_eq!(cache.get(id).await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_is_dropped() {
        let cache = InMemorySagaStateCache::new(Duration::from_millis(10));
        let id = SagaStateId::new();
        cache.put(id, json!({})).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get(id).await.unwrap(), None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_put_purges_expired_entries() {
        let cache = InMemorySagaStateCache::new(Duration::from_millis(10));
        cache.put(SagaStateId::new(), json!({})).await.unwrap();
        cache.put(SagaStateId::new(), json!({})).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        let live = SagaStateId::new();
        cache.put(live, json!({"live": true})).await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert!(cache.contains(live).await);
    }
}
