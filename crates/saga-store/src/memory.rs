use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{Result, SagaStateId, SagaStateRecord, SagaStateRepository, StoreError};

/// In-memory saga state repository for tests and single-process deployments.
///
/// Provides the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemorySagaStateRepository {
    records: Arc<RwLock<HashMap<SagaStateId, SagaStateRecord>>>,
}

impl InMemorySagaStateRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Returns true if a record exists for the id.
    pub async fn contains(&self, id: SagaStateId) -> bool {
        self.records.read().await.contains_key(&id)
    }
}

#[async_trait]
impl SagaStateRepository for InMemorySagaStateRepository {
    async fn insert(&self, record: SagaStateRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn find(&self, id: SagaStateId) -> Result<Option<SagaStateRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn replace(&self, id: SagaStateId, payload: serde_json::Value) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.payload = payload;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn remove(&self, id: SagaStateId) -> Result<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
