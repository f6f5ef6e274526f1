use async_trait::async_trait;

use crate::{Result, SagaStateId, SagaStateRecord};

/// Durable storage for saga payloads, the source of truth on a cache miss.
///
/// Every operation is keyed by a single id; implementations never need to
/// scan across sagas.
#[async_trait]
pub trait SagaStateRepository: Send + Sync {
    /// Persists a new record.
    async fn insert(&self, record: SagaStateRecord) -> Result<()>;

    /// Loads a record, or `None` if the id is unknown.
    async fn find(&self, id: SagaStateId) -> Result<Option<SagaStateRecord>>;

    /// Replaces the payload of an existing record.
    ///
    /// Fails with `StoreError::NotFound` if the id is unknown.
    async fn replace(&self, id: SagaStateId, payload: serde_json::Value) -> Result<()>;

    /// Removes a record. Returns whether a record existed.
    async fn remove(&self, id: SagaStateId) -> Result<bool>;
}
