use thiserror::Error;

use crate::SagaStateId;

/// Errors that can occur when persisting saga state or idempotency records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No saga state exists for the id.
    #[error("Saga state not found: {0}")]
    NotFound(SagaStateId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cache backend rejected an operation.
    #[error("Cache error: {0}")]
    Cache(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
