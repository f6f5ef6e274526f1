use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SagaStateId;

/// The durable form of a saga's payload.
///
/// The payload is kept as raw JSON so the store stays agnostic of which saga
/// owns it; the typed facade in [`crate::SagaStateStore`] converts at the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStateRecord {
    pub id: SagaStateId,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaStateRecord {
    /// Creates a record for a freshly started saga.
    pub fn new(id: SagaStateId, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            payload,
            created_at: now,
            updated_at: now,
        }
    }
}
