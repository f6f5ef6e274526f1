//! At-most-once application of keyed mutations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::IdempotencyKey;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Marks that the mutation bound to `key` has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: IdempotencyKey,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    fn new(key: IdempotencyKey) -> Self {
        Self {
            key,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a guarded application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied<T> {
    /// The mutation ran and committed together with its record(s).
    Fresh(T),
    /// Every key already had a record; the mutation was not invoked.
    Duplicate,
}

impl<T> Applied<T> {
    /// Returns true if the application was skipped as a duplicate.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Applied::Duplicate)
    }

    /// Returns the mutation's output if it ran.
    pub fn into_fresh(self) -> Option<T> {
        match self {
            Applied::Fresh(value) => Some(value),
            Applied::Duplicate => None,
        }
    }
}

struct Guarded<S> {
    state: S,
    records: HashMap<IdempotencyKey, IdempotencyRecord>,
}

/// Guards an in-memory state `S` so keyed mutations apply at most once.
///
/// The key check, the mutation and the record insertion all happen under one
/// lock, and the mutation runs against a copy of the state that replaces the
/// original only on success. A failed mutation therefore leaves neither a
/// partial state change nor a record behind.
pub struct IdempotencyGuard<S> {
    inner: Arc<Mutex<Guarded<S>>>,
}

impl<S> Clone for IdempotencyGuard<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Default> Default for IdempotencyGuard<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> IdempotencyGuard<S> {
    /// Wraps `state` with an empty record set.
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Guarded {
                state,
                records: HashMap::new(),
            })),
        }
    }

    /// Returns true if a record exists for `key`.
    pub async fn contains(&self, key: IdempotencyKey) -> bool {
        self.inner.lock().await.records.contains_key(&key)
    }

    /// Returns the number of stored records.
    pub async fn record_count(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Drops the records for `keys`, returning how many existed.
    ///
    /// Keys that were never used are ignored.
    pub async fn remove_keys(&self, keys: &[IdempotencyKey]) -> usize {
        let mut guarded = self.inner.lock().await;
        keys.iter()
            .filter(|key| guarded.records.remove(*key).is_some())
            .count()
    }

    /// Reads the guarded state.
    pub async fn read<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.inner.lock().await.state)
    }

    /// Mutates the guarded state without a key.
    ///
    /// For operations that are idempotent by nature or not financial.
    pub async fn write<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.inner.lock().await.state)
    }
}

impl<S: Clone> IdempotencyGuard<S> {
    /// Applies `mutation` unless `key` already has a record.
    pub async fn apply_once<T, E>(
        &self,
        key: IdempotencyKey,
        mutation: impl FnOnce(&mut S) -> Result<T, E>,
    ) -> Result<Applied<T>, E> {
        self.apply_batch(&[key], |state, _| mutation(state)).await
    }

    /// Applies `mutation` for the subset of `keys` that have no record yet.
    ///
    /// The mutation receives the fresh keys and must only act on items bound
    /// to them. All fresh records commit together with the mutation, or none
    /// do. If no key is fresh the mutation is not invoked.
    pub async fn apply_batch<T, E>(
        &self,
        keys: &[IdempotencyKey],
        mutation: impl FnOnce(&mut S, &HashSet<IdempotencyKey>) -> Result<T, E>,
    ) -> Result<Applied<T>, E> {
        let mut guarded = self.inner.lock().await;

        let fresh: HashSet<IdempotencyKey> = keys
            .iter()
            .copied()
            .filter(|key| !guarded.records.contains_key(key))
            .collect();

        if fresh.is_empty() {
            metrics::counter!("idempotency_duplicates_total").increment(1);
            tracing::debug!(keys = keys.len(), "all idempotency keys already applied");
            return Ok(Applied::Duplicate);
        }

        let mut draft = guarded.state.clone();
        let output = mutation(&mut draft, &fresh)?;

        guarded.state = draft;
        for key in fresh {
            guarded.records.insert(key, IdempotencyRecord::new(key));
        }

        Ok(Applied::Fresh(output))
    }
}
