//! Saga state persistence and the idempotency guard.
//!
//! In-flight saga payloads live in a durable repository (PostgreSQL or
//! in-memory) mirrored into a cache keyed by the same id. The
//! [`SagaStateStore`] facade writes durably first and reads through the cache.
//!
//! The [`IdempotencyGuard`] and [`PostgresIdempotencyGuard`] bind a mutation
//! to a key so it is applied at most once, with the record and the mutation
//! committing together.

pub mod cache;
pub mod error;
pub mod idempotency;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod repository;
pub mod store;

pub use cache::{InMemorySagaStateCache, SagaStateCache};
pub use common::SagaStateId;
pub use error::{Result, StoreError};
pub use idempotency::{Applied, IdempotencyGuard, IdempotencyRecord};
pub use memory::InMemorySagaStateRepository;
pub use postgres::{PostgresIdempotencyGuard, PostgresSagaStateRepository};
pub use record::SagaStateRecord;
pub use repository::SagaStateRepository;
pub use store::SagaStateStore;
