use async_trait::async_trait;
use chrono::Utc;
use common::IdempotencyKey;
use futures_util::future::BoxFuture;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::{Applied, Result, SagaStateId, SagaStateRecord, SagaStateRepository, StoreError};

/// PostgreSQL-backed saga state repository.
#[derive(Clone)]
pub struct PostgresSagaStateRepository {
    pool: PgPool,
}

impl PostgresSagaStateRepository {
    /// Creates a new PostgreSQL saga state repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let repository = Self::new(pool);
        repository.run_migrations().await?;
        tracing::info!("connected to saga state database");
        Ok(repository)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<SagaStateRecord> {
        Ok(SagaStateRecord {
            id: SagaStateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SagaStateRepository for PostgresSagaStateRepository {
    async fn insert(&self, record: SagaStateRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_states (id, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.payload)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: SagaStateId) -> Result<Option<SagaStateRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, payload, created_at, updated_at
            FROM saga_states
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn replace(&self, id: SagaStateId, payload: serde_json::Value) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE saga_states
            SET payload = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn remove(&self, id: SagaStateId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saga_states WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Idempotency guard whose records live in the same database as the
/// mutations they guard.
///
/// The record is inserted with `ON CONFLICT DO NOTHING` inside a transaction,
/// then the caller's mutation runs on that transaction's connection and both
/// commit together. A concurrent attempt with the same key blocks on the
/// primary key until the first transaction finishes, then sees the conflict.
#[derive(Clone)]
pub struct PostgresIdempotencyGuard {
    pool: PgPool,
}

impl PostgresIdempotencyGuard {
    /// Creates a guard over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies `mutation` unless `key` already has a record.
    ///
    /// If the mutation fails the transaction is rolled back and no record is
    /// kept.
    pub async fn apply_once<T, E, F>(
        &self,
        key: IdempotencyKey,
        mutation: F,
    ) -> std::result::Result<Applied<T>, E>
    where
        T: Send,
        E: From<sqlx::Error> + Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, std::result::Result<T, E>> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO idempotency_records (key, created_at)
            VALUES ($1, $2)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key.as_uuid())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            tx.rollback().await?;
            metrics::counter!("idempotency_duplicates_total").increment(1);
            tracing::debug!(%key, "idempotency key already applied");
            return Ok(Applied::Duplicate);
        }

        let output = mutation(&mut *tx).await?;
        tx.commit().await?;

        Ok(Applied::Fresh(output))
    }

    /// Returns true if a record exists for `key`.
    pub async fn contains(&self, key: IdempotencyKey) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM idempotency_records WHERE key = $1)")
                .bind(key.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Drops the records for `keys`, returning how many existed.
    pub async fn remove_keys(&self, keys: &[IdempotencyKey]) -> Result<u64> {
        let ids: Vec<Uuid> = keys.iter().map(IdempotencyKey::as_uuid).collect();
        let result = sqlx::query("DELETE FROM idempotency_records WHERE key = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
