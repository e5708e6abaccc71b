use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::{AppError, FileToDelete, PendingRecord};
use sqlx::{PgPool, Postgres, Transaction};

/// Durable record of uploads that are still pending.
///
/// Insert and lookup run directly against the store. Deletions go through a
/// [`PendingLedgerTx`] obtained from [`PendingLedger::begin`], usually via
/// [`crate::TransactionManager`].
#[async_trait]
pub trait PendingLedger: Send + Sync {
    /// Record a pending upload. Inserting an existing key is a no-op.
    async fn insert(
        &self,
        filename: &str,
        category: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn get(&self, filename: &str, category: &str)
        -> Result<Option<PendingRecord>, AppError>;

    /// Open a transactional handle on the ledger.
    async fn begin(&self) -> Result<Box<dyn PendingLedgerTx>, AppError>;
}

/// Ledger operations bound to one open transaction.
#[async_trait]
pub trait PendingLedgerTx: Send {
    /// Remove one record. A missing record is not an error.
    async fn delete_one(&mut self, filename: &str, category: &str) -> Result<(), AppError>;

    /// Remove up to `limit` records created at or before `cutoff`, oldest
    /// first, and return exactly the removed keys.
    async fn delete_expired_batch(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileToDelete>, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// Postgres-backed ledger over the `pending_files` table.
#[derive(Clone)]
pub struct PgPendingLedger {
    pool: PgPool,
}

impl PgPendingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingLedger for PgPendingLedger {
    #[tracing::instrument(skip(self))]
    async fn insert(
        &self,
        filename: &str,
        category: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO pending_files (filename, category, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (filename, category) DO NOTHING
            "#,
        )
        .bind(filename)
        .bind(category)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(
        &self,
        filename: &str,
        category: &str,
    ) -> Result<Option<PendingRecord>, AppError> {
        let record = sqlx::query_as::<_, PendingRecord>(
            r#"
            SELECT filename, category, created_at
            FROM pending_files
            WHERE filename = $1 AND category = $2
            "#,
        )
        .bind(filename)
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn begin(&self) -> Result<Box<dyn PendingLedgerTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPendingLedgerTx { tx }))
    }
}

struct PgPendingLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PendingLedgerTx for PgPendingLedgerTx {
    #[tracing::instrument(skip(self))]
    async fn delete_one(&mut self, filename: &str, category: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            DELETE FROM pending_files
            WHERE filename = $1 AND category = $2
            "#,
        )
        .bind(filename)
        .bind(category)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_expired_batch(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileToDelete>, AppError> {
        // SKIP LOCKED keeps concurrent sweeps from claiming the same rows.
        let removed = sqlx::query_as::<_, FileToDelete>(
            r#"
            WITH expired AS (
                SELECT filename, category
                FROM pending_files
                WHERE created_at <= $1
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            DELETE FROM pending_files p
            USING expired e
            WHERE p.filename = e.filename AND p.category = e.category
            RETURNING p.filename, p.category
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        tracing::debug!(removed = removed.len(), "Claimed expired pending files");
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
