use chrono::{DateTime, Utc};
use depot_core::{AppError, FileToDelete};
use depot_db::TransactionManager;
use depot_storage::{FileStorage, StorageError};
use std::sync::Arc;
use tokio::time::Instant;

/// Outcome of one reclaim sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Ledger rows removed by the sweep
    pub claimed: usize,
    /// Objects deleted from storage
    pub deleted: usize,
    /// Objects that were already gone
    pub already_absent: usize,
    /// Objects whose ledger row is gone but whose deletion failed
    pub orphaned: Vec<FileToDelete>,
    /// The deadline passed before every claimed object was deleted
    pub timed_out: bool,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty()
    }
}

/// Pending-file lifecycle: enqueue on upload, then commit, rollback or expiry.
#[derive(Clone)]
pub struct PendingService {
    storage: Arc<dyn FileStorage>,
    transactions: TransactionManager,
}

impl PendingService {
    pub fn new(storage: Arc<dyn FileStorage>, transactions: TransactionManager) -> Self {
        Self {
            storage,
            transactions,
        }
    }

    /// Track a new pending upload.
    pub async fn enqueue(&self, filename: &str, category: &str) -> Result<(), AppError> {
        self.transactions
            .ledger()
            .insert(filename, category, Utc::now())
            .await
    }

    /// Finalize a pending upload. The object is kept.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self, filename: &str, category: &str) -> Result<(), AppError> {
        let (filename, category) = (filename.to_string(), category.to_string());
        self.transactions
            .run(move |tx| Box::pin(async move { tx.delete_one(&filename, &category).await }))
            .await
    }

    /// Discard a pending upload: the ledger row is removed and the object
    /// deleted in one unit of work. A missing object is not an error; any
    /// other storage failure keeps the ledger row.
    #[tracing::instrument(skip(self))]
    pub async fn rollback(&self, filename: &str, category: &str) -> Result<(), AppError> {
        let storage = self.storage.clone();
        let (filename, category) = (filename.to_string(), category.to_string());

        self.transactions
            .run(move |tx| {
                Box::pin(async move {
                    tx.delete_one(&filename, &category).await?;
                    match storage.delete(&filename, &category).await {
                        Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
                        Err(e) => Err(AppError::from(e)),
                    }
                })
            })
            .await
    }

    /// Remove up to `limit` ledger rows created at or before `cutoff` and
    /// delete their objects, stopping at `deadline`.
    ///
    /// The ledger rows are committed as removed before any object is deleted.
    /// If a deletion fails, or the deadline passes before it finishes, the
    /// object is orphaned: nothing references it any more, so it is reported
    /// and logged but never retried. A deadline that passes before the rows
    /// are claimed fails the sweep without touching the ledger.
    #[tracing::instrument(skip(self, deadline))]
    pub async fn sweep(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
        deadline: Instant,
    ) -> Result<SweepReport, AppError> {
        if Instant::now() >= deadline {
            return Err(AppError::Internal(
                "sweep deadline passed before claiming expired files".to_string(),
            ));
        }

        let claim = self
            .transactions
            .run(move |tx| Box::pin(async move { tx.delete_expired_batch(cutoff, limit).await }));
        let expired = tokio::time::timeout_at(deadline, claim)
            .await
            .map_err(|_| {
                AppError::Internal("sweep timed out while claiming expired files".to_string())
            })??;

        let mut report = SweepReport {
            claimed: expired.len(),
            ..Default::default()
        };

        let mut remaining = expired.into_iter();
        while let Some(file) = remaining.next() {
            let result = if Instant::now() >= deadline {
                None
            } else {
                let deletion = self.storage.delete(&file.filename, &file.category);
                tokio::time::timeout_at(deadline, deletion).await.ok()
            };

            match result {
                Some(Ok(())) => {
                    tracing::debug!(
                        category = %file.category,
                        filename = %file.filename,
                        "Deleted expired pending file"
                    );
                    report.deleted += 1;
                }
                Some(Err(StorageError::NotFound(_))) => {
                    report.already_absent += 1;
                }
                Some(Err(e)) => {
                    tracing::error!(
                        error = %e,
                        category = %file.category,
                        filename = %file.filename,
                        "Failed to delete expired pending file; object is orphaned"
                    );
                    report.orphaned.push(file);
                }
                None => {
                    report.timed_out = true;
                    for file in std::iter::once(file).chain(remaining.by_ref()) {
                        tracing::error!(
                            category = %file.category,
                            filename = %file.filename,
                            "Sweep deadline passed before deletion; object is orphaned"
                        );
                        report.orphaned.push(file);
                    }
                }
            }
        }

        Ok(report)
    }
}
