//! Unit-of-work wrapper around ledger transactions.
//!
//! [`TransactionManager::run`] opens a transaction, hands the caller a
//! transaction-bound [`PendingLedgerTx`], then commits on `Ok` and rolls back
//! on `Err` or panic. The caller's error is returned unchanged and a panic is
//! resumed after the rollback.

use crate::db::pending::{PendingLedger, PendingLedgerTx};
use depot_core::AppError;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Clone)]
pub struct TransactionManager {
    ledger: Arc<dyn PendingLedger>,
}

impl TransactionManager {
    pub fn new(ledger: Arc<dyn PendingLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn PendingLedger> {
        &self.ledger
    }

    /// Execute a closure within a ledger transaction
    ///
    /// # Example
    ///
    /// ```ignore
    /// let removed = manager
    ///     .run(move |tx| Box::pin(async move { tx.delete_expired_batch(cutoff, 100).await }))
    ///     .await?;
    /// ```
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: for<'a> FnOnce(
                &'a mut dyn PendingLedgerTx,
            )
                -> Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>
            + Send,
        T: Send,
    {
        let mut tx = self.ledger.begin().await?;

        let outcome = AssertUnwindSafe(f(tx.as_mut())).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back ledger transaction");
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back ledger transaction after panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
