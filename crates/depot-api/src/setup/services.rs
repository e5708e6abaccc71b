//! Service initialization and application state setup

use crate::state::AppState;
use anyhow::Result;
use depot_core::Config;
use depot_db::{PendingLedger, PgPendingLedger, TransactionManager};
use depot_services::{FileService, PendingService};
use depot_storage::FileStorage;
use depot_worker::{JobScheduler, ReclaimWorker};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Wire ledger, services and the reclaim job; returns the handler state and the running scheduler.
///
/// Must be called inside a Tokio runtime since the scheduler is spawned here.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn FileStorage>,
) -> Result<(Arc<AppState>, JobScheduler)> {
    let ledger: Arc<dyn PendingLedger> = Arc::new(PgPendingLedger::new(pool.clone()));
    let transactions = TransactionManager::new(ledger);
    let pending = PendingService::new(storage.clone(), transactions);

    let files = FileService::new(storage, pending.clone(), config.upload_policy().clone());

    let worker = Arc::new(ReclaimWorker::new(
        pending,
        config.pending_policy().clone(),
        config.sweep_schedule().clone(),
    ));
    // First sweep right away to pick up files left over from a previous run
    let scheduler = JobScheduler::start(worker, Duration::ZERO);

    tracing::info!(
        lifetime_secs = config.pending_policy().file_lifetime.as_secs(),
        sweep_interval_secs = config.sweep_schedule().interval.as_secs(),
        "Pending file reclaim scheduled"
    );

    let state = Arc::new(AppState {
        files,
        db_pool: pool,
    });

    Ok((state, scheduler))
}
