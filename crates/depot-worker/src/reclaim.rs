//! Pending-file reclaim worker.
//!
//! Each invocation moves `Idle -> Sweeping -> {Succeeded, Failed}`:
//! compute `cutoff = now - file_lifetime`, remove one batch of expired ledger
//! rows and delete their objects, all under the configured timeout. Success
//! reschedules after the sweep interval; failure or timeout retries after the
//! backoff.
//!
//! Ledger rows are removed before their objects. When a deletion fails, or the
//! timeout interrupts the deletions, the affected objects are orphaned; the
//! sweep reports `Failed` and every orphan is logged at error level.

use crate::job::{JobHandler, JobOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_core::{FileToDelete, PendingPolicy, SweepSchedule};
use depot_services::PendingService;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Sweeping,
    Succeeded,
    Failed,
}

pub struct ReclaimWorker {
    pending: PendingService,
    policy: PendingPolicy,
    schedule: SweepSchedule,
    state: Mutex<SweepState>,
    orphaned: Mutex<Vec<FileToDelete>>,
}

impl ReclaimWorker {
    pub fn new(pending: PendingService, policy: PendingPolicy, schedule: SweepSchedule) -> Self {
        Self {
            pending,
            policy,
            schedule,
            state: Mutex::new(SweepState::Idle),
            orphaned: Mutex::new(Vec::new()),
        }
    }

    /// State of the most recent invocation.
    pub fn state(&self) -> SweepState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Objects orphaned by the most recent invocation.
    pub fn orphaned(&self) -> Vec<FileToDelete> {
        self.orphaned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_orphaned(&self, files: Vec<FileToDelete>) {
        *self.orphaned.lock().unwrap_or_else(PoisonError::into_inner) = files;
    }

    fn set_state(&self, state: SweepState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn fail(&self, reason: String) -> JobOutcome {
        self.set_state(SweepState::Failed);
        JobOutcome::Retry {
            after: self.schedule.retry_backoff,
            reason,
        }
    }

    /// Run one sweep as of `now`.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> JobOutcome {
        self.set_state(SweepState::Sweeping);
        let start = std::time::Instant::now();

        let lifetime = match chrono::Duration::from_std(self.policy.file_lifetime) {
            Ok(lifetime) => lifetime,
            Err(e) => return self.fail(format!("invalid pending file lifetime: {}", e)),
        };
        let cutoff = now - lifetime;

        tracing::info!(
            cutoff = %cutoff,
            max_files = self.policy.max_files_per_sweep,
            "Starting pending file sweep"
        );

        let deadline = tokio::time::Instant::now() + self.schedule.timeout;
        let report = match self
            .pending
            .sweep(cutoff, self.policy.max_files_per_sweep, deadline)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Pending file sweep failed");
                self.set_orphaned(Vec::new());
                return self.fail(e.to_string());
            }
        };

        if !report.is_clean() {
            for file in &report.orphaned {
                tracing::error!(
                    category = %file.category,
                    filename = %file.filename,
                    "Orphaned object left in storage"
                );
            }
            let reason = if report.timed_out {
                tracing::error!(
                    timeout_secs = self.schedule.timeout.as_secs_f64(),
                    orphaned = report.orphaned.len(),
                    "Pending file sweep timed out"
                );
                format!(
                    "sweep timed out; {} of {} expired files left in storage",
                    report.orphaned.len(),
                    report.claimed
                )
            } else {
                format!(
                    "{} of {} expired files could not be deleted",
                    report.orphaned.len(),
                    report.claimed
                )
            };
            self.set_orphaned(report.orphaned);
            return self.fail(reason);
        }

        tracing::info!(
            claimed = report.claimed,
            deleted = report.deleted,
            already_absent = report.already_absent,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Pending file sweep completed"
        );
        self.set_orphaned(Vec::new());
        self.set_state(SweepState::Succeeded);
        JobOutcome::Reschedule(self.schedule.interval)
    }
}

#[async_trait]
impl JobHandler for ReclaimWorker {
    fn name(&self) -> &str {
        "pending-file-reclaim"
    }

    async fn run(&self) -> JobOutcome {
        self.sweep_once(Utc::now()).await
    }
}
