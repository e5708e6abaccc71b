//! Periodic single-flight job runner.
//!
//! Shutdown: [`JobScheduler::shutdown`] signals the loop and waits for it to
//! exit. An invocation already in progress is allowed to finish.

use crate::job::{JobHandler, JobOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

pub struct JobScheduler {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl JobScheduler {
    /// Spawn the loop. The first invocation runs after `initial_delay`.
    pub fn start(handler: Arc<dyn JobHandler>, initial_delay: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(Self::run_loop(handler, initial_delay, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    async fn run_loop(
        handler: Arc<dyn JobHandler>,
        initial_delay: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(
            job = handler.name(),
            initial_delay_ms = initial_delay.as_millis() as u64,
            "Job scheduler started"
        );

        let mut delay = initial_delay;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(job = handler.name(), "Job scheduler shutting down");
                    break;
                }
                _ = sleep(delay) => {
                    let outcome = handler.run().await;
                    match &outcome {
                        JobOutcome::Reschedule(next) => {
                            tracing::debug!(
                                job = handler.name(),
                                next_run_secs = next.as_secs_f64(),
                                "Job rescheduled"
                            );
                        }
                        JobOutcome::Retry { after, reason } => {
                            tracing::warn!(
                                job = handler.name(),
                                retry_in_secs = after.as_secs_f64(),
                                reason = %reason,
                                "Job failed, retrying after backoff"
                            );
                        }
                    }
                    delay = outcome.delay();
                }
            }
        }

        tracing::info!(job = handler.name(), "Job scheduler stopped");
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Job scheduler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delays: Mutex<Vec<Duration>>,
        fail_first: bool,
    }

    #[async_trait]
    impl JobHandler for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) -> JobOutcome {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            let outcome = if self.fail_first && run == 0 {
                JobOutcome::Retry {
                    after: Duration::from_millis(1),
                    reason: "first run fails".to_string(),
                }
            } else {
                JobOutcome::Reschedule(Duration::from_millis(10))
            };
            self.delays.lock().unwrap().push(outcome.delay());
            outcome
        }
    }

    #[tokio::test]
    async fn test_runs_repeatedly_without_overlap() {
        let job = Arc::new(CountingJob::default());
        let scheduler = JobScheduler::start(job.clone(), Duration::ZERO);

        sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await;

        assert!(job.runs.load(Ordering::SeqCst) >= 3);
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_uses_backoff_then_reschedules() {
        let job = Arc::new(CountingJob {
            fail_first: true,
            ..Default::default()
        });
        let scheduler = JobScheduler::start(job.clone(), Duration::ZERO);

        sleep(Duration::from_millis(100)).await;
        scheduler.shutdown().await;

        let delays = job.delays.lock().unwrap().clone();
        assert!(delays.len() >= 2);
        assert_eq!(delays[0], Duration::from_millis(1));
        assert_eq!(delays[1], Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_shutdown_stops_invocations() {
        let job = Arc::new(CountingJob::default());
        let scheduler = JobScheduler::start(job.clone(), Duration::from_secs(3600));

        scheduler.shutdown().await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }
}
