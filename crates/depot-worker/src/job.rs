//! Job handler contract
//!
//! The scheduler owns timing and single-flight execution; a handler only
//! reports how long to wait before the next invocation.

use async_trait::async_trait;
use std::time::Duration;

/// What the scheduler should do after an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Success. Run again after the steady-state interval.
    Reschedule(Duration),
    /// Failure. Retry after the backoff.
    Retry { after: Duration, reason: String },
}

impl JobOutcome {
    pub fn delay(&self) -> Duration {
        match self {
            JobOutcome::Reschedule(delay) => *delay,
            JobOutcome::Retry { after, .. } => *after,
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, JobOutcome::Retry { .. })
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run one invocation.
    async fn run(&self) -> JobOutcome;
}
