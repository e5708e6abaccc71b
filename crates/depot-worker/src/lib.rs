//! Background jobs.
//!
//! [`JobScheduler`] runs one [`JobHandler`] periodically, never overlapping
//! invocations. The handler decides the next delay through its
//! [`JobOutcome`]. [`ReclaimWorker`] is the handler that deletes expired
//! pending files.

pub mod job;
pub mod reclaim;
pub mod scheduler;

pub use job::{JobHandler, JobOutcome};
pub use reclaim::{ReclaimWorker, SweepState};
pub use scheduler::JobScheduler;
