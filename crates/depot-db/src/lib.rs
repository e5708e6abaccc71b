//! Pending-file ledger persistence.
//!
//! The ledger records uploads that are not yet finalized. Mutations that must
//! be atomic with each other (commit, rollback, expiry sweeps) run inside a
//! [`TransactionManager`] unit of work.

pub mod db;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use db::{PendingLedger, PendingLedgerTx, PgPendingLedger, TransactionManager};
