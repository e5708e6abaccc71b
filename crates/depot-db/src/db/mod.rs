//! Ledger repositories and transaction utilities
//
// Pending-file ledger (trait + Postgres implementation)
pub mod pending;
//
// Unit-of-work wrapper
pub mod transaction;

pub use pending::{PendingLedger, PendingLedgerTx, PgPendingLedger};
pub use transaction::TransactionManager;
