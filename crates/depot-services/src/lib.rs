//! Depot Services Layer
//!
//! Business logic between the HTTP surface and the storage and ledger
//! crates. [`FileService`] applies the upload policy (size limit, sniffed
//! content type allow-list, range clamping) and [`PendingService`] owns the
//! pending-file lifecycle, including the reclaim sweep. Keep HTTP concerns in
//! depot-api.

pub mod files;
pub mod pending;

pub use files::{FileService, UploadRequest};
pub use pending::{PendingService, SweepReport};
