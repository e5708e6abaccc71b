//! Depot Core Library
//!
//! Domain models, error types and configuration shared by every Depot crate.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, PendingPolicy, SweepSchedule, UploadPolicy};
pub use error::{AppError, ErrorMetadata, InvalidArgumentCode, LogLevel};
pub use models::{ByteRange, FileMetadata, FileToDelete, PendingRecord, UNKNOWN_SIZE};
pub use storage_types::StorageBackend;
