//! Depot Storage Library
//!
//! Storage abstraction over object bytes plus descriptive metadata, keyed by
//! `(category, filename)`. Two backends implement [`FileStorage`]:
//!
//! - [`LocalStorage`]: one file per key under `{root}/{category}/{filename}`,
//!   with per-key mutual exclusion through a reference-counted lock registry.
//! - [`ObjectStorage`]: a networked object store with one bucket per category,
//!   created lazily on first write.
//!
//! Categories and filenames are single path segments. They must not be empty,
//! start with `.`, or contain `/`, `\` or NUL. Key validation is centralized in
//! the `keys` module so both backends agree.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-local")]
pub mod lock;
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use depot_core::StorageBackend;
pub use factory::create_storage;
pub use keys::validate_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-local")]
pub use lock::{KeyGuard, KeyLockRegistry};
#[cfg(feature = "storage-s3")]
pub use object::S3Connector;
pub use object::{BucketConnector, MemoryConnector, ObjectStorage};
pub use traits::{ContentReader, ContentStream, FetchedFile, FileStorage, StorageError, StorageResult};
