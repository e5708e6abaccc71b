#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::{ObjectStorage, S3Connector};
use crate::{FileStorage, StorageBackend, StorageError, StorageResult};
use depot_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn FileStorage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let connector = S3Connector::new(
                config.s3_region().to_string(),
                config.s3_endpoint().map(String::from),
                config.s3_allow_http(),
            );
            let storage = ObjectStorage::new(Arc::new(connector), config.s3_bucket_prefix());

            tracing::info!(
                endpoint = config.s3_endpoint().unwrap_or("aws"),
                region = config.s3_region(),
                bucket_prefix = config.s3_bucket_prefix(),
                "Object storage backend configured"
            );
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path();
            if base_path.is_empty() {
                return Err(StorageError::ConfigError(
                    "LOCAL_STORAGE_PATH not configured".to_string(),
                ));
            }

            let storage = LocalStorage::new(base_path).await?;
            tracing::info!(path = %base_path, "Local storage backend configured");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
