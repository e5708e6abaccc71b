//! Networked object store backend.
//!
//! Every category is its own bucket (`{bucket_prefix}{category}`); the
//! filename is the object path inside it. Bucket clients are created lazily
//! and cached, and a bucket is created on the first write to its category.
//! Concurrency on a single key is left to the store (last writer wins).

use crate::keys::{display_key, validate_bucket_name, validate_key};
use crate::traits::{ContentReader, FetchedFile, FileStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{ByteRange, FileMetadata, UNKNOWN_SIZE};
use futures::StreamExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, GetOptions, GetRange, ObjectStore, ObjectStoreExt, PutOptions,
    PutPayload,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::io::AsyncReadExt;

/// User metadata key holding the URL-encoded pretty name.
const PRETTY_NAME_ATTRIBUTE: &str = "pretty-name";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Creates per-bucket clients and provisions buckets.
#[async_trait]
pub trait BucketConnector: Send + Sync {
    /// Build a client bound to `bucket`.
    fn connect(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>>;

    /// Create `bucket`. A bucket that already exists is success.
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;
}

/// S3-compatible connector (AWS S3, MinIO, ...).
///
/// Credentials come from the usual `AWS_*` environment variables.
#[cfg(feature = "storage-s3")]
pub struct S3Connector {
    region: String,
    endpoint_url: Option<String>,
    allow_http: bool,
    http: reqwest::Client,
}

#[cfg(feature = "storage-s3")]
impl S3Connector {
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(region: String, endpoint_url: Option<String>, allow_http: bool) -> Self {
        Self {
            region,
            endpoint_url,
            allow_http,
            http: reqwest::Client::new(),
        }
    }

    fn build(&self, bucket: &str) -> StorageResult<object_store::aws::AmazonS3> {
        let mut builder = object_store::aws::AmazonS3Builder::from_env()
            .with_region(self.region.clone())
            .with_bucket_name(bucket.to_string())
            .with_allow_http(self.allow_http);

        if let Some(ref endpoint) = self.endpoint_url {
            builder = builder.with_endpoint(endpoint.clone());
        }

        builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }
}

#[cfg(feature = "storage-s3")]
#[async_trait]
impl BucketConnector for S3Connector {
    fn connect(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(self.build(bucket)?))
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        use object_store::signer::Signer;

        // object_store has no bucket API; a presigned PUT on the bucket root is
        // a CreateBucket request.
        let client = self.build(bucket)?;
        let url = client
            .signed_url(
                http::Method::PUT,
                &Path::from(""),
                std::time::Duration::from_secs(60),
            )
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut request = self.http.put(url);
        if let Some(body) = create_bucket_configuration(&self.region) {
            request = request.body(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StorageError::BackendError(format!("Create bucket {}: {}", bucket, e)))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            tracing::info!(bucket = %bucket, status = status.as_u16(), "Bucket ready");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StorageError::BackendError(format!(
            "Create bucket {} failed with {}: {}",
            bucket, status, body
        )))
    }
}

/// CreateBucket body for `region`. us-east-1 is the default location and
/// must be sent without a constraint.
#[cfg(feature = "storage-s3")]
fn create_bucket_configuration(region: &str) -> Option<String> {
    if region.is_empty() || region == "us-east-1" {
        return None;
    }
    Some(format!(
        "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <LocationConstraint>{}</LocationConstraint>\
         </CreateBucketConfiguration>",
        region
    ))
}

/// In-process connector backed by [`InMemory`] stores, one per bucket.
#[derive(Default)]
pub struct MemoryConnector {
    stores: Mutex<HashMap<String, Arc<InMemory>>>,
    create_calls: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create_bucket` calls seen so far.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BucketConnector for MemoryConnector {
    fn connect(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        let store = stores
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();
        Ok(store)
    }

    async fn create_bucket(&self, _bucket: &str) -> StorageResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Object store implementation of [`FileStorage`].
pub struct ObjectStorage {
    connector: Arc<dyn BucketConnector>,
    bucket_prefix: String,
    clients: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
    provisioned: RwLock<HashSet<String>>,
}

impl ObjectStorage {
    pub fn new(connector: Arc<dyn BucketConnector>, bucket_prefix: impl Into<String>) -> Self {
        Self {
            connector,
            bucket_prefix: bucket_prefix.into(),
            clients: RwLock::new(HashMap::new()),
            provisioned: RwLock::new(HashSet::new()),
        }
    }

    /// Object storage kept entirely in memory; used by tests and local tooling.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryConnector::new()), "")
    }

    fn bucket_name(&self, category: &str) -> StorageResult<String> {
        let bucket = format!("{}{}", self.bucket_prefix, category);
        validate_bucket_name(&bucket)?;
        Ok(bucket)
    }

    /// Cached client for the category's bucket.
    fn client(&self, category: &str) -> StorageResult<(String, Arc<dyn ObjectStore>)> {
        let bucket = self.bucket_name(category)?;

        if let Some(client) = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&bucket)
        {
            return Ok((bucket, client.clone()));
        }

        let created = self.connector.connect(&bucket)?;
        let client = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bucket.clone())
            .or_insert(created)
            .clone();
        Ok((bucket, client))
    }

    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        let known = self
            .provisioned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(bucket);
        if known {
            return Ok(());
        }

        self.connector.create_bucket(bucket).await?;
        self.provisioned
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.to_string());
        Ok(())
    }

    fn map_error(err: ObjectStoreError, key: &str, wrap: fn(String) -> StorageError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => wrap(other.to_string()),
        }
    }
}

#[async_trait]
impl FileStorage for ObjectStorage {
    #[tracing::instrument(skip(self, metadata, reader), fields(category = %metadata.category, filename = %metadata.filename))]
    async fn store(&self, metadata: &FileMetadata, mut reader: ContentReader) -> StorageResult<u64> {
        validate_key(&metadata.category, &metadata.filename)?;
        if metadata.size == 0 || metadata.size < UNKNOWN_SIZE {
            return Err(StorageError::InvalidSize(metadata.size));
        }
        let key = display_key(&metadata.category, &metadata.filename);
        let (bucket, client) = self.client(&metadata.category)?;
        self.ensure_bucket(&bucket).await?;

        let start = std::time::Instant::now();
        // Buffer the whole body and upload with a single put. The buffer grows
        // with the bytes actually read; the declared size is client input.
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;

        let size = buffer.len() as u64;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, metadata.content_type.clone().into());
        attributes.insert(
            Attribute::Metadata(PRETTY_NAME_ATTRIBUTE.into()),
            urlencoding::encode(&metadata.pretty_name).into_owned().into(),
        );
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let location = Path::from(metadata.filename.clone());
        client
            .put_opts(&location, PutPayload::from(Bytes::from(buffer)), options)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage upload successful"
        );

        Ok(size)
    }

    async fn fetch(
        &self,
        filename: &str,
        category: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<FetchedFile> {
        validate_key(category, filename)?;
        let key = display_key(category, filename);
        let (bucket, client) = self.client(category)?;
        let location = Path::from(filename.to_string());

        let head = client
            .head(&location)
            .await
            .map_err(|e| Self::map_error(e, &key, StorageError::DownloadFailed))?;
        let total = head.size;

        let window = match range {
            Some(requested) => Some(requested.resolve(total).ok_or_else(|| {
                StorageError::InvalidRange(format!(
                    "range starting at {} outside object of {} bytes",
                    requested.start, total
                ))
            })?),
            None => None,
        };

        let options = GetOptions {
            range: window.map(|(first, last)| GetRange::Bounded(first..last + 1)),
            ..Default::default()
        };
        let result = client
            .get_opts(&location, options)
            .await
            .map_err(|e| Self::map_error(e, &key, StorageError::DownloadFailed))?;

        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| value.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let pretty_name = result
            .attributes
            .get(&Attribute::Metadata(PRETTY_NAME_ATTRIBUTE.into()))
            .and_then(|value| {
                urlencoding::decode(value)
                    .ok()
                    .map(|decoded| decoded.into_owned())
            })
            .unwrap_or_default();

        let stream_key = key.clone();
        let content = result.into_stream().map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(bucket = %bucket, key = %stream_key, "Object storage stream download error");
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(FetchedFile {
            metadata: FileMetadata {
                filename: filename.to_string(),
                pretty_name,
                category: category.to_string(),
                content_type,
                size: total as i64,
            },
            range: window,
            content: Box::pin(content),
        })
    }

    async fn exists(&self, filename: &str, category: &str) -> StorageResult<bool> {
        validate_key(category, filename)?;
        let (_, client) = self.client(category)?;
        match client.head(&Path::from(filename.to_string())).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, filename: &str, category: &str) -> StorageResult<()> {
        validate_key(category, filename)?;
        let key = display_key(category, filename);
        let (bucket, client) = self.client(category)?;
        let location = Path::from(filename.to_string());
        let start = std::time::Instant::now();

        // S3 deletes are idempotent, so absence has to be checked explicitly.
        client
            .head(&location)
            .await
            .map_err(|e| Self::map_error(e, &key, StorageError::DeleteFailed))?;

        client
            .delete(&location)
            .await
            .map_err(|e| Self::map_error(e, &key, StorageError::DeleteFailed))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
