use crate::files::limit::SizeLimitedReader;
use crate::files::mime::{self, SNIFF_LEN};
use crate::pending::PendingService;
use depot_core::{
    AppError, ByteRange, FileMetadata, InvalidArgumentCode, StorageBackend, UploadPolicy,
    UNKNOWN_SIZE,
};
use depot_storage::{validate_key, ContentReader, FetchedFile, FileStorage};
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// Parameters of an upload apart from its content.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub category: String,
    /// Generated when `None` or empty.
    pub filename: Option<String>,
    pub pretty_name: String,
    pub pending: bool,
    /// Size announced by the client, or [`UNKNOWN_SIZE`].
    pub declared_size: i64,
}

/// File operations exposed to clients.
///
/// Validates uploads against the [`UploadPolicy`], classifies their content
/// type and delegates persistence to the storage backend and, for pending
/// uploads, to the [`PendingService`].
#[derive(Clone)]
pub struct FileService {
    storage: Arc<dyn FileStorage>,
    pending: PendingService,
    policy: UploadPolicy,
}

impl FileService {
    pub fn new(storage: Arc<dyn FileStorage>, pending: PendingService, policy: UploadPolicy) -> Self {
        Self {
            storage,
            pending,
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn backend_type(&self) -> StorageBackend {
        self.storage.backend_type()
    }

    fn too_big(&self) -> AppError {
        AppError::invalid_argument(
            InvalidArgumentCode::FileTooBig,
            format!(
                "file is too big, max file size is {} bytes",
                self.policy.max_file_size_bytes
            ),
        )
    }

    fn exceeds_limit(&self, size: u64) -> bool {
        self.policy.max_file_size_bytes > 0 && size >= self.policy.max_file_size_bytes
    }

    /// Store a new file and return its filename.
    #[tracing::instrument(
        skip(self, request, content),
        fields(category = %request.category, pending = request.pending)
    )]
    pub async fn upload(
        &self,
        request: UploadRequest,
        mut content: ContentReader,
    ) -> Result<String, AppError> {
        if request.declared_size == 0 {
            return Err(zero_size());
        }
        if request.declared_size > 0 && self.exceeds_limit(request.declared_size as u64) {
            return Err(self.too_big());
        }

        let mut prefix = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            let n = content
                .read(&mut prefix[filled..])
                .await
                .map_err(|e| AppError::InvalidInput(format!("Failed to read upload body: {}", e)))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        prefix.truncate(filled);

        if prefix.is_empty() {
            return Err(zero_size());
        }
        if self.exceeds_limit(prefix.len() as u64) {
            return Err(self.too_big());
        }

        let content_type = mime::sniff(&prefix);
        if !mime::is_allowed(content_type, &self.policy.allowed_content_types) {
            return Err(AppError::invalid_argument(
                InvalidArgumentCode::UnsupportedFileType,
                format!("file type is not supported. file type: '{}'", content_type),
            ));
        }

        let filename = match request.filename {
            Some(name) if !name.is_empty() => name,
            _ => Uuid::new_v4().to_string(),
        };
        validate_key(&request.category, &filename)?;

        // Ledger first: a crash before the write leaves a row without an
        // object, which the reclaim sweep tolerates.
        if request.pending {
            self.pending.enqueue(&filename, &request.category).await?;
        }

        let metadata = FileMetadata {
            filename,
            pretty_name: request.pretty_name,
            category: request.category,
            content_type: content_type.to_string(),
            size: if request.declared_size > 0 {
                request.declared_size
            } else {
                UNKNOWN_SIZE
            },
        };

        let (reader, limit) = SizeLimitedReader::new(
            Cursor::new(prefix).chain(content),
            self.policy.max_file_size_bytes,
        );

        match self.storage.store(&metadata, Box::pin(reader)).await {
            Ok(size) => {
                tracing::info!(
                    filename = %metadata.filename,
                    content_type = %metadata.content_type,
                    size_bytes = size,
                    "File uploaded"
                );
                Ok(metadata.filename)
            }
            Err(_) if limit.is_set() => Err(self.too_big()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a file, optionally a byte window of it. Ranges without an end or
    /// spanning more than the configured maximum are clamped.
    pub async fn get(
        &self,
        category: &str,
        filename: &str,
        range: Option<ByteRange>,
    ) -> Result<FetchedFile, AppError> {
        let range = range.map(|r| r.clamp(self.policy.max_range_bytes));
        Ok(self.storage.fetch(filename, category, range).await?)
    }

    pub async fn exists(&self, category: &str, filename: &str) -> Result<bool, AppError> {
        Ok(self.storage.exists(filename, category).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, category: &str, filename: &str) -> Result<(), AppError> {
        self.storage.delete(filename, category).await?;
        tracing::info!("File deleted");
        Ok(())
    }

    pub async fn commit(&self, category: &str, filename: &str) -> Result<(), AppError> {
        validate_key(category, filename)?;
        self.pending.commit(filename, category).await
    }

    pub async fn rollback(&self, category: &str, filename: &str) -> Result<(), AppError> {
        validate_key(category, filename)?;
        self.pending.rollback(filename, category).await
    }
}

fn zero_size() -> AppError {
    AppError::invalid_argument(InvalidArgumentCode::FileHasZeroSize, "file has zero size")
}
