//! Local filesystem backend.
//!
//! Every object is a single file at `{base}/{category}/{filename}` laid out as
//!
//! ```text
//! "DPT1" | header length (u32, big endian) | JSON header | content bytes
//! ```
//!
//! The header carries the content type and pretty name; the content size is
//! derived from the file length, so streaming writes never need to know it up
//! front. Writes go to a temporary file under `{base}/.tmp` and are renamed into
//! place, and all operations on one key are serialized through the
//! [`KeyLockRegistry`].

use crate::keys::{display_key, validate_key};
use crate::lock::KeyLockRegistry;
use crate::traits::{ContentReader, FetchedFile, FileStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use depot_core::{ByteRange, FileMetadata, UNKNOWN_SIZE};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

const MAGIC: &[u8; 4] = b"DPT1";
const TMP_DIR: &str = ".tmp";
/// Upper bound on a header; anything larger means the file is not ours.
const MAX_HEADER_LEN: u32 = 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct FileHeader {
    content_type: String,
    #[serde(default)]
    pretty_name: String,
}

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    locks: Arc<KeyLockRegistry>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path` (created if missing).
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(base_path.join(TMP_DIR)).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            locks: KeyLockRegistry::new(),
        })
    }

    /// Lock registry shared by all operations on this store.
    pub fn locks(&self) -> &Arc<KeyLockRegistry> {
        &self.locks
    }

    fn category_dir(&self, category: &str) -> PathBuf {
        self.base_path.join(category)
    }

    fn key_to_path(&self, category: &str, filename: &str) -> StorageResult<PathBuf> {
        validate_key(category, filename)?;
        Ok(self.category_dir(category).join(filename))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(TMP_DIR)
            .join(format!("{}.partial", Uuid::new_v4()))
    }

    /// Write header and content to `path`, returning the content size.
    async fn write_file(
        path: &Path,
        header: &FileHeader,
        mut reader: ContentReader,
    ) -> StorageResult<u64> {
        let header_bytes = serde_json::to_vec(header)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode header: {}", e)))?;

        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(MAGIC).await?;
        file.write_u32(header_bytes.len() as u32).await?;
        file.write_all(&header_bytes).await?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                path.display(),
                e
            ))
        })?;

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(bytes_copied)
    }

    /// Open an object and position the cursor at the start of its content.
    async fn open(
        path: &Path,
        key: &str,
    ) -> StorageResult<(fs::File, FileHeader, u64, u64)> {
        let mut file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let corrupt =
            |reason: &str| StorageError::DownloadFailed(format!("Corrupt file {}: {}", key, reason));

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .await
            .map_err(|_| corrupt("missing header"))?;
        if &magic != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let header_len = file.read_u32().await.map_err(|_| corrupt("missing header"))?;
        if header_len > MAX_HEADER_LEN {
            return Err(corrupt("header too large"));
        }
        let mut header_bytes = vec![0u8; header_len as usize];
        file.read_exact(&mut header_bytes)
            .await
            .map_err(|_| corrupt("truncated header"))?;
        let header: FileHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| corrupt("invalid header"))?;

        let content_offset = (MAGIC.len() + 4) as u64 + header_len as u64;
        let file_len = file.metadata().await?.len();
        let content_len = file_len.saturating_sub(content_offset);

        Ok((file, header, content_offset, content_len))
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    #[tracing::instrument(skip(self, metadata, reader), fields(category = %metadata.category, filename = %metadata.filename))]
    async fn store(&self, metadata: &FileMetadata, reader: ContentReader) -> StorageResult<u64> {
        let path = self.key_to_path(&metadata.category, &metadata.filename)?;
        if metadata.size == 0 || metadata.size < UNKNOWN_SIZE {
            return Err(StorageError::InvalidSize(metadata.size));
        }
        let key = display_key(&metadata.category, &metadata.filename);
        let start = std::time::Instant::now();

        // create_dir_all succeeds when the directory already exists, including
        // when a concurrent upload created it first.
        fs::create_dir_all(self.category_dir(&metadata.category)).await?;

        let header = FileHeader {
            content_type: metadata.content_type.clone(),
            pretty_name: metadata.pretty_name.clone(),
        };

        let _guard = self.locks.acquire(&key).await;

        let temp = self.temp_path();
        let size = match Self::write_file(&temp, &header, reader).await {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&temp).await;
                tracing::error!(
                    error = %e,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage upload failed"
                );
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move file into place {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(size)
    }

    async fn fetch(
        &self,
        filename: &str,
        category: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<FetchedFile> {
        let path = self.key_to_path(category, filename)?;
        let key = display_key(category, filename);
        let start = std::time::Instant::now();

        // Writers replace files by rename, so once opened under the lock the
        // handle keeps reading one complete version even after the lock is released.
        let (mut file, header, content_offset, content_len) = {
            let _guard = self.locks.acquire(&key).await;
            Self::open(&path, &key).await?
        };

        let (window, served) = match range {
            Some(requested) => {
                let (first, last) = requested.resolve(content_len).ok_or_else(|| {
                    StorageError::InvalidRange(format!(
                        "range {}-{} outside content of {} bytes",
                        requested.start,
                        requested.end.map_or_else(String::new, |e| e.to_string()),
                        content_len
                    ))
                })?;
                (Some((first, last)), last - first + 1)
            }
            None => (None, content_len),
        };

        let skip = window.map_or(0, |(first, _)| first);
        file.seek(SeekFrom::Start(content_offset + skip)).await?;

        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file.take(served)).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    path = %path_display,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream download error"
                );
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        tracing::debug!(
            key = %key,
            size_bytes = content_len,
            served_bytes = served,
            "Local storage download started"
        );

        Ok(FetchedFile {
            metadata: FileMetadata {
                filename: filename.to_string(),
                pretty_name: header.pretty_name,
                category: category.to_string(),
                content_type: header.content_type,
                size: content_len as i64,
            },
            range: window,
            content: Box::pin(stream),
        })
    }

    async fn exists(&self, filename: &str, category: &str) -> StorageResult<bool> {
        let path = self.key_to_path(category, filename)?;
        let _guard = self.locks.acquire(&display_key(category, filename)).await;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, filename: &str, category: &str) -> StorageResult<()> {
        let path = self.key_to_path(category, filename)?;
        let key = display_key(category, filename);
        let start = std::time::Instant::now();

        let _guard = self.locks.acquire(&key).await;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key));
            }
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::tempdir;
    use tokio::io::{AsyncRead, ReadBuf};

    fn metadata(category: &str, filename: &str) -> FileMetadata {
        FileMetadata {
            filename: filename.to_string(),
            pretty_name: "Holiday photo.png".to_string(),
            category: category.to_string(),
            content_type: "image/png".to_string(),
            size: UNKNOWN_SIZE,
        }
    }

    fn reader(data: &[u8]) -> ContentReader {
        Box::pin(Cursor::new(data.to_vec()))
    }

    async fn collect(file: FetchedFile) -> Vec<u8> {
        let mut content = file.content;
        let mut out = Vec::new();
        while let Some(chunk) = content.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_local_storage_store_fetch() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let data = b"test data".to_vec();
        let written = storage
            .store(&metadata("avatars", "a1"), reader(&data))
            .await
            .unwrap();
        assert_eq!(written, data.len() as u64);

        let fetched = storage.fetch("a1", "avatars", None).await.unwrap();
        assert_eq!(fetched.metadata.content_type, "image/png");
        assert_eq!(fetched.metadata.pretty_name, "Holiday photo.png");
        assert_eq!(fetched.metadata.size, data.len() as i64);
        assert_eq!(fetched.range, None);
        assert_eq!(collect(fetched).await, data);
        assert!(storage.locks().is_empty());
    }

    #[tokio::test]
    async fn test_local_storage_range_fetch() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        storage
            .store(&metadata("docs", "r"), reader(b"0123456789"))
            .await
            .unwrap();

        let fetched = storage
            .fetch("r", "docs", Some(ByteRange::new(2, Some(5))))
            .await
            .unwrap();
        assert_eq!(fetched.range, Some((2, 5)));
        assert_eq!(fetched.content_length(), 4);
        assert_eq!(fetched.metadata.size, 10);
        assert_eq!(collect(fetched).await, b"2345");

        let open_ended = storage
            .fetch("r", "docs", Some(ByteRange::new(7, None)))
            .await
            .unwrap();
        assert_eq!(collect(open_ended).await, b"789");

        let result = storage
            .fetch("r", "docs", Some(ByteRange::new(10, None)))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidRange(_))));
    }

    #[tokio::test]
    async fn test_local_storage_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.fetch("missing", "avatars", None).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!storage.exists("missing", "avatars").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_storage_delete_is_not_found_twice() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        storage
            .store(&metadata("avatars", "gone"), reader(b"bytes"))
            .await
            .unwrap();

        storage.delete("gone", "avatars").await.unwrap();
        assert!(matches!(
            storage.delete("gone", "avatars").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete("gone", "avatars").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_storage_rejects_zero_size() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let mut meta = metadata("avatars", "empty");
        meta.size = 0;

        let result = storage.store(&meta, reader(b"")).await;
        assert!(matches!(result, Err(StorageError::InvalidSize(0))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.fetch("passwd", "../../etc", None).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../passwd", "avatars").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("x", ".tmp").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    /// Yields a prefix, then fails, simulating a client that disconnects mid-upload.
    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(std::io::Error::other("connection reset")));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_version() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        storage
            .store(&metadata("avatars", "v"), reader(b"version one"))
            .await
            .unwrap();

        let result = storage
            .store(&metadata("avatars", "v"), Box::pin(FailingReader { sent: false }))
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));

        let fetched = storage.fetch("v", "avatars", None).await.unwrap();
        assert_eq!(collect(fetched).await, b"version one");

        let mut leftovers = fs::read_dir(dir.path().join(TMP_DIR)).await.unwrap();
        assert!(leftovers.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writes_and_reads_never_interleave() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let first = vec![b'a'; 256 * 1024];
        let second = vec![b'b'; 256 * 1024];
        storage
            .store(&metadata("blobs", "same"), reader(&first))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let storage = storage.clone();
            let payload = if i % 2 == 0 { second.clone() } else { first.clone() };
            tasks.push(tokio::spawn(async move {
                storage
                    .store(&metadata("blobs", "same"), Box::pin(Cursor::new(payload)))
                    .await
                    .unwrap();
            }));
        }
        for _ in 0..8 {
            let storage = storage.clone();
            tasks.push(tokio::spawn(async move {
                let fetched = storage.fetch("same", "blobs", None).await.unwrap();
                let bytes = collect(fetched).await;
                assert_eq!(bytes.len(), 256 * 1024);
                assert!(bytes.iter().all(|b| *b == bytes[0]), "read observed a mixed file");
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(storage.locks().is_empty());
    }
}
