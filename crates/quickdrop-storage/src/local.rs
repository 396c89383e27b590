use crate::keys::generate_storage_key;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use quickdrop_core::constants::STORAGE_KEY_PREFIX;
use quickdrop_core::{FileRecord, PickupCode};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path.
    ///
    /// A key must be a single plain path component so it can never address anything
    /// outside the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        let mut components = Path::new(storage_key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.base_path.join(storage_key)),
            _ => Err(StorageError::InvalidKey(format!(
                "Storage key must be a single file name: {:?}",
                storage_key
            ))),
        }
    }

    /// Remove a file left behind by a failed write.
    async fn discard_partial(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to remove partially written file"
                );
            }
        }
    }

    /// Delete upload files left over from a previous process.
    ///
    /// Items are not durable across restarts, so any file carrying the upload prefix at
    /// startup is unreachable. Returns the number of files removed.
    pub async fn purge_orphans(&self) -> StorageResult<usize> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let is_upload = name
                .to_str()
                .map(|n| n.starts_with(STORAGE_KEY_PREFIX))
                .unwrap_or(false);
            if !is_upload || !entry.file_type().await?.is_file() {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %entry.path().display(),
                        "Failed to remove orphaned upload"
                    );
                }
            }
        }

        if removed > 0 {
            tracing::info!(
                removed,
                base_path = %self.base_path.display(),
                "Purged orphaned uploads from previous run"
            );
        }
        Ok(removed)
    }
}

const COPY_BUFFER_SIZE: usize = 64 * 1024;

enum CopyError {
    Source(std::io::Error),
    Write(std::io::Error),
}

async fn copy_and_sync(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    file: &mut fs::File,
) -> Result<u64, CopyError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let n = reader.read(&mut buffer).await.map_err(CopyError::Source)?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .await
            .map_err(CopyError::Write)?;
        copied += n as u64;
    }

    file.flush().await.map_err(CopyError::Write)?;
    file.sync_all().await.map_err(CopyError::Write)?;
    Ok(copied)
}

fn map_read_error(storage_key: &str, path: &Path, e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::NotFound(storage_key.to_string())
    } else {
        StorageError::ReadFailed(format!("Failed to read file {}: {}", path.display(), e))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn persist(
        &self,
        code: &PickupCode,
        display_name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<FileRecord> {
        let key = generate_storage_key(code, display_name);
        let path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let size_bytes = match copy_and_sync(reader, &mut file).await {
            Ok(copied) => copied,
            Err(err) => {
                drop(file);
                self.discard_partial(&path).await;
                return Err(match err {
                    CopyError::Source(e) => StorageError::SourceFailed(e),
                    CopyError::Write(e) => StorageError::WriteFailed(format!(
                        "Failed to write file {}: {}",
                        path.display(),
                        e
                    )),
                });
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage persist successful"
        );

        Ok(FileRecord {
            storage_key: key,
            display_name: display_name.to_string(),
            size_bytes,
        })
    }

    async fn remove(&self, record: &FileRecord) {
        let path = match self.key_to_path(&record.storage_key) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, key = %record.storage_key, "Refusing to delete invalid key");
                return;
            }
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), key = %record.storage_key, "Local storage delete successful");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(key = %record.storage_key, "File already removed");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    key = %record.storage_key,
                    "Failed to delete file, treating as removed"
                );
            }
        }
    }

    async fn read(&self, record: &FileRecord) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(&record.storage_key)?;
        let start = std::time::Instant::now();

        let data = fs::read(&path)
            .await
            .map_err(|e| map_read_error(&record.storage_key, &path, e))?;

        tracing::debug!(
            path = %path.display(),
            key = %record.storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );

        Ok(data)
    }

    async fn open_for_read(&self, record: &FileRecord) -> StorageResult<ByteStream> {
        let path = self.key_to_path(&record.storage_key)?;

        let file = fs::File::open(&path)
            .await
            .map_err(|e| map_read_error(&record.storage_key, &path, e))?;

        let key = record.storage_key.clone();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(error = %e, key = %key, "Local storage stream read error");
                StorageError::ReadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn exists(&self, record: &FileRecord) -> StorageResult<bool> {
        let path = self.key_to_path(&record.storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Storage directory {} unavailable: {}",
                self.base_path.display(),
                e
            ))
        })?;

        if !meta.is_dir() {
            return Err(StorageError::ConfigError(format!(
                "{} is not a directory",
                self.base_path.display()
            )));
        }
        if meta.permissions().readonly() {
            return Err(StorageError::ConfigError(format!(
                "{} is read-only",
                self.base_path.display()
            )));
        }
        Ok(())
    }
}
