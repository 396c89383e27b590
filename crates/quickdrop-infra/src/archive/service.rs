use anyhow::{Context, Result};
use futures::TryStreamExt;
use quickdrop_core::FileRecord;
use quickdrop_storage::{ByteStream, Storage, StorageError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};

/// Archive format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    #[default]
    Zip,
    Tar,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::Tar => "application/x-tar",
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            _ => Err(anyhow::anyhow!("Unsupported archive format: {}", s)),
        }
    }
}

/// Sanitize filename for archive entry to prevent path traversal.
/// Extracts only the base name (strips path components like `../`).
fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Whether an archive failure was caused by a file that no longer exists.
pub fn is_missing_file(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StorageError>(),
            Some(StorageError::NotFound(_))
        )
    })
}

/// An archive spooled to an anonymous temporary file.
///
/// The file belongs to one request and disappears once the handle is dropped.
#[derive(Debug)]
pub struct ArchiveFile {
    file: File,
    size: u64,
}

impl ArchiveFile {
    fn from_spool(mut file: File) -> Result<Self> {
        file.seek(SeekFrom::Start(0))
            .context("Failed to rewind archive")?;
        let size = file.metadata().context("Failed to stat archive")?.len();
        Ok(Self { file, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the archive in chunks.
    pub fn into_stream(self) -> ByteStream {
        let file = tokio::fs::File::from_std(self.file);
        Box::pin(ReaderStream::new(file).map_err(StorageError::IoError))
    }
}

/// One archive member with its contents still on the storage backend.
struct Entry {
    name: String,
    size: u64,
    reader: Box<dyn Read + Send>,
}

/// Open every file up front so a missing one fails the archive before anything is written.
async fn open_entries(storage: &Arc<dyn Storage>, files: &[FileRecord]) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(files.len());

    for (index, record) in files.iter().enumerate() {
        let stream = storage
            .open_for_read(record)
            .await
            .with_context(|| format!("Failed to read file: {}", record.display_name))?;
        let reader = StreamReader::new(stream.map_err(std::io::Error::other));

        entries.push(Entry {
            name: sanitize_archive_filename(
                &record.display_name,
                &format!("unnamed_{}", index + 1),
            ),
            size: record.size_bytes,
            reader: Box::new(SyncIoBridge::new(reader)),
        });
    }

    Ok(entries)
}

fn write_zip(spool: File, entries: Vec<Entry>) -> Result<File> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut zip = ZipWriter::new(spool);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
        .large_file(entries.iter().any(|e| e.size >= u32::MAX as u64));

    for mut entry in entries {
        zip.start_file(entry.name.as_str(), options)
            .with_context(|| format!("Failed to add file to ZIP: {}", entry.name))?;
        std::io::copy(&mut entry.reader, &mut zip)
            .with_context(|| format!("Failed to write file data to ZIP: {}", entry.name))?;
    }

    zip.finish().context("Failed to finalize ZIP archive")
}

fn write_tar(spool: File, entries: Vec<Entry>) -> Result<File> {
    use tar::Builder;

    let mut tar = Builder::new(spool);

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.size);
        header.set_mode(0o644); // rw-r--r--
        header.set_cksum();

        // The header size is the one recorded at upload; stored files never change.
        tar.append_data(&mut header, &entry.name, entry.reader.take(entry.size))
            .with_context(|| format!("Failed to add file to TAR: {}", entry.name))?;
    }

    tar.into_inner().context("Failed to finalize TAR archive")
}

/// Create an archive in the specified format.
///
/// Entries are copied chunk by chunk into a temporary file private to this call, so memory
/// use does not grow with the item size and concurrent bundles of the same item never share
/// any intermediate state. Any file that cannot be opened fails the whole archive.
pub async fn create_archive(
    format: ArchiveFormat,
    storage: Arc<dyn Storage>,
    files: &[FileRecord],
) -> Result<ArchiveFile> {
    let entries = open_entries(&storage, files).await?;

    let spool = tokio::task::spawn_blocking(move || -> Result<File> {
        let spool = tempfile::tempfile().context("Failed to create archive spool file")?;
        match format {
            ArchiveFormat::Zip => write_zip(spool, entries),
            ArchiveFormat::Tar => write_tar(spool, entries),
        }
    })
    .await
    .context("Archive task panicked")??;

    ArchiveFile::from_spool(spool)
}
