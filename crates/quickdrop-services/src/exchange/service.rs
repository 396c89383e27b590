use chrono::{DateTime, Duration, Utc};
use quickdrop_core::filename::{normalize_filename, unique_display_name};
use quickdrop_core::models::SkippedFileInfo;
use quickdrop_core::{AppError, CodeSource, FileRecord, Item, PickupCode};
use quickdrop_infra::{create_archive, is_missing_file, ArchiveFormat};
use quickdrop_registry::ItemStore;
use quickdrop_storage::{ByteStream, Storage, StorageError};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::AsyncRead;

const CODE_NOT_FOUND: &str = "Pickup code is invalid or expired";

/// A committed submission.
#[derive(Debug)]
pub struct Submission {
    pub code: PickupCode,
    pub item: Arc<Item>,
    /// Files dropped because they could not be stored.
    pub skipped: Vec<SkippedFileInfo>,
}

/// An open file of a live item.
pub struct FileDownload {
    pub record: FileRecord,
    pub stream: ByteStream,
}

/// An archive of all files of a live item.
pub struct Bundle {
    pub format: ArchiveFormat,
    /// Suggested download name, `<code>.<ext>`.
    pub filename: String,
    pub size_bytes: u64,
    pub stream: ByteStream,
}

/// Exchange operations over the registry and the storage backend.
#[derive(Clone)]
pub struct ExchangeService {
    store: ItemStore,
    storage: Arc<dyn Storage>,
    codes: Arc<dyn CodeSource>,
    ttl: Duration,
}

fn parse_code(code: &str) -> Result<PickupCode, AppError> {
    code.parse()
        .map_err(|_| AppError::NotFound(CODE_NOT_FOUND.to_string()))
}

async fn reclaim(storage: &Arc<dyn Storage>, files: &[FileRecord]) {
    for record in files {
        storage.remove(record).await;
    }
}

impl ExchangeService {
    pub fn new(
        store: ItemStore,
        storage: Arc<dyn Storage>,
        codes: Arc<dyn CodeSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            codes,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Reserve a code for a new submission.
    pub async fn begin_submission(&self) -> Result<PendingSubmission, AppError> {
        self.begin_submission_at(Utc::now()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn begin_submission_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<PendingSubmission, AppError> {
        let reservation = self.store.reserve(self.codes.as_ref(), now).await?;

        if let Some(old) = reservation.displaced {
            tracing::info!(
                code = %reservation.code,
                files = old.files.len(),
                "Reclaiming expired item displaced by new upload"
            );
            reclaim(&self.storage, &old.files).await;
        }

        Ok(PendingSubmission {
            service: self.clone(),
            code: reservation.code,
            files: Vec::new(),
            skipped: Vec::new(),
            taken: HashSet::new(),
            finished: false,
        })
    }

    /// Store `text` and `files` as one item under a fresh code.
    pub async fn submit<R>(
        &self,
        text: Option<String>,
        files: Vec<(String, R)>,
    ) -> Result<Submission, AppError>
    where
        R: AsyncRead + Send + Unpin,
    {
        self.submit_at(text, files, Utc::now()).await
    }

    pub async fn submit_at<R>(
        &self,
        text: Option<String>,
        files: Vec<(String, R)>,
        now: DateTime<Utc>,
    ) -> Result<Submission, AppError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut pending = self.begin_submission_at(now).await?;

        for (name, mut reader) in files {
            if let Err(e) = pending.add_file(&name, &mut reader).await {
                pending.abort().await;
                return Err(e);
            }
        }

        pending.commit_at(text, now).await
    }

    pub async fn fetch_item(&self, code: &str) -> Result<(PickupCode, Arc<Item>), AppError> {
        self.fetch_item_at(code, Utc::now()).await
    }

    /// Look up the item live at `now`. Malformed codes are reported like unknown ones.
    pub async fn fetch_item_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(PickupCode, Arc<Item>), AppError> {
        let code = parse_code(code)?;
        let item = self.store.get_at(&code, now).await?;
        Ok((code, item))
    }

    pub async fn fetch_file(&self, code: &str, display_name: &str) -> Result<FileDownload, AppError> {
        self.fetch_file_at(code, display_name, Utc::now()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_file_at(
        &self,
        code: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<FileDownload, AppError> {
        let (code, item) = self.fetch_item_at(code, now).await?;

        let record = item
            .file(display_name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("File not found: {}", display_name)))?;

        let stream = self.storage.open_for_read(&record).await.map_err(|e| {
            tracing::warn!(
                code = %code,
                display_name = %record.display_name,
                error = %e,
                "File of live item could not be opened"
            );
            AppError::from(e)
        })?;

        Ok(FileDownload { record, stream })
    }

    pub async fn fetch_bundle(&self, code: &str, format: ArchiveFormat) -> Result<Bundle, AppError> {
        self.fetch_bundle_at(code, format, Utc::now()).await
    }

    /// Build an archive of every file of the item.
    ///
    /// If any file is missing the whole request fails as not found; a partial archive is
    /// never returned.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_bundle_at(
        &self,
        code: &str,
        format: ArchiveFormat,
        now: DateTime<Utc>,
    ) -> Result<Bundle, AppError> {
        let (code, item) = self.fetch_item_at(code, now).await?;
        let start = std::time::Instant::now();

        let archive = create_archive(format, Arc::clone(&self.storage), &item.files)
            .await
            .map_err(|e| {
                if is_missing_file(&e) {
                    tracing::warn!(code = %code, error = %e, "Bundle aborted, file no longer available");
                    AppError::ReadError(format!("{:#}", e))
                } else {
                    AppError::InternalWithSource {
                        message: "Failed to build archive".to_string(),
                        source: e,
                    }
                }
            })?;

        tracing::info!(
            code = %code,
            archive_format = format.extension(),
            files = item.files.len(),
            size_bytes = archive.size(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Bundle built"
        );

        Ok(Bundle {
            format,
            filename: format!("{}.{}", code, format.extension()),
            size_bytes: archive.size(),
            stream: archive.into_stream(),
        })
    }

    /// Number of currently live items.
    pub async fn live_items(&self) -> usize {
        self.store.live_count(Utc::now()).await
    }
}

/// A submission whose files are still being written.
///
/// Its code is reserved but invisible to readers until `commit`. Dropping it without
/// calling `commit` or `abort` (e.g. when the client disconnects) reclaims the files stored
/// so far in the background.
pub struct PendingSubmission {
    service: ExchangeService,
    code: PickupCode,
    files: Vec<FileRecord>,
    skipped: Vec<SkippedFileInfo>,
    taken: HashSet<String>,
    finished: bool,
}

impl PendingSubmission {
    pub fn code(&self) -> &PickupCode {
        &self.code
    }

    /// Persist one file under this submission.
    ///
    /// The name is normalized and made unique within the submission. A storage write failure
    /// skips the file and records it; a failure of `reader` itself, or the loss of the
    /// reservation, is returned and the submission should be aborted.
    pub async fn add_file(
        &mut self,
        original_name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), AppError> {
        let normalized = normalize_filename(original_name);
        if normalized != original_name {
            tracing::info!(
                original = %original_name,
                cleaned = %normalized,
                "Filename normalized"
            );
        }
        let display_name = unique_display_name(&normalized, &mut self.taken);

        match self
            .service
            .storage
            .persist(&self.code, &display_name, reader)
            .await
        {
            Ok(record) => {
                if let Err(e) = self
                    .service
                    .store
                    .track_pending_file(&self.code, record.clone())
                    .await
                {
                    self.service.storage.remove(&record).await;
                    return Err(e.into());
                }

                tracing::debug!(
                    code = %self.code,
                    display_name = %record.display_name,
                    size_bytes = record.size_bytes,
                    "File stored"
                );
                self.files.push(record);
                Ok(())
            }
            Err(StorageError::SourceFailed(e)) => Err(StorageError::SourceFailed(e).into()),
            Err(e) => {
                tracing::warn!(
                    code = %self.code,
                    display_name = %display_name,
                    error = %e,
                    "Skipping file that could not be stored"
                );
                self.skipped.push(SkippedFileInfo {
                    name: display_name,
                    reason: "could not be stored".to_string(),
                });
                Ok(())
            }
        }
    }

    pub async fn commit(self, text: Option<String>) -> Result<Submission, AppError> {
        self.commit_at(text, Utc::now()).await
    }

    /// Register the item, live from `now` for the service TTL.
    ///
    /// Blank text counts as no text. A submission with neither text nor stored files is
    /// rejected and its reservation released.
    pub async fn commit_at(
        mut self,
        text: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Submission, AppError> {
        let text = text.filter(|t| !t.trim().is_empty());

        if text.is_none() && self.files.is_empty() {
            let err = if self.skipped.is_empty() {
                AppError::InvalidInput("Provide text or at least one file".to_string())
            } else {
                AppError::WriteError("None of the uploaded files could be stored".to_string())
            };
            self.abort().await;
            return Err(err);
        }

        self.finished = true;
        let files = std::mem::take(&mut self.files);
        let text_len = text.as_ref().map(|t| t.chars().count()).unwrap_or(0);
        let names: Vec<String> = files.iter().map(|f| f.display_name.clone()).collect();

        let item = Item::new(files, text, now, self.service.ttl);
        let item = self.service.store.complete(&self.code, item).await?;

        tracing::info!(
            code = %self.code,
            files = ?names,
            skipped = self.skipped.len(),
            text_len,
            expires_at = %item.expires_at,
            "Upload stored"
        );

        Ok(Submission {
            code: self.code.clone(),
            item,
            skipped: std::mem::take(&mut self.skipped),
        })
    }

    /// Cancel the submission and delete every file stored under it.
    ///
    /// The code is not reissued before the files are gone. If the reaper already dropped
    /// the reservation, the files are left to it.
    pub async fn abort(mut self) {
        self.finished = true;
        let Some(files) = self.service.store.release(&self.code).await else {
            return;
        };
        tracing::info!(
            code = %self.code,
            files = files.len(),
            "Upload aborted, reclaiming stored files"
        );
        reclaim(&self.service.storage, &files).await;
        self.service.store.finish_reclaim(&self.code).await;
    }
}

impl Drop for PendingSubmission {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let store = self.service.store.clone();
        let storage = Arc::clone(&self.service.storage);
        let code = self.code.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let Some(files) = store.release(&code).await else {
                        return;
                    };
                    tracing::warn!(
                        code = %code,
                        files = files.len(),
                        "Upload abandoned, reclaiming stored files"
                    );
                    reclaim(&storage, &files).await;
                    store.finish_reclaim(&code).await;
                });
            }
            Err(_) => {
                tracing::warn!(code = %code, "Upload abandoned outside a runtime, left to the reaper");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use quickdrop_core::RandomCodes;
    use quickdrop_infra::CleanupService;
    use quickdrop_storage::{LocalStorage, StorageResult};
    use std::io::Read;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::{tempdir, TempDir};
    use tokio::io::ReadBuf;

    /// Local storage that refuses to write one display name.
    struct FlakyStorage {
        inner: LocalStorage,
        fail_on: String,
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn persist(
            &self,
            code: &PickupCode,
            display_name: &str,
            reader: &mut (dyn AsyncRead + Send + Unpin),
        ) -> StorageResult<FileRecord> {
            if display_name == self.fail_on {
                return Err(StorageError::WriteFailed("disk full".to_string()));
            }
            self.inner.persist(code, display_name, reader).await
        }

        async fn remove(&self, record: &FileRecord) {
            self.inner.remove(record).await
        }

        async fn read(&self, record: &FileRecord) -> StorageResult<Vec<u8>> {
            self.inner.read(record).await
        }

        async fn open_for_read(&self, record: &FileRecord) -> StorageResult<ByteStream> {
            self.inner.open_for_read(record).await
        }

        async fn exists(&self, record: &FileRecord) -> StorageResult<bool> {
            self.inner.exists(record).await
        }

        async fn health_check(&self) -> StorageResult<()> {
            self.inner.health_check().await
        }
    }

    /// Yields a few bytes, then fails like a dropped connection.
    struct BrokenUpload {
        sent: bool,
    }

    impl AsyncRead for BrokenUpload {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.sent {
                Poll::Ready(Err(std::io::Error::other("connection reset")))
            } else {
                self.sent = true;
                buf.put_slice(b"partial");
                Poll::Ready(Ok(()))
            }
        }
    }

    struct FixedCode(u32);

    impl CodeSource for FixedCode {
        fn next_code(&self) -> PickupCode {
            PickupCode::from_number(self.0)
        }
    }

    async fn service_with(
        storage: Arc<dyn Storage>,
        codes: Arc<dyn CodeSource>,
    ) -> (ExchangeService, ItemStore) {
        let store = ItemStore::new();
        let service = ExchangeService::new(store.clone(), storage, codes, Duration::minutes(5));
        (service, store)
    }

    async fn setup() -> (TempDir, ExchangeService, ItemStore, Arc<dyn Storage>) {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let (service, store) = service_with(Arc::clone(&storage), Arc::new(RandomCodes)).await;
        (dir, service, store, storage)
    }

    fn files(entries: &[(&str, &'static [u8])]) -> Vec<(String, &'static [u8])> {
        entries
            .iter()
            .map(|(name, data)| (name.to_string(), *data))
            .collect()
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk.unwrap());
        }
        data
    }

    fn dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_item_live_until_ttl_elapses() {
        let (_dir, service, _, _) = setup().await;
        let t0 = Utc::now();

        let submission = service
            .submit_at(
                Some("hello".to_string()),
                files(&[("a.txt", b"world")]),
                t0,
            )
            .await
            .unwrap();
        let code = submission.code.to_string();

        let (_, item) = service
            .fetch_item_at(&code, t0 + Duration::seconds(299))
            .await
            .unwrap();
        assert_eq!(item.text.as_deref(), Some("hello"));
        assert_eq!(item.files.len(), 1);
        assert_eq!(item.files[0].display_name, "a.txt");

        let err = service
            .fetch_item_at(&code, t0 + Duration::seconds(301))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_codes_are_not_found() {
        let (_dir, service, _, _) = setup().await;

        for code in ["123456", "12345", "abcdef", "", "1234567"] {
            let err = service.fetch_item(code).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "code {:?}", code);
        }
    }

    #[tokio::test]
    async fn test_failed_write_skips_only_that_file() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FlakyStorage {
            inner: LocalStorage::new(dir.path()).await.unwrap(),
            fail_on: "bad.bin".to_string(),
        });
        let (service, _) = service_with(storage, Arc::new(RandomCodes)).await;

        let submission = service
            .submit(
                None,
                files(&[("a.txt", b"one"), ("bad.bin", b"two"), ("c.txt", b"three")]),
            )
            .await
            .unwrap();

        let names: Vec<&str> = submission
            .item
            .files
            .iter()
            .map(|f| f.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
        assert_eq!(submission.skipped.len(), 1);
        assert_eq!(submission.skipped[0].name, "bad.bin");

        let err = service
            .fetch_file(submission.code.as_str(), "bad.bin")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_all_writes_failing_is_an_error() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FlakyStorage {
            inner: LocalStorage::new(dir.path()).await.unwrap(),
            fail_on: "bad.bin".to_string(),
        });
        let (service, store) = service_with(storage, Arc::new(RandomCodes)).await;

        let err = service
            .submit(None, files(&[("bad.bin", b"x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::WriteError(_)));
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_fetch_file_round_trip() {
        let (_dir, service, _, _) = setup().await;
        let payload: &'static [u8] = &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];

        let submission = service
            .submit(None, files(&[("blob.bin", payload), ("a.txt", b"world")]))
            .await
            .unwrap();

        let download = service
            .fetch_file(submission.code.as_str(), "blob.bin")
            .await
            .ok()
            .unwrap();
        assert_eq!(download.record.size_bytes, payload.len() as u64);
        assert_eq!(read_all(download.stream).await, payload);

        let download = service
            .fetch_file(submission.code.as_str(), "a.txt")
            .await
            .ok()
            .unwrap();
        assert_eq!(read_all(download.stream).await, b"world");
    }

    #[tokio::test]
    async fn test_fetch_file_unknown_name_is_not_found() {
        let (_dir, service, _, _) = setup().await;
        let submission = service
            .submit(None, files(&[("a.txt", b"world")]))
            .await
            .unwrap();

        let err = service
            .fetch_file(submission.code.as_str(), "b.txt")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bundle_contains_exactly_the_item_files() {
        let (_dir, service, _, _) = setup().await;
        let submission = service
            .submit(
                Some("notes".to_string()),
                files(&[("a.txt", b"world"), ("b.png", b"\x89PNG")]),
            )
            .await
            .unwrap();

        let bundle = service
            .fetch_bundle(submission.code.as_str(), ArchiveFormat::Zip)
            .await
            .unwrap();
        assert_eq!(bundle.filename, format!("{}.zip", submission.code));

        let data = read_all(bundle.stream).await;
        assert_eq!(data.len() as u64, bundle.size_bytes);
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.png"]);

        let mut content = Vec::new();
        archive
            .by_name("a.txt")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"world");
    }

    #[tokio::test]
    async fn test_bundle_with_missing_file_is_not_found() {
        let (_dir, service, _, storage) = setup().await;
        let submission = service
            .submit(None, files(&[("a.txt", b"world"), ("b.txt", b"gone")]))
            .await
            .unwrap();
        storage.remove(&submission.item.files[1]).await;

        let err = service
            .fetch_bundle(submission.code.as_str(), ArchiveFormat::Tar)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::ReadError(_)));
    }

    #[tokio::test]
    async fn test_expired_item_is_gone_everywhere_and_reaped() {
        let (dir, service, store, storage) = setup().await;
        let t0 = Utc::now() - Duration::minutes(10);

        let submission = service
            .submit_at(Some("hello".to_string()), files(&[("a.txt", b"world")]), t0)
            .await
            .unwrap();
        let code = submission.code.to_string();

        assert!(matches!(
            service.fetch_item(&code).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.fetch_file(&code, "a.txt").await.err().unwrap(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service
                .fetch_bundle(&code, ArchiveFormat::Zip)
                .await
                .err()
                .unwrap(),
            AppError::NotFound(_)
        ));

        // Files linger until the reaper runs.
        assert!(!dir_is_empty(&dir));

        let reaper = CleanupService::new(
            store,
            storage,
            std::time::Duration::from_secs(30),
            Duration::hours(1),
        );
        let report = reaper.sweep().await;
        assert_eq!(report.evicted, 1);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_codes() {
        let (_dir, service, _, _) = setup().await;

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .submit(Some(format!("item {}", i)), files(&[("a.txt", b"x")]))
                        .await
                })
            })
            .collect();

        let mut codes = HashSet::new();
        for result in futures::future::join_all(tasks).await {
            let submission = result.unwrap().unwrap();
            assert!(codes.insert(submission.code));
        }
        assert_eq!(codes.len(), 50);
        assert_eq!(service.live_items().await, 50);
    }

    #[tokio::test]
    async fn test_names_are_normalized_and_deduplicated() {
        let (_dir, service, _, _) = setup().await;

        let submission = service
            .submit(
                None,
                files(&[
                    ("a.txt", b"1"),
                    ("a.txt", b"2"),
                    ("../secret?.txt", b"3"),
                    ("", b"4"),
                ]),
            )
            .await
            .unwrap();

        let names: Vec<&str> = submission
            .item
            .files
            .iter()
            .map(|f| f.display_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["a.txt", "a (1).txt", "_secret_.txt", "unnamed_file"]
        );

        let download = service
            .fetch_file(submission.code.as_str(), "a (1).txt")
            .await
            .ok()
            .unwrap();
        assert_eq!(read_all(download.stream).await, b"2");
    }

    #[tokio::test]
    async fn test_empty_submission_is_rejected() {
        let (dir, service, store, _) = setup().await;

        let err = service
            .submit(Some("   ".to_string()), files(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(store.pending_count().await, 0);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_text_only_submission() {
        let (_dir, service, _, _) = setup().await;

        let submission = service
            .submit(Some("just text".to_string()), files(&[]))
            .await
            .unwrap();
        let (_, item) = service.fetch_item(submission.code.as_str()).await.unwrap();
        assert!(item.files.is_empty());
        assert_eq!(item.text.as_deref(), Some("just text"));
    }

    #[tokio::test]
    async fn test_broken_upload_stream_aborts_submission() {
        let (dir, service, store, _) = setup().await;

        let mut pending = service.begin_submission().await.unwrap();
        let mut first: &[u8] = b"complete";
        pending.add_file("first.txt", &mut first).await.unwrap();

        let mut broken = BrokenUpload { sent: false };
        let err = pending.add_file("second.txt", &mut broken).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let code = pending.code().clone();
        pending.abort().await;

        assert!(store.get(&code).await.is_err());
        assert_eq!(store.pending_count().await, 0);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_dropped_submission_is_reclaimed() {
        let (dir, service, store, _) = setup().await;

        let mut pending = service.begin_submission().await.unwrap();
        let mut data: &[u8] = b"orphan";
        pending.add_file("a.txt", &mut data).await.unwrap();
        drop(pending);

        for _ in 0..100 {
            if store.pending_count().await == 0 && dir_is_empty(&dir) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.pending_count().await, 0);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_evicted_code_is_held_until_its_files_are_deleted() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let (service, store) = service_with(Arc::clone(&storage), Arc::new(FixedCode(777))).await;
        let now = Utc::now();

        let old = service
            .submit_at(None, files(&[("a.txt", b"old")]), now - Duration::minutes(10))
            .await
            .unwrap();

        // Evicted by the reaper, files not deleted yet.
        let evicted = store.remove_expired(&old.code, now).await.unwrap();

        let err = service
            .submit_at(None, files(&[("a.txt", b"new")]), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));

        reclaim(&storage, &evicted.files).await;
        store.finish_reclaim(&old.code).await;

        let new = service
            .submit_at(None, files(&[("a.txt", b"new")]), now)
            .await
            .unwrap();
        assert_eq!(new.code, old.code);
        assert!(new.skipped.is_empty());

        let download = service
            .fetch_file_at(new.code.as_str(), "a.txt", now)
            .await
            .ok()
            .unwrap();
        assert_eq!(read_all(download.stream).await, b"new");
    }

    #[tokio::test]
    async fn test_reissued_code_reclaims_expired_occupant() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let (service, _) = service_with(Arc::clone(&storage), Arc::new(FixedCode(777))).await;
        let t0 = Utc::now();

        let old = service
            .submit_at(None, files(&[("old.txt", b"old")]), t0)
            .await
            .unwrap();

        // While the first item is live the only candidate code is taken.
        let err = service
            .submit_at(None, files(&[("new.txt", b"new")]), t0 + Duration::minutes(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));

        let later = t0 + Duration::minutes(6);
        let new = service
            .submit_at(None, files(&[("new.txt", b"new")]), later)
            .await
            .unwrap();

        assert_eq!(old.code, new.code);
        assert!(!storage.exists(&old.item.files[0]).await.unwrap());
        let (_, item) = service
            .fetch_item_at(new.code.as_str(), later)
            .await
            .unwrap();
        assert_eq!(item.files[0].display_name, "new.txt");
    }
}
