use crate::keys::ObjectKey;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Staging directory for uploads in progress. The `-` keeps it outside the
/// key alphabet, so it can never collide with a stored object.
const STAGING_DIR: &str = ".in-flight";

/// Staged files untouched for this long belong to saves that were abandoned
/// mid-write and are removed by [`Storage::initialize`].
const STALE_UPLOAD_AGE: Duration = Duration::from_secs(60 * 60);

/// Local filesystem storage implementation
///
/// The container is a single directory; each object is a regular file named
/// after its key.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// Does not touch the filesystem; the directory is created by
    /// [`Storage::initialize`].
    ///
    /// # Arguments
    /// * `base_path` - Container directory (e.g., "/var/lib/filebox/files")
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        LocalStorage {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Keys never contain separators and are never `.` or `..`, so joining
    /// cannot escape the container.
    fn key_to_path(&self, key: &ObjectKey) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    fn staging_dir(&self) -> PathBuf {
        self.base_path.join(STAGING_DIR)
    }

    /// Create the staging directory inside an existing container.
    ///
    /// Uses `create_dir` rather than `create_dir_all` so a missing container
    /// surfaces as an error instead of being recreated on the save path.
    async fn ensure_staging_dir(&self) -> StorageResult<PathBuf> {
        let dir = self.staging_dir();
        match fs::create_dir(&dir).await {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(dir),
            Err(e) => Err(StorageError::UploadFailed(format!(
                "Failed to prepare staging directory {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    /// Remove staged files older than `max_age`.
    ///
    /// Younger files may belong to saves still in progress and are left
    /// alone. Failures are logged, never returned.
    async fn sweep_stale_uploads(&self, max_age: Duration) -> usize {
        let dir = self.staging_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %dir.display(),
                    "Failed to scan staging directory"
                );
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    error = %e,
                    path = %entry.path().display(),
                    "Failed to remove abandoned upload"
                ),
            }
        }
        removed
    }

    async fn write_staged(
        &self,
        staged: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(staged).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", staged.display(), e))
        })?;

        let bytes_copied = tokio::io::copy(reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                staged.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", staged.display(), e))
        })?;

        Ok(bytes_copied)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn initialize(&self) -> StorageResult<()> {
        fs::create_dir_all(self.staging_dir()).await.map_err(|e| {
            StorageError::InitializeFailed(format!(
                "Failed to create storage directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let swept = self.sweep_stale_uploads(STALE_UPLOAD_AGE).await;
        if swept > 0 {
            tracing::info!(count = swept, "Removed abandoned uploads");
        }

        tracing::info!(
            path = %self.base_path.display(),
            "Local storage container ready"
        );

        Ok(())
    }

    async fn list_names(&self) -> StorageResult<Vec<ObjectKey>> {
        let mut entries = fs::read_dir(&self.base_path).await.map_err(|e| {
            StorageError::ListFailed(format!(
                "Failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;
            if !file_type.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            match file_name.to_str().map(ObjectKey::parse) {
                Some(Ok(key)) => names.push(key),
                _ => {
                    tracing::debug!(
                        path = %entry.path().display(),
                        "Skipping file that is not a valid object key"
                    );
                }
            }
        }

        Ok(names)
    }

    async fn save(
        &self,
        key: &ObjectKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()> {
        let path = self.key_to_path(key);
        let start = std::time::Instant::now();

        let staged = self
            .ensure_staging_dir()
            .await?
            .join(format!("{}.{}", key, Uuid::new_v4()));

        let written = self.write_staged(&staged, reader).await;
        let bytes_copied = match written {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&staged).await;
                return Err(e);
            }
        };

        // rename() replaces the destination atomically, so concurrent saves to
        // one key resolve to whichever rename lands last.
        if let Err(e) = fs::rename(&staged, &path).await {
            let _ = fs::remove_file(&staged).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to move upload into place at {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );

        Ok(())
    }

    async fn load(&self, key: &ObjectKey) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key);
        let start = std::time::Instant::now();

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let metadata = file
            .metadata()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let key_display = key.to_string();
        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %path_display,
                    key = %key_display,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream read error"
                );
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = metadata.len(),
            "Local storage load opened"
        );

        Ok(Box::pin(stream))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::parse(name).unwrap()
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk.unwrap());
        }
        data
    }

    async fn initialized_storage(dir: &Path) -> LocalStorage {
        let storage = LocalStorage::new(dir.join("files"));
        storage.initialize().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_save_then_load_returns_same_bytes() {
        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;

        let data = b"test data".to_vec();
        let mut reader = std::io::Cursor::new(data.clone());
        storage.save(&key("test.txt"), &mut reader).await.unwrap();

        let loaded = collect(storage.load(&key("test.txt")).await.unwrap()).await;
        assert_eq!(data, loaded);
    }

    #[tokio::test]
    async fn test_large_object_streams_in_chunks() {
        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;

        let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        let mut reader = std::io::Cursor::new(data.clone());
        storage.save(&key("big.bin"), &mut reader).await.unwrap();

        let mut stream = storage.load(&key("big.bin")).await.unwrap();
        let mut chunks = 0;
        let mut loaded = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks += 1;
            loaded.extend_from_slice(&chunk.unwrap());
        }
        assert!(chunks > 1);
        assert_eq!(data, loaded);
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_object() {
        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;

        let mut first = std::io::Cursor::new(b"first version".to_vec());
        storage.save(&key("doc.txt"), &mut first).await.unwrap();
        let mut second = std::io::Cursor::new(b"second".to_vec());
        storage.save(&key("doc.txt"), &mut second).await.unwrap();

        let loaded = collect(storage.load(&key("doc.txt")).await.unwrap()).await;
        assert_eq!(loaded, b"second");
        assert_eq!(storage.list_names().await.unwrap(), vec![key("doc.txt")]);
    }

    #[tokio::test]
    async fn test_load_missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;

        let result = storage.load(&key("never_saved.bin")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_names_on_empty_container() {
        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;

        assert!(storage.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_names_skips_staging_and_foreign_files() {
        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;

        let mut reader = std::io::Cursor::new(b"x".to_vec());
        storage.save(&key("a.txt"), &mut reader).await.unwrap();
        let mut reader = std::io::Cursor::new(b"y".to_vec());
        storage.save(&key("b.txt"), &mut reader).await.unwrap();
        std::fs::write(storage.base_path().join("not a key.txt"), b"z").unwrap();
        std::fs::create_dir(storage.base_path().join("nested")).unwrap();

        let mut names = storage.list_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec![key("a.txt"), key("b.txt")]);
    }

    #[tokio::test]
    async fn test_initialize_twice_succeeds() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("files"));

        storage.initialize().await.unwrap();
        storage.initialize().await.unwrap();
        assert!(storage.base_path().is_dir());
    }

    #[tokio::test]
    async fn test_initialize_removes_abandoned_uploads() {
        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;
        let staging = storage.base_path().join(STAGING_DIR);

        let abandoned = staging.join("video.mp4.1b4e28ba-2fa1-11d2-883f-0016d3cca427");
        std::fs::write(&abandoned, b"partial").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&abandoned)
            .unwrap()
            .set_modified(SystemTime::now() - 2 * STALE_UPLOAD_AGE)
            .unwrap();
        let in_progress = staging.join("photo.jpg.6fa459ea-ee8a-3ca4-894e-db77e160355e");
        std::fs::write(&in_progress, b"still writing").unwrap();

        storage.initialize().await.unwrap();

        assert!(!abandoned.exists());
        assert!(in_progress.exists());
        assert!(storage.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_operations_fail_without_container() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("missing"));

        assert!(matches!(
            storage.list_names().await,
            Err(StorageError::ListFailed(_))
        ));

        let mut reader = std::io::Cursor::new(b"data".to_vec());
        assert!(matches!(
            storage.save(&key("a.txt"), &mut reader).await,
            Err(StorageError::UploadFailed(_))
        ));
        assert!(!storage.base_path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_saves_leave_one_complete_object() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(initialized_storage(dir.path()).await);

        let first = vec![b'1'; 512 * 1024];
        let second = vec![b'2'; 768 * 1024];

        let s1 = storage.clone();
        let d1 = first.clone();
        let t1 = tokio::spawn(async move {
            let mut reader = std::io::Cursor::new(d1);
            s1.save(&key("race.bin"), &mut reader).await
        });
        let s2 = storage.clone();
        let d2 = second.clone();
        let t2 = tokio::spawn(async move {
            let mut reader = std::io::Cursor::new(d2);
            s2.save(&key("race.bin"), &mut reader).await
        });
        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();

        let loaded = collect(storage.load(&key("race.bin")).await.unwrap()).await;
        assert!(loaded == first || loaded == second);

        let staging = std::fs::read_dir(storage.base_path().join(STAGING_DIR)).unwrap();
        assert_eq!(staging.count(), 0);
    }

    #[tokio::test]
    async fn test_failed_read_leaves_no_partial_object() {
        struct Broken;

        impl AsyncRead for Broken {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Ready(Err(std::io::Error::other("client went away")))
            }
        }

        let dir = tempdir().unwrap();
        let storage = initialized_storage(dir.path()).await;

        let result = storage.save(&key("broken.bin"), &mut Broken).await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(storage.list_names().await.unwrap().is_empty());
        assert!(matches!(
            storage.load(&key("broken.bin")).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
