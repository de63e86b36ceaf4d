//! Background container initialization.
//!
//! The container is created once at startup on its own task, so the server
//! can accept requests while the backend is still being prepared. A failure
//! is logged and reported but never stops the process: if the container
//! already exists, reads keep working, and if it does not, later operations
//! fail on their own.

use crate::Storage;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How the startup initialization ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    Failed(String),
    /// Shutdown was requested before the backend answered.
    Cancelled,
}

/// Run [`Storage::initialize`] on a background task.
///
/// The call races `shutdown`; when shutdown wins, the in-flight backend
/// request is dropped.
pub fn spawn_initializer(
    storage: Arc<dyn Storage>,
    shutdown: CancellationToken,
) -> JoinHandle<InitOutcome> {
    tokio::spawn(async move {
        let backend = storage.backend_type();
        let start = std::time::Instant::now();

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(backend = %backend, "Storage initialization cancelled by shutdown");
                InitOutcome::Cancelled
            }
            result = storage.initialize() => match result {
                Ok(()) => {
                    tracing::info!(
                        backend = %backend,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Storage container initialized"
                    );
                    InitOutcome::Initialized
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        backend = %backend,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Storage container initialization failed; continuing without it"
                    );
                    InitOutcome::Failed(e.to_string())
                }
            }
        }
    })
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::keys::ObjectKey;
    use crate::traits::{ByteStream, StorageError, StorageResult};
    use crate::{LocalStorage, StorageBackend};
    use async_trait::async_trait;
    use tokio::io::AsyncRead;

    /// A backend whose initialize never completes.
    struct Stalled;

    #[async_trait]
    impl Storage for Stalled {
        async fn initialize(&self) -> StorageResult<()> {
            std::future::pending().await
        }

        async fn list_names(&self) -> StorageResult<Vec<ObjectKey>> {
            Ok(Vec::new())
        }

        async fn save(
            &self,
            _key: &ObjectKey,
            _reader: &mut (dyn AsyncRead + Send + Unpin),
        ) -> StorageResult<()> {
            Ok(())
        }

        async fn load(&self, key: &ObjectKey) -> StorageResult<ByteStream> {
            Err(StorageError::NotFound(key.to_string()))
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }
    }

    #[tokio::test]
    async fn test_initializer_creates_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files");
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&path));

        let outcome = spawn_initializer(storage, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, InitOutcome::Initialized);
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_initializer_failure_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the container directory should go
        let blocker = dir.path().join("files");
        std::fs::write(&blocker, b"").unwrap();
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&blocker));

        let outcome = spawn_initializer(storage, CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, InitOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_initializer_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let handle = spawn_initializer(Arc::new(Stalled), shutdown.clone());

        shutdown.cancel();
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, InitOutcome::Cancelled);
    }
}
