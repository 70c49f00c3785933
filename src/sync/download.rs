//! Atomic download of a single object.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::object_store::ObjectStore;
use crate::sync::error::DownloadError;
use crate::sync::run_sync::SyncOptions;

/// Counter for generating unique temp file names.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Run `fut` under an optional deadline.
///
/// Returns None if the deadline expired first.
pub async fn with_deadline<F: Future>(timeout: Option<Duration>, fut: F) -> Option<F::Output> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Temp file path next to `local_path`, so the final rename stays on one
/// filesystem.
fn temp_file_path(local_path: &Path) -> PathBuf {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let name = format!(".cds-part.{}.{}", pid, counter);
    match local_path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn local_write(path: &Path) -> impl FnOnce(std::io::Error) -> DownloadError + '_ {
    move |source| DownloadError::LocalWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Download the object at `key` to `local_path`.
///
/// The body is written to a temp file in the same directory and renamed over
/// `local_path` once complete. On failure the temp file is removed and any
/// existing file at `local_path` is left untouched.
///
/// Returns the number of bytes written.
pub async fn download_object(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    local_path: &Path,
    options: &SyncOptions,
) -> Result<u64, DownloadError> {
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent).await.map_err(local_write(parent))?;
    }

    let temp_path = temp_file_path(local_path);

    let result = match with_deadline(
        options.request_timeout,
        write_body(store, bucket, key, &temp_path),
    )
    .await
    {
        Some(result) => result,
        None => Err(DownloadError::Timeout {
            key: key.to_string(),
            timeout: options.request_timeout.unwrap_or_default(),
        }),
    };

    let result = match result {
        Ok(written) => fs::rename(&temp_path, local_path)
            .await
            .map(|()| written)
            .map_err(local_write(local_path)),
        Err(e) => Err(e),
    };

    if result.is_err() {
        // Ignore the error: the temp file may never have been created
        let _ = fs::remove_file(&temp_path).await;
    } else {
        debug!(key, path = %local_path.display(), "downloaded object");
    }

    result
}

/// Stream the object body into `temp_path`.
async fn write_body(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    temp_path: &Path,
) -> Result<u64, DownloadError> {
    let mut body = store.get_object(bucket, key).await?;

    let mut file = fs::File::create(temp_path)
        .await
        .map_err(local_write(temp_path))?;

    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(local_write(temp_path))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(local_write(temp_path))?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{
        InjectedFailure, ListingPage, MemoryObjectStore, ObjectBody, Result as StoreResult,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::TempDir;

    const BUCKET: &str = "bucket";

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Yields one chunk and then never finishes.
    struct StallingStore;

    #[async_trait]
    impl ObjectStore for StallingStore {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn list_page(
            &self,
            _bucket: &str,
            _prefix: &str,
            _cursor: Option<&str>,
            _page_size: i32,
        ) -> StoreResult<ListingPage> {
            Ok(ListingPage::default())
        }

        async fn get_object(&self, _bucket: &str, _key: &str) -> StoreResult<ObjectBody> {
            let first = futures::stream::once(async { Ok(Bytes::from_static(b"partial")) });
            Ok(Box::pin(first.chain(futures::stream::pending())))
        }
    }

    #[tokio::test]
    async fn test_download_writes_content() {
        let temp = TempDir::new().unwrap();
        let contents = "x".repeat(100);
        let store = MemoryObjectStore::new().with_object(BUCKET, "a/b.txt", contents.clone());
        let target = temp.path().join("nested/dir/b.txt");

        let written = download_object(&store, BUCKET, "a/b.txt", &target, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(written, 100);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), contents);
        assert_eq!(entries(&temp.path().join("nested/dir")), vec!["b.txt"]);
    }

    #[tokio::test]
    async fn test_failed_download_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("b.bin");
        std::fs::write(&target, b"previous").unwrap();

        let store = MemoryObjectStore::new()
            .with_object(BUCKET, "b.bin", vec![7u8; 64])
            .with_failure("b.bin", InjectedFailure::MidStream);

        let result =
            download_object(&store, BUCKET, "b.bin", &target, &SyncOptions::default()).await;

        assert!(matches!(result, Err(DownloadError::Network(_))));
        assert_eq!(std::fs::read(&target).unwrap(), b"previous");
        assert_eq!(entries(temp.path()), vec!["b.bin"]);
    }

    #[tokio::test]
    async fn test_missing_object_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let store = MemoryObjectStore::new().with_bucket(BUCKET);
        let target = temp.path().join("missing.txt");

        let result =
            download_object(&store, BUCKET, "missing.txt", &target, &SyncOptions::default()).await;

        assert!(matches!(result, Err(DownloadError::ObjectNotFound(_))));
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_download_timeout_removes_temp_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("slow.bin");
        let options = SyncOptions {
            request_timeout: Some(Duration::from_millis(50)),
            ..SyncOptions::default()
        };

        let result = download_object(&StallingStore, BUCKET, "slow.bin", &target, &options).await;

        assert!(matches!(result, Err(DownloadError::Timeout { .. })));
        assert!(entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_with_deadline() {
        assert_eq!(with_deadline(None, async { 3 }).await, Some(3));
        assert_eq!(
            with_deadline(Some(Duration::from_secs(5)), async { 4 }).await,
            Some(4)
        );
        assert_eq!(
            with_deadline(
                Some(Duration::from_millis(10)),
                futures::future::pending::<()>()
            )
            .await,
            None
        );
    }
}
