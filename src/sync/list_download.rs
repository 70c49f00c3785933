//! Prefix enumeration and download.
//!
//! [`list_and_download_dir`] decides whether a prefix names a single object
//! or a virtual directory. Directories are walked page by page; each page is
//! mapped through the layout, its directories are created, then its files
//! are downloaded one at a time.
//!
//! A failing object does not stop the walk. Failures are collected and
//! returned together as [`SyncError::PartialFailure`] once every page has
//! been processed. Listing failures end the walk immediately.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::object_store::{KEY_SEPARATOR, ListingPage, ObjectStore};
use crate::sync::download::{download_object, with_deadline};
use crate::sync::error::{DownloadError, ObjectFailure, Result, SyncError};
use crate::sync::layout::{
    LayoutError, LocalLayout, base_name, create_directories, remote_keys_to_local_layout,
};
use crate::sync::run_sync::SyncOptions;

/// Counters for one listing-and-download run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Objects returned by the listing, placeholders included.
    pub objects_listed: u64,
    pub objects_downloaded: u64,
    pub bytes_downloaded: u64,
    /// Directories that did not exist before the run.
    pub directories_created: u64,
}

/// Download everything `prefix` refers to into `local_base_dir`.
///
/// An empty prefix or one ending with `/` is walked as a directory. Any
/// other prefix is first fetched as a single object, saved under its base
/// name; if no such object exists, or the store refuses the request, it is
/// walked as the directory `prefix + "/"`. When that walk lists nothing the
/// error from the single-object attempt is returned.
pub async fn list_and_download_dir(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    local_base_dir: &Path,
    options: &SyncOptions,
) -> Result<SyncStats> {
    if prefix.is_empty() || prefix.ends_with(KEY_SEPARATOR) {
        return DirectorySync::new(store, bucket, prefix, local_base_dir, options)
            .run()
            .await;
    }

    let target = local_base_dir.join(base_name(prefix).map_err(DownloadError::from)?);
    match download_object(store, bucket, prefix, &target, options).await {
        Ok(bytes) => {
            info!(key = prefix, bytes, "downloaded single object");
            Ok(SyncStats {
                objects_listed: 1,
                objects_downloaded: 1,
                bytes_downloaded: bytes,
                directories_created: 0,
            })
        }
        // S3 answers 403 instead of 404 for a missing key when the caller
        // lacks list permission on the bucket
        Err(e @ (DownloadError::ObjectNotFound(_) | DownloadError::AccessDenied(_))) => {
            let dir_prefix = format!("{}{}", prefix, KEY_SEPARATOR);
            debug!(prefix = %dir_prefix, error = %e, "no object at prefix, listing as directory");

            let stats = DirectorySync::new(store, bucket, &dir_prefix, local_base_dir, options)
                .run()
                .await?;
            if stats.objects_listed == 0 {
                return Err(e.into());
            }
            Ok(stats)
        }
        Err(e) => Err(e.into()),
    }
}

/// State of one directory walk.
struct DirectorySync<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    prefix: &'a str,
    base: &'a Path,
    options: &'a SyncOptions,
    stats: SyncStats,
    failures: Vec<ObjectFailure>,
    ensured_dirs: BTreeSet<PathBuf>,
}

impl<'a> DirectorySync<'a> {
    fn new(
        store: &'a dyn ObjectStore,
        bucket: &'a str,
        prefix: &'a str,
        base: &'a Path,
        options: &'a SyncOptions,
    ) -> Self {
        Self {
            store,
            bucket,
            prefix,
            base,
            options,
            stats: SyncStats::default(),
            failures: Vec::new(),
            ensured_dirs: BTreeSet::new(),
        }
    }

    async fn run(mut self) -> Result<SyncStats> {
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();

        loop {
            let page = self.fetch_page(cursor.as_deref()).await?;
            debug!(
                prefix = self.prefix,
                objects = page.objects.len(),
                truncated = page.is_truncated,
                "listed page"
            );
            self.stats.objects_listed += page.objects.len() as u64;

            self.process_page(&page).await;

            if !page.is_truncated {
                break;
            }
            match page.next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                _ => {
                    return Err(SyncError::StalledListing {
                        prefix: self.prefix.to_string(),
                    });
                }
            }
        }

        info!(
            prefix = self.prefix,
            listed = self.stats.objects_listed,
            downloaded = self.stats.objects_downloaded,
            failed = self.failures.len(),
            "directory sync finished"
        );

        if self.failures.is_empty() {
            Ok(self.stats)
        } else {
            Err(SyncError::PartialFailure {
                failures: self.failures,
                stats: self.stats,
            })
        }
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<ListingPage> {
        let request = self.store.list_page(
            self.bucket,
            self.prefix,
            cursor,
            self.options.page_size,
        );

        match with_deadline(self.options.request_timeout, request).await {
            Some(Ok(page)) => Ok(page),
            Some(Err(source)) => Err(SyncError::Listing {
                prefix: self.prefix.to_string(),
                source,
            }),
            None => Err(SyncError::ListingTimeout {
                prefix: self.prefix.to_string(),
                timeout: self.options.request_timeout.unwrap_or_default(),
            }),
        }
    }

    async fn process_page(&mut self, page: &ListingPage) {
        let layout = remote_keys_to_local_layout(
            page.objects.iter().map(|obj| obj.key.as_str()),
            self.prefix,
            self.base,
        );

        for error in layout.rejected() {
            let LayoutError::InvalidKey { key, .. } = error;
            self.fail(key, DownloadError::InvalidKey(error.clone()));
        }

        let failed_dirs = self.create_page_directories(&layout).await;

        for (key, path) in layout.files() {
            if let Some(error) = blocked_by(&failed_dirs, path) {
                self.fail(key, error);
                continue;
            }

            match download_object(self.store, self.bucket, key, path, self.options).await {
                Ok(bytes) => {
                    self.stats.objects_downloaded += 1;
                    self.stats.bytes_downloaded += bytes;
                }
                Err(e) => self.fail(key, e),
            }
        }
    }

    /// Create the page's directories before any of its files are written.
    ///
    /// Returns the directories that failed, with their error kind and message.
    async fn create_page_directories(&mut self, layout: &LocalLayout) -> Vec<FailedDirectory> {
        let pending: Vec<PathBuf> = layout
            .directories()
            .into_iter()
            .filter(|dir| !self.ensured_dirs.contains(dir))
            .collect();

        let mut existing = BTreeSet::new();
        for dir in &pending {
            if fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
                existing.insert(dir.clone());
            }
        }

        let failed = create_directories(&pending).await;

        for dir in pending {
            if !failed.iter().any(|(bad, _)| dir.starts_with(bad)) {
                if !existing.contains(&dir) {
                    self.stats.directories_created += 1;
                }
                self.ensured_dirs.insert(dir);
            }
        }

        let failed: Vec<FailedDirectory> = failed
            .into_iter()
            .map(|(dir, e)| (dir, e.kind(), e.to_string()))
            .collect();

        // Placeholders under a failed directory fail as well
        for (key, path) in layout.placeholders() {
            if let Some(error) = blocked_by(&failed, path) {
                self.fail(key, error);
            }
        }

        failed
    }

    fn fail(&mut self, key: &str, error: DownloadError) {
        warn!(key, error = %error, "failed to sync object");
        self.failures.push(ObjectFailure {
            key: key.to_string(),
            error,
        });
    }
}

/// Directory creation failure, as recorded per page.
type FailedDirectory = (PathBuf, std::io::ErrorKind, String);

/// The error for a path that lies under a directory that could not be created.
fn blocked_by(failed: &[FailedDirectory], path: &Path) -> Option<DownloadError> {
    failed
        .iter()
        .find(|(dir, _, _)| path.starts_with(dir))
        .map(|(dir, kind, message)| DownloadError::LocalWrite {
            path: dir.clone(),
            source: std::io::Error::new(*kind, message.clone()),
        })
}
