//! Run sync functionality.
//!
//! [`run_sync`] takes a resolved [`SyncRequest`] and brings its destination
//! up to date. Object store backends are downloaded into a fresh staging
//! directory which is then copied over the destination; the public
//! filesystem backend is copied directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{BackendKind, Config, SyncRequest, SyncSettings, resolve_request};
use crate::object_store::{MAX_PAGE_SIZE, ObjectStore, ObjectStoreError, create_object_store};
use crate::sync::error::{Result, SyncError};
use crate::sync::list_download::{SyncStats, list_and_download_dir};
use crate::util::{CopyStats, copy_dir};

/// Prefix of staging directory names.
pub const STAGING_PREFIX: &str = "clouddatasync_";

/// Default number of keys requested per listing page.
pub const DEFAULT_PAGE_SIZE: i32 = MAX_PAGE_SIZE;

/// Options for running a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Keys requested per listing page, within 1..=1000.
    pub page_size: i32,
    /// Deadline for each listing request and each object download.
    pub request_timeout: Option<Duration>,
    /// Directory under which staging directories are created. None uses the
    /// system temp directory.
    pub staging_root: Option<PathBuf>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: None,
            staging_root: None,
        }
    }
}

impl SyncOptions {
    /// Options from the `[sync]` config section. A timeout of 0 disables
    /// the deadline.
    pub fn from_settings(settings: &SyncSettings) -> Self {
        let options = Self {
            request_timeout: settings
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            staging_root: settings.staging_dir.clone(),
            ..Self::default()
        };
        match settings.page_size {
            Some(page_size) => options.with_page_size(page_size),
            None => options,
        }
    }

    /// Set the page size, clamped to what backends accept.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_staging_root(mut self, staging_root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(staging_root.into());
        self
    }
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub backend: Option<BackendKind>,
    pub destination: Option<PathBuf>,
    pub objects_downloaded: u64,
    pub bytes_downloaded: u64,
    pub directories_created: u64,
    pub files_copied: u64,
    /// Nothing was synced because no known platform is configured.
    pub skipped: bool,
}

impl SyncReport {
    fn new(request: &SyncRequest, download: SyncStats, copy: CopyStats) -> Self {
        Self {
            backend: Some(request.backend),
            destination: Some(request.destination.clone()),
            objects_downloaded: download.objects_downloaded,
            bytes_downloaded: download.bytes_downloaded,
            directories_created: download.directories_created + copy.directories_created,
            files_copied: copy.files_copied,
            skipped: false,
        }
    }

    /// Report for a run with nothing to do.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Resolve the request described by `config` and run it.
///
/// An unset or unrecognized platform is not an error: a warning is logged
/// and a skipped report is returned.
pub async fn run_config(config: &Config, options: &SyncOptions) -> Result<SyncReport> {
    match resolve_request(config)? {
        Some(request) => run_sync(&request, options).await,
        None => {
            warn!(
                platform = %config.clouds.platform,
                "platform is unset or not recognized, nothing to sync"
            );
            Ok(SyncReport::skipped())
        }
    }
}

/// Run one sync request.
pub async fn run_sync(request: &SyncRequest, options: &SyncOptions) -> Result<SyncReport> {
    info!(
        backend = %request.backend,
        source = %request.source,
        destination = %request.destination.display(),
        "starting sync"
    );

    let report = match request.backend {
        BackendKind::WanjiePublicFs => {
            let copy = copy_dir(Path::new(&request.source), &request.destination).await?;
            SyncReport::new(request, SyncStats::default(), copy)
        }
        BackendKind::AliOss | BackendKind::TencentCos | BackendKind::WanjieS3 => {
            let store = create_object_store(request)
                .await
                .map_err(SyncError::AuthConfig)?;
            sync_from_object_store(store.as_ref(), request, options).await?
        }
    };

    info!(
        objects = report.objects_downloaded,
        bytes = report.bytes_downloaded,
        files_copied = report.files_copied,
        "sync finished"
    );
    Ok(report)
}

/// Download `request.source` from `store` through a staging directory into
/// `request.destination`.
///
/// When only some objects fail, the rest are still copied to the destination
/// before the aggregate error is returned. The staging directory is removed
/// on every path.
pub async fn sync_from_object_store(
    store: &dyn ObjectStore,
    request: &SyncRequest,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let bucket = request.bucket.as_deref().ok_or_else(|| {
        SyncError::AuthConfig(ObjectStoreError::AuthConfig(format!(
            "no bucket configured for {}",
            request.backend
        )))
    })?;

    let staging = create_staging_dir(options).await?;
    debug!(
        store = store.name(),
        staging = %staging.path().display(),
        "created staging directory"
    );

    let (stats, failures) =
        match list_and_download_dir(store, bucket, &request.source, staging.path(), options).await
        {
            Ok(stats) => (stats, None),
            Err(SyncError::PartialFailure { failures, stats }) => (stats, Some(failures)),
            Err(e) => return Err(e),
        };

    let copy = copy_dir(staging.path(), &request.destination).await?;

    if let Err(e) = staging.close() {
        warn!(error = %e, "failed to remove staging directory");
    }

    match failures {
        None => Ok(SyncReport::new(request, stats, copy)),
        Some(failures) => Err(SyncError::PartialFailure { failures, stats }),
    }
}

async fn create_staging_dir(options: &SyncOptions) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_PREFIX);

    let staging = match &options.staging_root {
        Some(root) => {
            fs::create_dir_all(root).await.map_err(SyncError::Staging)?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    };
    staging.map_err(SyncError::Staging)
}
