//! Error types for sync operations.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;
use crate::object_store::ObjectStoreError;
use crate::sync::layout::LayoutError;
use crate::sync::list_download::SyncStats;
use crate::util::CopyError;

/// Error type for downloading a single object.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The service refused the request. S3-compatible services also answer
    /// this way for a missing key when the caller may not list the bucket.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Transport or service failure while fetching the object.
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {timeout:?}: {key}")]
    Timeout { key: String, timeout: Duration },

    #[error("failed to write {path}: {source}")]
    LocalWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    InvalidKey(#[from] LayoutError),
}

impl From<ObjectStoreError> for DownloadError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound(key) => DownloadError::ObjectNotFound(key),
            ObjectStoreError::AccessDenied(message) => DownloadError::AccessDenied(message),
            other => DownloadError::Network(other.to_string()),
        }
    }
}

/// A single object that could not be synced.
#[derive(Debug)]
pub struct ObjectFailure {
    pub key: String,
    pub error: DownloadError,
}

/// Error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The object store client could not be created.
    #[error("object store setup failed: {0}")]
    AuthConfig(ObjectStoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A listing page could not be fetched.
    #[error("listing '{prefix}' failed: {source}")]
    Listing {
        prefix: String,
        source: ObjectStoreError,
    },

    #[error("listing '{prefix}' timed out after {timeout:?}")]
    ListingTimeout { prefix: String, timeout: Duration },

    /// A truncated page came back without a usable continuation cursor.
    #[error("listing '{prefix}' returned a truncated page without a new cursor")]
    StalledListing { prefix: String },

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("copy failed: {0}")]
    Copy(#[from] CopyError),

    #[error("failed to create staging directory: {0}")]
    Staging(std::io::Error),

    /// Some objects of a directory sync failed; the rest were downloaded.
    #[error(
        "{} object(s) failed to sync: {}",
        .failures.len(),
        summarize_failures(.failures)
    )]
    PartialFailure {
        failures: Vec<ObjectFailure>,
        stats: SyncStats,
    },
}

const SUMMARY_LIMIT: usize = 5;

fn summarize_failures(failures: &[ObjectFailure]) -> String {
    let mut summary = failures
        .iter()
        .take(SUMMARY_LIMIT)
        .map(|f| format!("{} ({})", f.key, f.error))
        .collect::<Vec<_>>()
        .join(", ");
    if failures.len() > SUMMARY_LIMIT {
        summary.push_str(&format!(", and {} more", failures.len() - SUMMARY_LIMIT));
    }
    summary
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
