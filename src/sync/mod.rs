//! Sync module for bringing a local directory up to date with a remote source.
//!
//! # Overview
//!
//! A sync resolves a remote prefix to the objects it names, maps their keys
//! onto a local directory tree and downloads them one at a time. Object store
//! syncs download into a staging directory that is copied over the
//! destination afterwards.
//!
//! # Key Functions
//!
//! - [`run_sync`] - Run one resolved [`crate::config::SyncRequest`]
//! - [`run_config`] - Resolve a config and run it, skipping unknown platforms
//! - [`list_and_download_dir`] - Download a prefix from any [`crate::object_store::ObjectStore`]
//! - [`download_object`] - Atomically download a single object

mod download;
mod error;
mod layout;
mod list_download;
mod run_sync;

pub use download::{download_object, with_deadline};
pub use error::{DownloadError, ObjectFailure, Result, SyncError};
pub use layout::{
    LayoutError, LocalLayout, LocalTarget, base_name, create_directories, local_target,
    remote_keys_to_local_layout,
};
pub use list_download::{SyncStats, list_and_download_dir};
pub use run_sync::{
    DEFAULT_PAGE_SIZE, STAGING_PREFIX, SyncOptions, SyncReport, run_config, run_sync,
    sync_from_object_store,
};
