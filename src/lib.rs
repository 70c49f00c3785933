//! cloud-data-sync - Sync cloud object storage or a shared filesystem into a
//! local directory tree.

pub mod cli;
pub mod config;
pub mod object_store;
pub mod sync;
pub mod util;

pub use config::{BackendKind, Config, SyncRequest};
pub use object_store::{ObjectStore, ObjectStoreError};
pub use sync::{Result, SyncError, SyncOptions, SyncReport, run_config, run_sync};
