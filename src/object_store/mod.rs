//! Object store capability interface and its backends.
//!
//! An [`ObjectStore`] exposes the two primitives the sync core needs:
//! - [`ObjectStore::list_page`] - one page of a prefix listing
//! - [`ObjectStore::get_object`] - the byte stream of one object
//!
//! Pagination, path mapping and download handling live in [`crate::sync`]
//! and are shared by every backend.

mod create_object_store;
mod memory_object_store;
mod s3_object_store;

pub use create_object_store::create_object_store;
pub use memory_object_store::{InjectedFailure, MemoryObjectStore};
pub use s3_object_store::{S3Flavor, S3ObjectStore, S3ObjectStoreConfig};

use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;

/// Separator used in object keys.
pub const KEY_SEPARATOR: char = '/';

/// Largest page size any backend accepts for a single listing request.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, ObjectStoreError>;

/// Errors that can occur in object store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectStoreError {
    /// Endpoint or credentials were rejected while building a client.
    #[error("invalid endpoint or credentials: {0}")]
    AuthConfig(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Transport or service failure.
    #[error("network error: {0}")]
    Network(String),
}

// =============================================================================
// Listing Types
// =============================================================================

/// An object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full key of the object within its bucket.
    pub key: String,
    /// Size in bytes as reported by the listing.
    pub size: u64,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Whether this object is a zero-byte directory placeholder.
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with(KEY_SEPARATOR)
    }
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Objects in key order.
    pub objects: Vec<RemoteObject>,
    /// Cursor to pass back for the next page.
    pub next_cursor: Option<String>,
    /// Whether more results follow this page.
    pub is_truncated: bool,
}

/// Byte stream of an object's content.
pub type ObjectBody = Pin<Box<dyn futures::Stream<Item = Result<Bytes>> + Send>>;

// =============================================================================
// ObjectStore Trait
// =============================================================================

/// A remote object store that can list prefixes and stream objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short name of the backend, used in logs.
    fn name(&self) -> &str;

    /// List one page of objects whose keys start with `prefix`.
    ///
    /// `cursor` is the `next_cursor` of the previous page, or None for the
    /// first page. At most `page_size` objects are returned.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: i32,
    ) -> Result<ListingPage>;

    /// Open the content of the object at `key`.
    ///
    /// Returns `ObjectStoreError::NotFound` if the key does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_marker() {
        assert!(RemoteObject::new("data/models/", 0).is_directory_marker());
        assert!(!RemoteObject::new("data/models/a.bin", 12).is_directory_marker());
        assert!(!RemoteObject::new("", 0).is_directory_marker());
    }
}
