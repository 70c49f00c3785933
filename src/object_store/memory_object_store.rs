//! In-memory ObjectStore implementation.
//!
//! MemoryObjectStore holds objects in sorted maps and pages through them the
//! way an S3 listing does. It records every request so tests can check what
//! the sync core asked for, and it can be told to fail chosen keys.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::object_store::{
    ListingPage, MAX_PAGE_SIZE, ObjectBody, ObjectStore, ObjectStoreError, RemoteObject, Result,
};

/// Body chunks are yielded in pieces of this size.
const BODY_CHUNK_SIZE: usize = 16;

/// How an injected failure shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// `get_object` itself fails.
    Open,
    /// `get_object` succeeds but the body stream errors after its first chunk.
    MidStream,
    /// `get_object` is refused the way S3 refuses a missing key to a caller
    /// without list permission.
    Denied,
}

/// An ObjectStore held entirely in memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: BTreeMap<String, BTreeMap<String, Bytes>>,
    failures: HashMap<String, InjectedFailure>,
    /// Caps the page size below what callers request.
    page_size_limit: Option<i32>,
    requested_keys: Mutex<Vec<String>>,
    listed_cursors: Mutex<Vec<Option<String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object.
    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        self.buckets
            .entry(bucket.into())
            .or_default()
            .insert(key.into(), contents.into());
        self
    }

    /// Add an empty bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.entry(bucket.into()).or_default();
        self
    }

    /// Make downloads of `key` fail.
    pub fn with_failure(mut self, key: impl Into<String>, failure: InjectedFailure) -> Self {
        self.failures.insert(key.into(), failure);
        self
    }

    /// Return at most `limit` objects per page regardless of the requested size.
    pub fn with_page_size_limit(mut self, limit: i32) -> Self {
        self.page_size_limit = Some(limit);
        self
    }

    /// Keys passed to `get_object`, in call order.
    pub fn requested_keys(&self) -> Vec<String> {
        self.requested_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Cursors passed to `list_page`, in call order.
    pub fn listed_cursors(&self) -> Vec<Option<String>> {
        self.listed_cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: i32,
    ) -> Result<ListingPage> {
        self.listed_cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(cursor.map(|c| c.to_string()));

        let objects = self
            .buckets
            .get(bucket)
            .ok_or_else(|| ObjectStoreError::NotFound(bucket.to_string()))?;

        let limit = page_size
            .clamp(1, MAX_PAGE_SIZE)
            .min(self.page_size_limit.unwrap_or(MAX_PAGE_SIZE))
            .max(1) as usize;

        // The cursor is the last key of the previous page.
        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| cursor.is_none_or(|c| key.as_str() > c))
            .map(|(key, contents)| RemoteObject::new(key.clone(), contents.len() as u64));

        let page: Vec<RemoteObject> = matching.by_ref().take(limit).collect();
        let is_truncated = matching.next().is_some();
        let next_cursor = if is_truncated {
            page.last().map(|obj| obj.key.clone())
        } else {
            None
        };

        Ok(ListingPage {
            objects: page,
            next_cursor,
            is_truncated,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        self.requested_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.to_string());

        let failure = self.failures.get(key).copied();
        match failure {
            Some(InjectedFailure::Open) => {
                return Err(ObjectStoreError::Network(format!(
                    "{}: injected failure",
                    key
                )));
            }
            Some(InjectedFailure::Denied) => {
                return Err(ObjectStoreError::AccessDenied(key.to_string()));
            }
            Some(InjectedFailure::MidStream) | None => {}
        }

        let contents = self
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;

        let mut chunks: Vec<Result<Bytes>> = contents
            .chunks(BODY_CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        if failure == Some(InjectedFailure::MidStream) {
            chunks.truncate(1);
            chunks.push(Err(ObjectStoreError::Network(format!(
                "{}: connection reset",
                key
            ))));
        }

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn store() -> MemoryObjectStore {
        MemoryObjectStore::new()
            .with_object("b", "data/a.txt", "a")
            .with_object("b", "data/b.txt", "b")
            .with_object("b", "data/sub/c.txt", "c")
            .with_object("b", "other/d.txt", "d")
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let page = store().list_page("b", "data/", None, 1000).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["data/a.txt", "data/b.txt", "data/sub/c.txt"]);
        assert!(!page.is_truncated);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_list_pages_with_cursor() {
        let store = store().with_page_size_limit(2);

        let first = store.list_page("b", "data/", None, 1000).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert!(first.is_truncated);

        let cursor = first.next_cursor.clone().unwrap();
        let second = store
            .list_page("b", "data/", Some(&cursor), 1000)
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "data/sub/c.txt");
        assert!(!second.is_truncated);

        assert_eq!(store.listed_cursors(), vec![None, Some(cursor)]);
    }

    #[tokio::test]
    async fn test_missing_bucket() {
        let result = store().list_page("nope", "", None, 10).await;
        assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_object_streams_content() {
        let contents = "x".repeat(40);
        let store = MemoryObjectStore::new().with_object("b", "big", contents.clone());

        let chunks: Vec<Bytes> = store
            .get_object("b", "big")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), contents.as_bytes());
        assert_eq!(store.requested_keys(), vec!["big".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = store()
            .with_failure("data/a.txt", InjectedFailure::Open)
            .with_failure("data/b.txt", InjectedFailure::MidStream);

        assert!(matches!(
            store.get_object("b", "data/a.txt").await,
            Err(ObjectStoreError::Network(_))
        ));

        let body: Result<Vec<Bytes>> = store
            .get_object("b", "data/b.txt")
            .await
            .unwrap()
            .try_collect()
            .await;
        assert!(matches!(body, Err(ObjectStoreError::Network(_))));

        assert!(matches!(
            store.get_object("b", "data/missing").await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }
}
