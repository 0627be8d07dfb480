// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory blob store for tests and local runs.

use crate::storage::{BlobStore, StorageError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// DashMap-backed [`BlobStore`] with failure injection.
#[derive(Clone)]
pub struct InMemoryBlobStore {
    bucket: String,
    objects: Arc<DashMap<String, StoredObject>>,
    uploads: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    fail_uploads: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    upload_barrier: Option<Arc<Barrier>>,
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("local-bucket")
    }
}

impl InMemoryBlobStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Arc::new(DashMap::new()),
            uploads: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(AtomicUsize::new(0)),
            fail_uploads: Arc::new(AtomicBool::new(false)),
            fail_deletes: Arc::new(AtomicBool::new(false)),
            upload_barrier: None,
        }
    }

    /// Hold every upload until `parties` uploads are in flight. Lets tests
    /// line up concurrent invocations just before their commits.
    pub fn with_upload_barrier(mut self, parties: usize) -> Self {
        self.upload_barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|o| o.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

impl BlobStore for InMemoryBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if let Some(barrier) = &self.upload_barrier {
            barrier.wait().await;
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                status: 503,
                body: "injected upload failure".to_string(),
            });
        }
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.location(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Status {
                status: 503,
                body: "injected delete failure".to_string(),
            });
        }
        self.objects.remove(key);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_overwrites_and_delete_is_idempotent() {
        let store = InMemoryBlobStore::new("b");
        let loc = store.upload("a1.fit", vec![1, 2], "x").await.unwrap();
        assert_eq!(loc, "gs://b/a1.fit");
        store.upload("a1.fit", vec![3], "x").await.unwrap();
        assert_eq!(store.get("a1.fit").unwrap().bytes, vec![3]);

        store.delete("a1.fit").await.unwrap();
        store.delete("a1.fit").await.unwrap();
        assert!(!store.contains("a1.fit"));
        assert_eq!(store.delete_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryBlobStore::default();
        store.set_fail_uploads(true);
        assert!(store.upload("k", vec![], "x").await.is_err());
        assert!(!store.contains("k"));

        store.set_fail_deletes(true);
        assert!(store.delete("k").await.is_err());
    }
}
