// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Blob storage for encoded artifacts.

pub mod gcs;
pub mod memory;

pub use gcs::GcsBlobStore;
pub use memory::InMemoryBlobStore;

use std::future::Future;

/// Storage failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),

    #[error("storage returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("storage credentials unavailable: {0}")]
    Auth(String),

    #[error("storage call timed out")]
    Timeout,
}

/// Durable object store.
pub trait BlobStore: Send + Sync + 'static {
    /// Store `bytes` under `key`, overwriting any previous object, and return
    /// the object's location.
    fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Remove `key`. A missing object is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Location string `upload` returns for `key`.
    fn location(&self, key: &str) -> String;
}

/// Deterministic object key for an activity's artifact.
pub fn storage_key(activity_id: &str) -> String {
    format!("{activity_id}.fit")
}
