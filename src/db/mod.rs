// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync-state store: point lookup plus a guarded conditional update.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::InMemorySyncStore;

use crate::models::{ActivitySyncRecord, SyncState, SyncTransition, TransitionKind};
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    /// Sync-state rows (keyed by activity id)
    pub const ACTIVITIES: &str = "activities";
}

/// Store failures. Guard rejections are not errors; they report zero rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out")]
    Timeout,
}

/// Relational sync-state store.
///
/// `apply_transition` is the only mutation the sync pipeline performs. It must
/// behave as a single compare-and-swap against the row: the guard in
/// [`ActivitySyncRecord::apply`] is evaluated and the write made atomically,
/// and the number of rows changed (0 or 1) is returned.
pub trait SyncStateStore: Send + Sync + 'static {
    fn get_sync_record(
        &self,
        activity_id: &str,
    ) -> impl Future<Output = Result<Option<ActivitySyncRecord>, StoreError>> + Send;

    /// Create or replace a row. Used when the recording subsystem registers an
    /// activity; never called by the sync pipeline itself.
    fn put_sync_record(
        &self,
        record: &ActivitySyncRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn apply_transition(
        &self,
        transition: &SyncTransition,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Current state of the row owned by `profile_id`. A row owned by another
    /// profile reads as absent.
    fn get_sync_status(
        &self,
        activity_id: &str,
        profile_id: &str,
    ) -> impl Future<Output = Result<Option<SyncState>, StoreError>> + Send {
        async move {
            Ok(self
                .get_sync_record(activity_id)
                .await?
                .filter(|row| row.profile_id == profile_id)
                .map(|row| row.sync_status))
        }
    }

    /// Guarded `Synced` commit recording the artifact location.
    fn commit_synced(
        &self,
        activity_id: &str,
        profile_id: &str,
        fit_path: &str,
        at: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        let transition = SyncTransition {
            activity_id: activity_id.to_string(),
            profile_id: profile_id.to_string(),
            kind: TransitionKind::Commit {
                fit_path: fit_path.to_string(),
            },
            at: at.to_string(),
        };
        async move { self.apply_transition(&transition).await }
    }

    /// Guarded `SyncFailed` mark. Never overwrites `Synced`.
    fn mark_sync_failed(
        &self,
        activity_id: &str,
        profile_id: &str,
        at: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        let transition = SyncTransition {
            activity_id: activity_id.to_string(),
            profile_id: profile_id.to_string(),
            kind: TransitionKind::MarkFailed,
            at: at.to_string(),
        };
        async move { self.apply_transition(&transition).await }
    }
}
