// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync saga: validate → encode → upload → guarded commit.
//!
//! The coordinator advances an explicit [`SagaStage`] and, on failure, looks
//! up the compensation for the furthest stage reached. Only an upload has an
//! external side effect that needs undoing; a failed commit deletes the
//! uploaded object unless the row already points at it.

use crate::config::Config;
use crate::db::{StoreError, SyncStateStore};
use crate::error::SyncError;
use crate::fit::encode_activity;
use crate::models::{SyncRequest, SyncState};
use crate::services::validator::{Eligibility, Validator};
use crate::storage::{storage_key, BlobStore, StorageError};
use crate::time_utils::format_utc_rfc3339;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Furthest point an invocation has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SagaStage {
    Start,
    Validated,
    Encoded,
    Uploaded,
    Committed,
    Failed,
}

/// Undo action for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    None,
    DeleteArtifact,
}

impl SagaStage {
    /// Compensation table: what must be undone when failing after this stage.
    pub fn compensation(self) -> Compensation {
        match self {
            SagaStage::Uploaded => Compensation::DeleteArtifact,
            SagaStage::Start
            | SagaStage::Validated
            | SagaStage::Encoded
            | SagaStage::Committed
            | SagaStage::Failed => Compensation::None,
        }
    }
}

/// Successful sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReceipt {
    pub activity_id: String,
    pub fit_path: String,
    pub fit_size: usize,
    pub record_count: usize,
    pub skipped_count: usize,
    /// Recording window length in whole seconds
    pub duration: i64,
    pub operation_id: Uuid,
}

/// Non-error outcomes of a sync invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Synced(SyncReceipt),
    AlreadySynced {
        activity_id: String,
        operation_id: Uuid,
    },
}

impl SyncOutcome {
    pub fn operation_id(&self) -> Uuid {
        match self {
            SyncOutcome::Synced(r) => r.operation_id,
            SyncOutcome::AlreadySynced { operation_id, .. } => *operation_id,
        }
    }
}

/// Progress of one invocation.
#[derive(Debug)]
struct Saga {
    stage: SagaStage,
    uploaded: Option<UploadedObject>,
}

#[derive(Debug, Clone)]
struct UploadedObject {
    activity_id: String,
    key: String,
    location: String,
}

impl Saga {
    fn new() -> Self {
        Self {
            stage: SagaStage::Start,
            uploaded: None,
        }
    }

    fn advance(&mut self, stage: SagaStage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "Saga stage");
        self.stage = stage;
    }
}

/// Orchestrates one sync invocation against a sync-state store and a blob store.
pub struct SyncCoordinator<S, B> {
    store: S,
    blobs: B,
    validator: Validator,
    timeout: Duration,
}

impl<S: SyncStateStore, B: BlobStore> SyncCoordinator<S, B> {
    pub fn new(config: &Config, store: S, blobs: B) -> Self {
        Self {
            store,
            blobs,
            validator: Validator::new(config),
            timeout: config.store_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Run the saga for one request. Every log line carries the operation id.
    pub async fn sync(&self, request: SyncRequest) -> Result<SyncOutcome, SyncError> {
        let operation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "sync_activity",
            %operation_id,
            activity_id = %request.activity_id,
            profile_id = %request.profile_id,
        );
        self.run(operation_id, &request).instrument(span).await
    }

    async fn run(
        &self,
        operation_id: Uuid,
        request: &SyncRequest,
    ) -> Result<SyncOutcome, SyncError> {
        let mut saga = Saga::new();
        match self.forward(&mut saga, operation_id, request).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let reached = saga.stage;
                saga.advance(SagaStage::Failed);
                let err = self.compensate(reached, saga.uploaded.as_ref(), err).await;
                if reached >= SagaStage::Validated {
                    self.mark_failed(request).await;
                }
                tracing::warn!(
                    stage = ?reached,
                    kind = err.kind(),
                    error = %err,
                    "Sync failed"
                );
                Err(err)
            }
        }
    }

    async fn forward(
        &self,
        saga: &mut Saga,
        operation_id: Uuid,
        request: &SyncRequest,
    ) -> Result<SyncOutcome, SyncError> {
        // Start → Validated
        let record_set = self.validator.validate(request)?;
        let status = self
            .bounded_store(
                self.store
                    .get_sync_status(&record_set.activity_id, &record_set.profile_id),
            )
            .await?;
        match Validator::eligibility(status)? {
            Eligibility::AlreadySynced => {
                tracing::info!("Activity already synced");
                saga.advance(SagaStage::Committed);
                return Ok(SyncOutcome::AlreadySynced {
                    activity_id: record_set.activity_id,
                    operation_id,
                });
            }
            Eligibility::Eligible(state) => {
                tracing::debug!(state = ?state, "Activity eligible for sync");
            }
        }
        saga.advance(SagaStage::Validated);

        // Validated → Encoded
        let artifact = encode_activity(&record_set)?;
        let fit_size = artifact.len();
        let stats = artifact.stats;
        tracing::info!(
            fit_size,
            accepted = stats.accepted,
            skipped_out_of_window = stats.skipped_out_of_window,
            skipped_empty = stats.skipped_empty,
            omitted_fields = stats.omitted_fields,
            rr_intervals = stats.rr_intervals,
            "Encoded FIT artifact"
        );
        saga.advance(SagaStage::Encoded);

        // Encoded → Uploaded
        let key = storage_key(&record_set.activity_id);
        let location = match tokio::time::timeout(
            self.timeout,
            self.blobs.upload(&key, artifact.bytes, artifact.content_type),
        )
        .await
        {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => return Err(SyncError::UploadFailure(e)),
            Err(_) => return Err(SyncError::UploadFailure(StorageError::Timeout)),
        };
        tracing::info!(key = %key, location = %location, "Uploaded FIT artifact");
        saga.uploaded = Some(UploadedObject {
            activity_id: record_set.activity_id.clone(),
            key,
            location: location.clone(),
        });
        saga.advance(SagaStage::Uploaded);

        // Uploaded → Committed
        let now = format_utc_rfc3339(chrono::Utc::now());
        let rows = self
            .bounded_store(self.store.commit_synced(
                &record_set.activity_id,
                &record_set.profile_id,
                &location,
                &now,
            ))
            .await?;
        if rows == 0 {
            return Err(SyncError::CommitConflict);
        }
        saga.advance(SagaStage::Committed);
        tracing::info!(fit_path = %location, "Activity synced");

        Ok(SyncOutcome::Synced(SyncReceipt {
            activity_id: record_set.activity_id.clone(),
            fit_path: location,
            fit_size,
            record_count: stats.accepted,
            skipped_count: stats.skipped(),
            duration: record_set.whole_seconds(),
            operation_id,
        }))
    }

    /// Apply the compensation for `reached`. Returns the error to surface.
    async fn compensate(
        &self,
        reached: SagaStage,
        uploaded: Option<&UploadedObject>,
        original: SyncError,
    ) -> SyncError {
        let (Compensation::DeleteArtifact, Some(object)) = (reached.compensation(), uploaded)
        else {
            return original;
        };

        if self.artifact_committed(object).await {
            tracing::info!(
                key = %object.key,
                "Committed row references the artifact; leaving it in place"
            );
            return original;
        }

        let deleted = match tokio::time::timeout(self.timeout, self.blobs.delete(&object.key)).await
        {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout),
        };
        match deleted {
            Ok(()) => {
                tracing::info!(key = %object.key, "Compensating delete succeeded");
                original
            }
            Err(delete_error) => {
                tracing::error!(
                    key = %object.key,
                    error = %delete_error,
                    original = %original,
                    "Compensating delete failed; artifact orphaned"
                );
                SyncError::CriticalOrphan {
                    key: object.key.clone(),
                    original: Box::new(original),
                    delete_error,
                }
            }
        }
    }

    /// Whether the row is `Synced` with this artifact's location, meaning a
    /// concurrent invocation (or an ambiguous commit of ours) owns the object.
    async fn artifact_committed(&self, object: &UploadedObject) -> bool {
        match self
            .bounded_store(self.store.get_sync_record(&object.activity_id))
            .await
        {
            Ok(Some(row)) => {
                row.sync_status == SyncState::Synced
                    && row.fit_path.as_deref() == Some(object.location.as_str())
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Could not re-read row before compensation");
                false
            }
        }
    }

    /// Best-effort guarded `SyncFailed` mark. Never overwrites `Synced`.
    async fn mark_failed(&self, request: &SyncRequest) {
        let now = format_utc_rfc3339(chrono::Utc::now());
        let result = self
            .bounded_store(self.store.mark_sync_failed(
                &request.activity_id,
                &request.profile_id,
                &now,
            ))
            .await;
        match result {
            Ok(rows) => tracing::debug!(rows, "Marked sync failed"),
            Err(e) => tracing::warn!(error = %e, "Could not mark sync failed"),
        }
    }

    async fn bounded_store<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}
