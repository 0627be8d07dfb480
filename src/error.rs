// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync error taxonomy with consistent API responses.

use crate::db::StoreError;
use crate::fit::EncodeError;
use crate::storage::StorageError;
use crate::time_utils::format_utc_rfc3339;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Every way a sync invocation can fail.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Activity not found for this profile")]
    NotFoundOrForbidden,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("FIT encoding failed: {0}")]
    EncodingFailure(#[from] EncodeError),

    #[error("Upload failed: {0}")]
    UploadFailure(#[source] StorageError),

    #[error("Activity is no longer eligible for sync")]
    CommitConflict,

    #[error("Sync-state store error: {0}")]
    Store(#[from] StoreError),

    /// Compensation could not remove an uploaded object. `original` is the
    /// failure that triggered compensation.
    #[error("Object {key} could not be removed after failure ({original}): {delete_error}")]
    CriticalOrphan {
        key: String,
        original: Box<SyncError>,
        delete_error: StorageError,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            SyncError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
            SyncError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            SyncError::EncodingFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::UploadFailure(_) => StatusCode::BAD_GATEWAY,
            SyncError::CommitConflict => StatusCode::CONFLICT,
            SyncError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            SyncError::CriticalOrphan { .. } | SyncError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::InvalidPayload(_) => "invalid_payload",
            SyncError::NotFoundOrForbidden => "not_found_or_forbidden",
            SyncError::MethodNotAllowed => "method_not_allowed",
            SyncError::EncodingFailure(_) => "encoding_failure",
            SyncError::UploadFailure(_) => "upload_failure",
            SyncError::CommitConflict => "commit_conflict",
            SyncError::Store(_) => "store_error",
            SyncError::CriticalOrphan { .. } => "critical_orphan",
            SyncError::Internal(_) => "internal_error",
        }
    }

    /// Message returned to the client. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            SyncError::Internal(_) => "Internal server error".to_string(),
            SyncError::CriticalOrphan { original, .. } => {
                format!("Sync failed and cleanup did not complete: {original}")
            }
            other => other.to_string(),
        }
    }
}

/// JSON failure body.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    timestamp: String,
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Sync request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "Sync request rejected");
        }

        let body = ErrorResponse {
            success: false,
            error: self.public_message(),
            timestamp: format_utc_rfc3339(chrono::Utc::now()),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, SyncError>;
