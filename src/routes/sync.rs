// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync entry point.

use crate::db::SyncStateStore;
use crate::error::SyncError;
use crate::models::SyncRequest;
use crate::services::{SyncOutcome, SyncReceipt};
use crate::storage::BlobStore;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const SYNC_PATH: &str = "/api/sync-activity";

/// Sync routes. Only POST is accepted; other methods get the JSON failure body.
pub fn routes<S: SyncStateStore, B: BlobStore>() -> Router<Arc<AppState<S, B>>> {
    Router::new().route(
        SYNC_PATH,
        post(sync_activity::<S, B>).fallback(method_not_allowed),
    )
}

#[derive(Serialize)]
struct SyncedResponse {
    success: bool,
    #[serde(flatten)]
    receipt: SyncReceipt,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlreadySyncedResponse {
    success: bool,
    already_synced: bool,
    activity_id: String,
    operation_id: Uuid,
}

/// POST /api/sync-activity
async fn sync_activity<S: SyncStateStore, B: BlobStore>(
    State(state): State<Arc<AppState<S, B>>>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Response, SyncError> {
    let Json(request) = payload.map_err(|rejection| {
        SyncError::InvalidPayload(format!("Malformed request body: {}", rejection.body_text()))
    })?;

    let response = match state.coordinator.sync(request).await? {
        SyncOutcome::Synced(receipt) => Json(SyncedResponse {
            success: true,
            receipt,
        })
        .into_response(),
        SyncOutcome::AlreadySynced {
            activity_id,
            operation_id,
        } => Json(AlreadySyncedResponse {
            success: true,
            already_synced: true,
            activity_id,
            operation_id,
        })
        .into_response(),
    };
    Ok(response)
}

async fn method_not_allowed() -> Response {
    let mut response = SyncError::MethodNotAllowed.into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("POST"));
    response
}
