// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Saga behaviour: compensation, orphan reporting, timeouts and the
//! concurrent-commit race.

use axum::http::StatusCode;
use fit_sync::config::{Config, DurationPolicy};
use fit_sync::db::{InMemorySyncStore, StoreError, SyncStateStore};
use fit_sync::error::SyncError;
use fit_sync::models::{SyncRequest, SyncState};
use fit_sync::services::SyncOutcome;
use fit_sync::storage::{InMemoryBlobStore, StorageError};
use std::time::Duration;

mod common;
use common::{create_test_app, create_test_app_with, example_activity_data, post_sync, sync_body};

fn example_request(activity_id: &str, profile_id: &str) -> SyncRequest {
    serde_json::from_value(sync_body(activity_id, profile_id, example_activity_data())).unwrap()
}

#[tokio::test]
async fn test_commit_failure_compensates_upload() {
    let (app, state) = create_test_app();
    let store = state.coordinator.store();
    store.register("run-1", "prof-1");
    store.set_fail_commits(true);

    let (status, body) = post_sync(app, &sync_body("run-1", "prof-1", example_activity_data())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    let blobs = state.coordinator.blobs();
    assert_eq!(blobs.upload_count(), 1);
    assert_eq!(blobs.delete_count(), 1);
    assert!(!blobs.contains("run-1.fit"));
    assert_eq!(store.record("run-1").unwrap().sync_status, SyncState::LocalOnly);
}

#[tokio::test]
async fn test_failed_compensation_is_critical_orphan() {
    let (app, state) = create_test_app();
    state.coordinator.store().register("run-1", "prof-1");
    state.coordinator.store().set_fail_commits(true);
    state.coordinator.blobs().set_fail_deletes(true);

    let (status, body) = post_sync(app, &sync_body("run-1", "prof-1", example_activity_data())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("cleanup"));
    assert!(state.coordinator.blobs().contains("run-1.fit"));
}

#[tokio::test]
async fn test_critical_orphan_wraps_original_failure() {
    let (_app, state) = create_test_app();
    state.coordinator.store().register("run-1", "prof-1");
    state.coordinator.store().set_fail_commits(true);
    state.coordinator.blobs().set_fail_deletes(true);

    let err = state
        .coordinator
        .sync(example_request("run-1", "prof-1"))
        .await
        .unwrap_err();

    match err {
        SyncError::CriticalOrphan { key, original, .. } => {
            assert_eq!(key, "run-1.fit");
            assert!(matches!(*original, SyncError::Store(_)));
        }
        other => panic!("expected CriticalOrphan, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_failure_skips_commit_and_compensation() {
    let (app, state) = create_test_app();
    state.coordinator.store().register("run-1", "prof-1");
    state.coordinator.blobs().set_fail_uploads(true);

    let (status, _) = post_sync(app, &sync_body("run-1", "prof-1", example_activity_data())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(state.coordinator.blobs().delete_count(), 0);
    let row = state.coordinator.store().record("run-1").unwrap();
    assert_eq!(row.sync_status, SyncState::SyncFailed);
    assert!(row.fit_path.is_none());
}

#[tokio::test]
async fn test_failed_row_can_be_retried() {
    let (app, state) = create_test_app();
    state.coordinator.store().register("run-1", "prof-1");
    state.coordinator.blobs().set_fail_uploads(true);
    let body = sync_body("run-1", "prof-1", example_activity_data());

    let (first, _) = post_sync(app.clone(), &body).await;
    assert_eq!(first, StatusCode::BAD_GATEWAY);

    state.coordinator.blobs().set_fail_uploads(false);
    let (second, reply) = post_sync(app, &body).await;
    assert_eq!(second, StatusCode::OK);
    assert_eq!(reply["recordCount"], 2);
    assert_eq!(
        state.coordinator.store().record("run-1").unwrap().sync_status,
        SyncState::Synced
    );
}

#[tokio::test]
async fn test_upload_timeout_is_upload_failure() {
    let config = Config {
        store_timeout: Duration::from_millis(50),
        ..Config::test_default()
    };
    // A barrier for two parties never opens for a single request.
    let blobs = InMemoryBlobStore::new("test-bucket").with_upload_barrier(2);
    let store = InMemorySyncStore::new();
    store.register("run-1", "prof-1");
    let (_app, state) = create_test_app_with(config, store, blobs);

    let err = state
        .coordinator
        .sync(example_request("run-1", "prof-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::UploadFailure(StorageError::Timeout)));
    assert_eq!(state.coordinator.store().transition_count(), 1); // the SyncFailed mark only
}

#[tokio::test]
async fn test_concurrent_syncs_one_commit_one_conflict() {
    let blobs = InMemoryBlobStore::new("test-bucket").with_upload_barrier(2);
    let store = InMemorySyncStore::new();
    store.register("run-1", "prof-1");
    let (_app, state) = create_test_app_with(Config::test_default(), store, blobs);

    let (a, b) = tokio::join!(
        state.coordinator.sync(example_request("run-1", "prof-1")),
        state.coordinator.sync(example_request("run-1", "prof-1")),
    );

    let results = [a, b];
    let synced = results
        .iter()
        .filter(|r| matches!(r, Ok(SyncOutcome::Synced(_))))
        .count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(SyncError::CommitConflict)))
        .count();
    assert_eq!(synced, 1);
    assert_eq!(conflicts, 1);

    // The loser must not delete the object the winner committed.
    let blobs = state.coordinator.blobs();
    assert_eq!(blobs.upload_count(), 2);
    assert_eq!(blobs.delete_count(), 0);
    assert!(blobs.contains("run-1.fit"));

    let row = state.coordinator.store().record("run-1").unwrap();
    assert_eq!(row.sync_status, SyncState::Synced);
    assert_eq!(row.fit_path.as_deref(), Some("gs://test-bucket/run-1.fit"));
}

#[tokio::test]
async fn test_reject_policy_blocks_duration_mismatch() {
    let config = Config {
        duration_policy: DurationPolicy::Reject,
        ..Config::test_default()
    };
    let store = InMemorySyncStore::new();
    store.register("run-1", "prof-1");
    let (app, state) = create_test_app_with(config, store, InMemoryBlobStore::new("test-bucket"));

    let mut data = example_activity_data();
    data["summary"]["duration"] = serde_json::json!(3600);
    let (status, _) = post_sync(app, &sync_body("run-1", "prof-1", data)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.coordinator.blobs().upload_count(), 0);
}

#[tokio::test]
async fn test_warn_policy_allows_duration_mismatch() {
    let (app, state) = create_test_app();
    state.coordinator.store().register("run-1", "prof-1");

    let mut data = example_activity_data();
    data["summary"]["duration"] = serde_json::json!(3600);
    let (status, body) = post_sync(app, &sync_body("run-1", "prof-1", data)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duration"], 5400);
}

#[tokio::test]
async fn test_store_read_failure_is_unavailable() {
    let (_app, state) = create_test_app();
    state.coordinator.store().register("run-1", "prof-1");
    state.coordinator.store().set_fail_reads(true);

    let err = state
        .coordinator
        .sync(example_request("run-1", "prof-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(state.coordinator.blobs().upload_count(), 0);
    assert_eq!(state.coordinator.store().transition_count(), 0);
    // Reads recover once the fault clears.
    state.coordinator.store().set_fail_reads(false);
    assert_eq!(
        state
            .coordinator
            .store()
            .get_sync_status("run-1", "prof-1")
            .await
            .unwrap(),
        Some(SyncState::LocalOnly)
    );
}

fn slow_store_app(lands: bool) -> (axum::Router, std::sync::Arc<common::TestState>) {
    let config = Config {
        store_timeout: Duration::from_millis(50),
        ..Config::test_default()
    };
    let store = InMemorySyncStore::new();
    store.register("run-1", "prof-1");
    store.set_commit_delay(Duration::from_secs(5), lands);
    create_test_app_with(config, store, InMemoryBlobStore::new("test-bucket"))
}

#[tokio::test]
async fn test_commit_timeout_compensates_upload() {
    let (app, state) = slow_store_app(false);

    let (status, body) = post_sync(app, &sync_body("run-1", "prof-1", example_activity_data())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    let blobs = state.coordinator.blobs();
    assert_eq!(blobs.upload_count(), 1);
    assert_eq!(blobs.delete_count(), 1);
    assert!(!blobs.contains("run-1.fit"));
    assert_eq!(
        state.coordinator.store().record("run-1").unwrap().sync_status,
        SyncState::SyncFailed
    );
}

#[tokio::test]
async fn test_commit_timeout_after_landing_keeps_artifact() {
    let (_app, state) = slow_store_app(true);

    let err = state
        .coordinator
        .sync(example_request("run-1", "prof-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Store(StoreError::Timeout)));
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let blobs = state.coordinator.blobs();
    assert_eq!(blobs.delete_count(), 0);
    assert!(blobs.contains("run-1.fit"));

    let row = state.coordinator.store().record("run-1").unwrap();
    assert_eq!(row.sync_status, SyncState::Synced);
    assert_eq!(row.fit_path.as_deref(), Some("gs://test-bucket/run-1.fit"));
}
