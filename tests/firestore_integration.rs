// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST). The emulator provides a clean state for each run.

use fit_sync::config::Config;
use fit_sync::db::SyncStateStore;
use fit_sync::models::{ActivitySyncRecord, SyncRequest, SyncState};
use fit_sync::services::{SyncCoordinator, SyncOutcome};
use fit_sync::storage::InMemoryBlobStore;

mod common;
use common::{example_activity_data, sync_body, test_db};

/// Generate a unique activity ID for test isolation.
fn unique_activity_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

#[tokio::test]
async fn test_sync_record_round_trip() {
    require_emulator!();

    let db = test_db().await;
    let activity_id = unique_activity_id("roundtrip");

    assert!(db.get_sync_record(&activity_id).await.unwrap().is_none());

    let row = ActivitySyncRecord::local_only(&activity_id, "prof-1");
    db.put_sync_record(&row).await.unwrap();

    let fetched = db.get_sync_record(&activity_id).await.unwrap().unwrap();
    assert_eq!(fetched, row);
    assert_eq!(
        db.get_sync_status(&activity_id, "prof-1").await.unwrap(),
        Some(SyncState::LocalOnly)
    );
    assert_eq!(db.get_sync_status(&activity_id, "prof-2").await.unwrap(), None);
}

#[tokio::test]
async fn test_guarded_commit_applies_once() {
    require_emulator!();

    let db = test_db().await;
    let activity_id = unique_activity_id("guard");
    db.put_sync_record(&ActivitySyncRecord::local_only(&activity_id, "prof-1"))
        .await
        .unwrap();

    let path = format!("gs://test-bucket/{activity_id}.fit");
    let at = "2024-06-01T10:00:00Z";
    assert_eq!(
        db.commit_synced(&activity_id, "prof-1", &path, at).await.unwrap(),
        1
    );
    assert_eq!(
        db.commit_synced(&activity_id, "prof-1", &path, at).await.unwrap(),
        0
    );
    assert_eq!(db.mark_sync_failed(&activity_id, "prof-1", at).await.unwrap(), 0);

    let row = db.get_sync_record(&activity_id).await.unwrap().unwrap();
    assert_eq!(row.sync_status, SyncState::Synced);
    assert_eq!(row.fit_path.as_deref(), Some(path.as_str()));
    assert_eq!(row.synced_at.as_deref(), Some(at));
}

#[tokio::test]
async fn test_commit_for_other_profile_rejected() {
    require_emulator!();

    let db = test_db().await;
    let activity_id = unique_activity_id("owner");
    db.put_sync_record(&ActivitySyncRecord::local_only(&activity_id, "owner"))
        .await
        .unwrap();

    let rows = db
        .commit_synced(&activity_id, "intruder", "gs://b/x.fit", "2024-06-01T10:00:00Z")
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(
        db.get_sync_status(&activity_id, "owner").await.unwrap(),
        Some(SyncState::LocalOnly)
    );
}

#[tokio::test]
async fn test_concurrent_commits_single_winner() {
    require_emulator!();

    let db = test_db().await;
    let activity_id = unique_activity_id("race");
    db.put_sync_record(&ActivitySyncRecord::local_only(&activity_id, "prof-1"))
        .await
        .unwrap();

    let mut handles = vec![];
    for _ in 0..4 {
        let db = db.clone();
        let activity_id = activity_id.clone();
        handles.push(tokio::spawn(async move {
            db.commit_synced(&activity_id, "prof-1", "gs://b/race.fit", "2024-06-01T10:00:00Z")
                .await
        }));
    }

    let mut committed = 0;
    for result in futures_util::future::join_all(handles).await {
        // A transaction that exhausts its retries reports Unavailable; it never double-commits.
        if let Ok(rows) = result.unwrap() {
            committed += rows;
        }
    }
    assert_eq!(committed, 1);
}

#[tokio::test]
async fn test_full_sync_against_emulator() {
    require_emulator!();

    let db = test_db().await;
    let activity_id = unique_activity_id("saga");
    db.put_sync_record(&ActivitySyncRecord::local_only(&activity_id, "prof-1"))
        .await
        .unwrap();

    let coordinator = SyncCoordinator::new(
        &Config::test_default(),
        db.clone(),
        InMemoryBlobStore::new("test-bucket"),
    );
    let request: SyncRequest =
        serde_json::from_value(sync_body(&activity_id, "prof-1", example_activity_data())).unwrap();

    let outcome = coordinator.sync(request.clone()).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Synced(_)));

    let again = coordinator.sync(request).await.unwrap();
    assert!(matches!(again, SyncOutcome::AlreadySynced { .. }));

    let row = db.get_sync_record(&activity_id).await.unwrap().unwrap();
    assert_eq!(row.sync_status, SyncState::Synced);
}
