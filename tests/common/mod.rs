// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use fit_sync::config::Config;
use fit_sync::db::{FirestoreDb, InMemorySyncStore};
use fit_sync::routes::create_router;
use fit_sync::services::SyncCoordinator;
use fit_sync::storage::InMemoryBlobStore;
use fit_sync::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

#[allow(dead_code)]
pub type TestState = AppState<InMemorySyncStore, InMemoryBlobStore>;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app with in-memory stores.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<TestState>) {
    create_test_app_with(
        Config::test_default(),
        InMemorySyncStore::new(),
        InMemoryBlobStore::new("test-bucket"),
    )
}

#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    store: InMemorySyncStore,
    blobs: InMemoryBlobStore,
) -> (Router, Arc<TestState>) {
    let state = Arc::new(AppState {
        coordinator: SyncCoordinator::new(&config, store, blobs),
        config,
    });
    (create_router(state.clone()), state)
}

/// The 90-minute, three-sample recording: the middle sample carries only an
/// implausible heart rate.
#[allow(dead_code)]
pub fn example_activity_data() -> Value {
    json!({
        "startTime": "2024-06-01T08:00:00Z",
        "endTime": "2024-06-01T09:30:00Z",
        "sport": "running",
        "records": [
            {
                "timestamp": "2024-06-01T08:00:00Z",
                "latitude": 37.3861,
                "longitude": -122.0839,
                "altitude": 12.0,
                "distance": 0.0,
                "speed": 2.8,
                "heartRate": 110
            },
            {
                "timestamp": "2024-06-01T08:45:00Z",
                "heartRate": 400
            },
            {
                "timestamp": "2024-06-01T09:30:00Z",
                "latitude": 37.4020,
                "longitude": -122.0710,
                "altitude": 48.5,
                "distance": 15120.0,
                "speed": 3.1,
                "heartRate": 152
            }
        ],
        "events": [
            {"timestamp": "2024-06-01T08:00:00Z", "type": "start"},
            {"timestamp": "2024-06-01T09:30:00Z", "type": "stop"}
        ],
        "summary": {
            "duration": 5400,
            "distance": 15120.0,
            "avgSpeed": 2.8,
            "maxSpeed": 3.4,
            "avgHeartRate": 138,
            "maxHeartRate": 165,
            "calories": 980,
            "totalAscent": 61,
            "totalDescent": 25
        }
    })
}

#[allow(dead_code)]
pub fn sync_body(activity_id: &str, profile_id: &str, activity_data: Value) -> Value {
    json!({
        "activityId": activity_id,
        "profileId": profile_id,
        "activityData": activity_data
    })
}

/// POST a JSON body to the sync route and decode the JSON reply.
#[allow(dead_code)]
pub async fn post_sync(app: Router, body: &Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/sync-activity")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[allow(dead_code)]
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
