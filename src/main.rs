// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FIT-Sync API Server
//!
//! Accepts finalized activity recordings, encodes them as FIT files, stores
//! them in Cloud Storage and records the sync state in Firestore.

use fit_sync::{
    config::Config, db::FirestoreDb, services::SyncCoordinator, storage::GcsBlobStore, AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        bucket = %config.storage_bucket,
        duration_policy = ?config.duration_policy,
        "Starting FIT-Sync API"
    );

    // Initialize Firestore sync-state store
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    // Initialize Cloud Storage client
    let blobs = GcsBlobStore::new(&config.storage_bucket)?;
    tracing::info!(bucket = %config.storage_bucket, "Cloud Storage client initialized");

    // Build shared state
    let state = Arc::new(AppState {
        coordinator: SyncCoordinator::new(&config, db, blobs),
        config: config.clone(),
    });

    // Build router
    let app = fit_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fit_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
