// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FIT-Sync: local-to-cloud activity synchronization.
//!
//! This crate encodes finalized activity recordings into FIT files, stores
//! them in blob storage, and commits the sync state with compensating
//! rollback when the commit fails after the upload succeeded.

pub mod config;
pub mod db;
pub mod error;
pub mod fit;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;
pub mod time_utils;

use config::Config;
use services::SyncCoordinator;

/// Shared application state.
pub struct AppState<S, B> {
    pub config: Config,
    pub coordinator: SyncCoordinator<S, B>,
}
