// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory sync-state store for tests and local runs.

use crate::db::{StoreError, SyncStateStore};
use crate::models::{ActivitySyncRecord, SyncTransition, TransitionKind};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// DashMap-backed store. Each transition runs under the entry's shard lock,
/// which makes the guard check and the write a single atomic step.
#[derive(Clone, Default)]
pub struct InMemorySyncStore {
    rows: Arc<DashMap<String, ActivitySyncRecord>>,
    fail_commits: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    transitions: Arc<AtomicUsize>,
    commit_delay_ms: Arc<AtomicU64>,
    delayed_commit_lands: Arc<AtomicBool>,
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `LocalOnly` row for `(activity_id, profile_id)`.
    pub fn register(&self, activity_id: &str, profile_id: &str) {
        self.rows.insert(
            activity_id.to_string(),
            ActivitySyncRecord::local_only(activity_id, profile_id),
        );
    }

    /// Snapshot of a row.
    pub fn record(&self, activity_id: &str) -> Option<ActivitySyncRecord> {
        self.rows.get(activity_id).map(|r| r.value().clone())
    }

    /// Make every subsequent transition fail with `Unavailable`.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent lookup fail with `Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Stall every subsequent `Synced` commit for `delay`. With `lands` set
    /// the write is applied before the stall, so a caller that gives up
    /// waiting still leaves the row committed.
    pub fn set_commit_delay(&self, delay: Duration, lands: bool) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.commit_delay_ms.store(millis, Ordering::SeqCst);
        self.delayed_commit_lands.store(lands, Ordering::SeqCst);
    }

    fn apply_now(&self, transition: &SyncTransition) -> u64 {
        match self.rows.get_mut(&transition.activity_id) {
            Some(mut row) => u64::from(row.apply(transition)),
            None => 0,
        }
    }

    /// Number of transitions attempted (successful or not).
    pub fn transition_count(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

impl SyncStateStore for InMemorySyncStore {
    async fn get_sync_record(
        &self,
        activity_id: &str,
    ) -> Result<Option<ActivitySyncRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(self.record(activity_id))
    }

    async fn put_sync_record(&self, record: &ActivitySyncRecord) -> Result<(), StoreError> {
        self.rows
            .insert(record.activity_id.clone(), record.clone());
        Ok(())
    }

    async fn apply_transition(&self, transition: &SyncTransition) -> Result<u64, StoreError> {
        self.transitions.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        let delay_ms = self.commit_delay_ms.load(Ordering::SeqCst);
        if delay_ms == 0 || !matches!(transition.kind, TransitionKind::Commit { .. }) {
            return Ok(self.apply_now(transition));
        }

        let delay = Duration::from_millis(delay_ms);
        if self.delayed_commit_lands.load(Ordering::SeqCst) {
            let rows = self.apply_now(transition);
            tokio::time::sleep(delay).await;
            Ok(rows)
        } else {
            tokio::time::sleep(delay).await;
            Ok(self.apply_now(transition))
        }
    }
}
