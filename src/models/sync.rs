// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Sync-state model persisted in the relational store.

use serde::{Deserialize, Serialize};

/// Replication status of an activity's FIT artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    LocalOnly,
    Syncing,
    Synced,
    SyncFailed,
}

impl SyncState {
    /// States from which a commit to `Synced` is allowed.
    pub const PRE_COMMIT: [SyncState; 3] =
        [SyncState::LocalOnly, SyncState::Syncing, SyncState::SyncFailed];

    pub fn can_commit(self) -> bool {
        Self::PRE_COMMIT.contains(&self)
    }
}

/// Stored sync-state row (document id = activity id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySyncRecord {
    pub activity_id: String,
    /// Owning profile
    pub profile_id: String,
    pub sync_status: SyncState,
    /// Storage location of the committed artifact
    pub fit_path: Option<String>,
    /// When the artifact was committed (RFC 3339)
    pub synced_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ActivitySyncRecord {
    /// A freshly recorded activity that has never been uploaded.
    pub fn local_only(activity_id: &str, profile_id: &str) -> Self {
        Self {
            activity_id: activity_id.to_string(),
            profile_id: profile_id.to_string(),
            sync_status: SyncState::LocalOnly,
            fit_path: None,
            synced_at: None,
            updated_at: None,
        }
    }

    /// Apply a guarded transition. Returns `false`, leaving the row untouched,
    /// when the row belongs to another profile or is no longer eligible.
    pub fn apply(&mut self, transition: &SyncTransition) -> bool {
        if self.profile_id != transition.profile_id || !self.sync_status.can_commit() {
            return false;
        }
        match &transition.kind {
            TransitionKind::Commit { fit_path } => {
                self.sync_status = SyncState::Synced;
                self.fit_path = Some(fit_path.clone());
                self.synced_at = Some(transition.at.clone());
            }
            TransitionKind::MarkFailed => {
                self.sync_status = SyncState::SyncFailed;
            }
        }
        self.updated_at = Some(transition.at.clone());
        true
    }
}

/// A conditional update against one sync-state row.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTransition {
    pub activity_id: String,
    pub profile_id: String,
    pub kind: TransitionKind,
    /// RFC 3339 timestamp recorded on the row
    pub at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionKind {
    /// Record the artifact location and move to `Synced`.
    Commit { fit_path: String },
    /// Move to `SyncFailed`.
    MarkFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(profile: &str) -> SyncTransition {
        SyncTransition {
            activity_id: "a1".to_string(),
            profile_id: profile.to_string(),
            kind: TransitionKind::Commit {
                fit_path: "gs://bucket/a1.fit".to_string(),
            },
            at: "2024-06-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_commit_from_pre_commit_states() {
        for state in SyncState::PRE_COMMIT {
            let mut row = ActivitySyncRecord::local_only("a1", "p1");
            row.sync_status = state;
            assert!(row.apply(&commit("p1")));
            assert_eq!(row.sync_status, SyncState::Synced);
            assert_eq!(row.fit_path.as_deref(), Some("gs://bucket/a1.fit"));
        }
    }

    #[test]
    fn test_commit_from_synced_rejected() {
        let mut row = ActivitySyncRecord::local_only("a1", "p1");
        assert!(row.apply(&commit("p1")));
        let snapshot = row.clone();
        assert!(!row.apply(&commit("p1")));
        assert_eq!(row, snapshot);
    }

    #[test]
    fn test_mark_failed_never_overwrites_synced() {
        let mut row = ActivitySyncRecord::local_only("a1", "p1");
        row.sync_status = SyncState::Synced;
        let failed = SyncTransition {
            kind: TransitionKind::MarkFailed,
            ..commit("p1")
        };
        assert!(!row.apply(&failed));
        assert_eq!(row.sync_status, SyncState::Synced);
    }

    #[test]
    fn test_other_profile_rejected() {
        let mut row = ActivitySyncRecord::local_only("a1", "p1");
        assert!(!row.apply(&commit("p2")));
        assert_eq!(row.sync_status, SyncState::LocalOnly);
    }

    #[test]
    fn test_sync_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SyncState::SyncFailed).unwrap(),
            "\"sync_failed\""
        );
    }
}
