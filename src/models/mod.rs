// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models: the sync request, the validated recording, and the sync-state row.

pub mod activity;
pub mod sync;

pub use activity::{
    ActivityData, ActivityRecordSet, DeviceIdentity, LifecycleEvent, LifecycleKind, Metrics,
    Position, SampleRecord, Sport, SyncRequest, VariabilityRecord,
};
pub use sync::{ActivitySyncRecord, SyncState, SyncTransition, TransitionKind};
