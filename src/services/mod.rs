// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod coordinator;
pub mod validator;

pub use coordinator::{SagaStage, SyncCoordinator, SyncOutcome, SyncReceipt};
pub use validator::{Eligibility, Validator};
