// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed sync-state store.
//!
//! Rows live in the `activities` collection keyed by activity id. Guarded
//! transitions run in a read-write transaction so the eligibility check and
//! the write commit together.

use crate::db::{collections, StoreError, SyncStateStore};
use crate::models::{ActivitySyncRecord, SyncTransition};
use firestore::errors::FirestoreError;

/// Transactions aborted by contention are retried this many times in total.
/// Each retry re-reads the row, so a concurrent winner turns the retry into a
/// zero-row guard rejection.
const MAX_TRANSACTION_ATTEMPTS: usize = 3;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Offline client; every operation fails with `Unavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or_else(|| {
            StoreError::Unavailable("Database not connected (offline mode)".to_string())
        })
    }

    /// One transaction attempt. The transaction is rolled back on every path
    /// that does not commit.
    async fn try_transition(&self, transition: &SyncTransition) -> Result<Attempt, StoreError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to begin transaction: {}", e)))?;

        // Reads through the transaction register the document for conflict detection.
        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );
        let read: Result<Option<ActivitySyncRecord>, FirestoreError> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(&transition.activity_id)
            .await;
        let current = match read {
            Ok(current) => current,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(StoreError::Unavailable(format!(
                    "Failed to read row in transaction: {}",
                    e
                )));
            }
        };

        let Some(mut row) = current else {
            let _ = transaction.rollback().await;
            return Ok(Attempt::Done(0));
        };
        if !row.apply(transition) {
            tracing::debug!(
                activity_id = %transition.activity_id,
                status = ?row.sync_status,
                "Guard rejected transition"
            );
            let _ = transaction.rollback().await;
            return Ok(Attempt::Done(0));
        }

        let staged = client
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&row.activity_id)
            .object(&row)
            .add_to_transaction(&mut transaction)
            .map(|_| ());
        if let Err(e) = staged {
            let _ = transaction.rollback().await;
            return Err(StoreError::Unavailable(format!(
                "Failed to add row to transaction: {}",
                e
            )));
        }

        match transaction.commit().await {
            Ok(_) => Ok(Attempt::Done(1)),
            Err(e) if is_contention(&e) => {
                tracing::warn!(
                    activity_id = %transition.activity_id,
                    error = %e,
                    "Transaction aborted by contention"
                );
                Ok(Attempt::Aborted(e.to_string()))
            }
            Err(e) => Err(StoreError::Unavailable(format!(
                "Transaction commit failed: {}",
                e
            ))),
        }
    }
}

/// Outcome of one transaction attempt.
enum Attempt {
    /// Rows changed (0 when the guard rejected the transition).
    Done(u64),
    /// Commit aborted by a concurrent writer; safe to retry.
    Aborted(String),
}

/// Aborted and other retryable commit failures. Permission, argument and
/// serialization errors are not retried.
fn is_contention(error: &FirestoreError) -> bool {
    match error {
        FirestoreError::DatabaseError(e) => e.retry_possible,
        FirestoreError::DataConflictError(_) => true,
        _ => false,
    }
}

impl SyncStateStore for FirestoreDb {
    async fn get_sync_record(
        &self,
        activity_id: &str,
    ) -> Result<Option<ActivitySyncRecord>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(activity_id)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn put_sync_record(&self, record: &ActivitySyncRecord) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&record.activity_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn apply_transition(&self, transition: &SyncTransition) -> Result<u64, StoreError> {
        let mut last_abort = String::new();
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            match self.try_transition(transition).await? {
                Attempt::Done(rows) => return Ok(rows),
                Attempt::Aborted(reason) => last_abort = reason,
            }
            tracing::debug!(
                activity_id = %transition.activity_id,
                attempt,
                "Retrying aborted transaction"
            );
        }
        Err(StoreError::Unavailable(format!(
            "Transaction for {} aborted {} times: {}",
            transition.activity_id, MAX_TRANSACTION_ATTEMPTS, last_abort
        )))
    }
}
