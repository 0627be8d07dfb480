// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Cloud Storage client over the JSON API.
//!
//! Credentials come from the instance metadata server and are cached until
//! shortly before expiry. When `STORAGE_EMULATOR_HOST` is set, requests go to
//! the emulator without credentials.

use crate::storage::{BlobStore, StorageError};
use anyhow::Context;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    MetadataServer,
    Anonymous,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// GCS-backed [`BlobStore`].
pub struct GcsBlobStore {
    http_client: reqwest::Client,
    base_url: String,
    bucket: String,
    auth: AuthMode,
    token_cache: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl GcsBlobStore {
    /// Production client, or an emulator client when `STORAGE_EMULATOR_HOST` is set.
    pub fn new(bucket: &str) -> anyhow::Result<Self> {
        match std::env::var("STORAGE_EMULATOR_HOST") {
            Ok(host) => {
                tracing::info!(host = %host, "Using unauthenticated connection for Storage Emulator");
                Self::with_base_url(bucket, &host, AuthMode::Anonymous)
            }
            Err(_) => Self::with_base_url(bucket, DEFAULT_BASE_URL, AuthMode::MetadataServer),
        }
    }

    /// Client against an arbitrary endpoint without credentials.
    pub fn anonymous(bucket: &str, base_url: &str) -> anyhow::Result<Self> {
        Self::with_base_url(bucket, base_url, AuthMode::Anonymous)
    }

    fn with_base_url(bucket: &str, base_url: &str, auth: AuthMode) -> anyhow::Result<Self> {
        if bucket.trim().is_empty() {
            anyhow::bail!("storage bucket must not be empty");
        }
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building storage HTTP client")?;

        Ok(Self {
            http_client,
            base_url: normalize_base_url(base_url),
            bucket: bucket.to_string(),
            auth,
            token_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(key)
        )
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StorageError> {
        match self.auth {
            AuthMode::Anonymous => Ok(request),
            AuthMode::MetadataServer => {
                let token = self.access_token().await?;
                Ok(request.header(AUTHORIZATION, format!("Bearer {token}")))
            }
        }
    }

    async fn access_token(&self) -> Result<String, StorageError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited.
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        tracing::debug!("Fetching storage access token from metadata server");
        let response = self
            .http_client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("metadata request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(StorageError::Auth(format!(
                "metadata server returned status {}",
                response.status()
            )));
        }

        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("invalid metadata token response: {e}")))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.token_cache.write().await = Some(CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(body.access_token)
    }

    async fn cached_token(&self) -> Option<String> {
        let cache = self.token_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.access_token.clone())
    }
}

impl BlobStore for GcsBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = bytes.len();
        let request = self
            .http_client
            .post(self.upload_url(key))
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(request_error)?;

        check_response(response).await?;

        tracing::debug!(bucket = %self.bucket, key, size, "Uploaded object");
        Ok(self.location(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let request = self.http_client.delete(self.object_url(key));
        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(bucket = %self.bucket, key, "Object already absent");
            return Ok(());
        }
        check_response(response).await
    }

    fn location(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket, key)
    }
}

fn request_error(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Timeout
    } else {
        StorageError::Request(e.to_string())
    }
}

async fn check_response(response: reqwest::Response) -> Result<(), StorageError> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status { status, body })
}

/// Accept `host:port` (as emulators usually advertise) or a full URL.
fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
