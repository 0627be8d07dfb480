// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What to do when the declared summary duration disagrees with `end - start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurationPolicy {
    /// Log the mismatch and continue.
    #[default]
    Warn,
    /// Reject the payload.
    Reject,
}

impl FromStr for DurationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(DurationPolicy::Warn),
            "reject" => Ok(DurationPolicy::Reject),
            _ => Err(ConfigError::Invalid("DURATION_MISMATCH_POLICY", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Bucket holding FIT artifacts
    pub storage_bucket: String,
    /// Server port
    pub port: u16,
    /// Allowed difference between declared and computed duration, in seconds
    pub duration_tolerance_secs: f64,
    pub duration_policy: DurationPolicy,
    /// Deadline for each storage or sync-state store call
    pub store_timeout: Duration,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
}

impl Config {
    /// Config for tests and local runs against in-memory stores.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            storage_bucket: "test-bucket".to_string(),
            port: 8080,
            duration_tolerance_secs: 60.0,
            duration_policy: DurationPolicy::Warn,
            store_timeout: Duration::from_secs(10),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let duration_policy = match env::var("DURATION_MISMATCH_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => DurationPolicy::default(),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            storage_bucket: env::var("STORAGE_BUCKET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STORAGE_BUCKET"))?,
            port: parse_or("PORT", 8080)?,
            duration_tolerance_secs: parse_or("DURATION_TOLERANCE_SECS", 60.0)?,
            duration_policy,
            store_timeout: Duration::from_secs(parse_or("STORE_TIMEOUT_SECS", 10)?),
            max_body_bytes: parse_or::<usize>("MAX_BODY_MB", 32)? * 1024 * 1024,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, v)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
