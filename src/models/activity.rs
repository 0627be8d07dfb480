// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity recording models: the JSON wire form and the validated domain form.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationError};

// ─── Wire form ───────────────────────────────────────────────

/// Body of a sync request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 128, message = "activityId is required"),
        custom(function = "validate_identifier")
    )]
    pub activity_id: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = 128, message = "profileId is required"),
        custom(function = "validate_identifier")
    )]
    pub profile_id: String,
    pub activity_data: Option<ActivityData>,
}

/// Identifiers end up in object keys, so only `[A-Za-z0-9_-]` is accepted.
fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("identifier_charset");
        err.message = Some("may only contain letters, digits, '_' and '-'".into());
        Err(err)
    }
}

/// Recording as produced by the client. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityData {
    pub start_time: String,
    pub end_time: String,
    pub sport: Option<String>,
    pub device: Option<DeviceData>,
    #[serde(default)]
    pub records: Vec<SampleData>,
    #[serde(default)]
    pub events: Vec<EventData>,
    /// Standalone heart-rate readings from a strap recorded separately.
    #[serde(default)]
    pub heart_rate: Vec<HeartRateData>,
    /// Beat-to-beat interval batches.
    #[serde(default)]
    pub variability: Vec<VariabilityData>,
    #[serde(default)]
    pub summary: SummaryData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleData {
    pub timestamp: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub distance: Option<f64>,
    pub speed: Option<f64>,
    pub heart_rate: Option<f64>,
    pub power: Option<f64>,
    pub cadence: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: LifecycleKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateData {
    pub timestamp: String,
    pub bpm: f64,
}

/// RR intervals in seconds, as reported by the strap at `timestamp`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariabilityData {
    pub timestamp: String,
    #[serde(default)]
    pub rr_intervals: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    pub product: Option<u16>,
    pub serial_number: Option<u32>,
    pub software_version: Option<f64>,
}

/// Summary block. Durations in seconds, distances in meters, speeds in m/s.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryData {
    pub duration: Option<f64>,
    pub distance: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    pub avg_cadence: Option<f64>,
    pub max_cadence: Option<f64>,
    pub calories: Option<f64>,
    pub total_ascent: Option<f64>,
    pub total_descent: Option<f64>,
}

// ─── Domain form ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Start,
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: LifecycleKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// One time-stamped sample. Every measurement is independently optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleRecord {
    pub timestamp: DateTime<Utc>,
    pub position: Option<Position>,
    pub altitude: Option<f64>,
    pub distance: Option<f64>,
    pub speed: Option<f64>,
    pub heart_rate: Option<f64>,
    pub power: Option<f64>,
    pub cadence: Option<f64>,
    pub temperature: Option<f64>,
}

/// Declared summary metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub duration_secs: Option<f64>,
    pub distance_m: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    pub avg_cadence: Option<f64>,
    pub max_cadence: Option<f64>,
    pub calories: Option<f64>,
    pub total_ascent: Option<f64>,
    pub total_descent: Option<f64>,
}

impl From<&SummaryData> for Metrics {
    fn from(s: &SummaryData) -> Self {
        Self {
            duration_secs: s.duration,
            distance_m: s.distance,
            avg_speed: s.avg_speed,
            max_speed: s.max_speed,
            avg_heart_rate: s.avg_heart_rate,
            max_heart_rate: s.max_heart_rate,
            avg_power: s.avg_power,
            max_power: s.max_power,
            avg_cadence: s.avg_cadence,
            max_cadence: s.max_cadence,
            calories: s.calories,
            total_ascent: s.total_ascent,
            total_descent: s.total_descent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sport {
    #[default]
    Generic,
    Running,
    Cycling,
    Swimming,
    Walking,
    Rowing,
    Hiking,
}

impl Sport {
    /// Lenient parse of client sport names; unknown names map to `Generic`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "run" | "running" | "trail_run" | "trailrun" => Sport::Running,
            "ride" | "cycling" | "bike" | "biking" => Sport::Cycling,
            "swim" | "swimming" => Sport::Swimming,
            "walk" | "walking" => Sport::Walking,
            "row" | "rowing" => Sport::Rowing,
            "hike" | "hiking" => Sport::Hiking,
            _ => Sport::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviceIdentity {
    pub product: Option<u16>,
    pub serial_number: Option<u32>,
    pub software_version: Option<f64>,
}

/// A batch of RR intervals (seconds), unvalidated until encode time.
#[derive(Debug, Clone, PartialEq)]
pub struct VariabilityRecord {
    pub timestamp: DateTime<Utc>,
    pub rr_intervals: Vec<f64>,
}

/// A finalized, validated recording. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecordSet {
    pub activity_id: String,
    pub profile_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sport: Sport,
    pub device: DeviceIdentity,
    pub samples: Vec<SampleRecord>,
    pub events: Vec<LifecycleEvent>,
    pub variability: Vec<VariabilityRecord>,
    pub metrics: Metrics,
}

impl ActivityRecordSet {
    /// Span between the whole-second FIT timestamps of start and end.
    pub fn elapsed_secs(&self) -> f64 {
        self.whole_seconds() as f64
    }

    pub fn whole_seconds(&self) -> i64 {
        self.end.timestamp() - self.start.timestamp()
    }

    /// Whether `at` lies inside the recording window (inclusive). Compares
    /// full-precision instants; truncation happens only at encode time.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}
