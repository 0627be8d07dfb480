// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Structural and ownership validation of sync requests.
//!
//! Structural checks turn the JSON wire form into an [`ActivityRecordSet`]:
//! identifiers, parseable timestamps, `end > start`, and the declared
//! duration against the recording window. Ownership and idempotency are
//! decided from the current sync state in [`Validator::eligibility`].

use crate::config::{Config, DurationPolicy};
use crate::error::SyncError;
use crate::models::activity::{DeviceData, SampleData};
use crate::models::{
    ActivityRecordSet, DeviceIdentity, LifecycleEvent, Metrics, Position, SampleRecord, Sport,
    SyncRequest, SyncState, VariabilityRecord,
};
use crate::time_utils::{floor_to_second, parse_utc_rfc3339};
use chrono::{DateTime, Utc};
use validator::{Validate, ValidationErrors};

/// Result of the ownership/idempotency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Row owned by the caller in a state that may be committed.
    Eligible(SyncState),
    /// Already committed; nothing to do.
    AlreadySynced,
}

#[derive(Debug, Clone)]
pub struct Validator {
    duration_tolerance_secs: f64,
    duration_policy: DurationPolicy,
}

impl Validator {
    pub fn new(config: &Config) -> Self {
        Self::with_policy(config.duration_tolerance_secs, config.duration_policy)
    }

    pub fn with_policy(duration_tolerance_secs: f64, duration_policy: DurationPolicy) -> Self {
        Self {
            duration_tolerance_secs,
            duration_policy,
        }
    }

    /// Structural validation. Read-only.
    pub fn validate(&self, request: &SyncRequest) -> Result<ActivityRecordSet, SyncError> {
        request
            .validate()
            .map_err(|e| SyncError::InvalidPayload(describe(&e)))?;

        let data = request
            .activity_data
            .as_ref()
            .ok_or_else(|| SyncError::InvalidPayload("activityData is required".to_string()))?;

        let start = parse_timestamp("startTime", &data.start_time)?;
        let end = parse_timestamp("endTime", &data.end_time)?;
        // The artifact carries whole seconds, so the window must still be
        // non-empty once both ends are truncated.
        if floor_to_second(end) <= floor_to_second(start) {
            return Err(SyncError::InvalidPayload(format!(
                "endTime {} must be at least one whole second after startTime {}",
                data.end_time, data.start_time
            )));
        }

        let metrics = Metrics::from(&data.summary);
        self.check_duration(&metrics, start, end)?;

        let mut samples = data
            .records
            .iter()
            .enumerate()
            .map(|(i, s)| sample_from_wire(i, s))
            .collect::<Result<Vec<_>, _>>()?;

        // Strap readings recorded separately become heart-rate-only samples.
        for (i, hr) in data.heart_rate.iter().enumerate() {
            samples.push(SampleRecord {
                timestamp: parse_timestamp(&format!("heartRate[{i}].timestamp"), &hr.timestamp)?,
                heart_rate: Some(hr.bpm),
                ..Default::default()
            });
        }
        samples.sort_by_key(|s| s.timestamp);

        let mut events = data
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| {
                Ok(LifecycleEvent {
                    timestamp: parse_timestamp(&format!("events[{i}].timestamp"), &e.timestamp)?,
                    kind: e.kind,
                })
            })
            .collect::<Result<Vec<_>, SyncError>>()?;
        events.sort_by_key(|e| e.timestamp);

        let mut variability = data
            .variability
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Ok(VariabilityRecord {
                    timestamp: parse_timestamp(&format!("variability[{i}].timestamp"), &v.timestamp)?,
                    rr_intervals: v.rr_intervals.clone(),
                })
            })
            .collect::<Result<Vec<_>, SyncError>>()?;
        variability.sort_by_key(|v| v.timestamp);

        Ok(ActivityRecordSet {
            activity_id: request.activity_id.clone(),
            profile_id: request.profile_id.clone(),
            start,
            end,
            sport: data
                .sport
                .as_deref()
                .map(Sport::from_name)
                .unwrap_or_default(),
            device: data.device.as_ref().map(device_identity).unwrap_or_default(),
            samples,
            events,
            variability,
            metrics,
        })
    }

    /// Ownership and idempotency from the row state visible to the caller's
    /// profile (`None` when absent or owned by someone else).
    pub fn eligibility(status: Option<SyncState>) -> Result<Eligibility, SyncError> {
        match status {
            None => Err(SyncError::NotFoundOrForbidden),
            Some(SyncState::Synced) => Ok(Eligibility::AlreadySynced),
            Some(state) => Ok(Eligibility::Eligible(state)),
        }
    }

    fn check_duration(
        &self,
        metrics: &Metrics,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let Some(declared) = metrics.duration_secs else {
            return Ok(());
        };
        let actual = (end - start).num_milliseconds() as f64 / 1000.0;
        let delta = (declared - actual).abs();
        // NaN compares false, so a non-finite declared duration counts as a mismatch.
        if delta <= self.duration_tolerance_secs {
            return Ok(());
        }

        match self.duration_policy {
            DurationPolicy::Warn => {
                tracing::warn!(
                    declared_secs = declared,
                    actual_secs = actual,
                    tolerance_secs = self.duration_tolerance_secs,
                    "Declared duration does not match recording window"
                );
                Ok(())
            }
            DurationPolicy::Reject => Err(SyncError::InvalidPayload(format!(
                "summary duration {declared}s differs from recording window {actual}s"
            ))),
        }
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, SyncError> {
    parse_utc_rfc3339(value)
        .ok_or_else(|| SyncError::InvalidPayload(format!("{field} is not an RFC 3339 timestamp")))
}

fn sample_from_wire(index: usize, s: &SampleData) -> Result<SampleRecord, SyncError> {
    Ok(SampleRecord {
        timestamp: parse_timestamp(&format!("records[{index}].timestamp"), &s.timestamp)?,
        position: match (s.latitude, s.longitude) {
            (Some(latitude), Some(longitude)) => Some(Position {
                latitude,
                longitude,
            }),
            _ => None,
        },
        altitude: s.altitude,
        distance: s.distance,
        speed: s.speed,
        heart_rate: s.heart_rate,
        power: s.power,
        cadence: s.cadence,
        temperature: s.temperature,
    })
}

fn device_identity(d: &DeviceData) -> DeviceIdentity {
    DeviceIdentity {
        product: d.product,
        serial_number: d.serial_number,
        software_version: d.software_version,
    }
}

/// Flatten validator errors into `field: message` pairs.
fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{field}: {msg}"),
                None => format!("{field}: {}", e.code),
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
