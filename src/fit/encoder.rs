// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deterministic `ActivityRecordSet` → FIT encoder.
//!
//! Message order is fixed: file_id, device_info, timer start event, records,
//! hrv, lap, session, activity, timer stop event. Value-level problems (implausible
//! sensor readings, samples outside the recording window) degrade by omission;
//! only structural problems fail the encode.

use crate::fit::messages::{
    event, event_type, Activity, DeviceInfo, Event, FileId, Hrv, Lap, Message, MessageWriter,
    Record, Session, Totals, FILE_TYPE_ACTIVITY, HRV_INVALID, HRV_SLOTS, MANUFACTURER_DEVELOPMENT,
};
use crate::fit::writer::ByteWriter;
use crate::fit::{
    altitude_to_fit, crc16, degrees_to_semicircles, distance_to_fit, fit_timestamp,
    seconds_to_fit, speed_to_fit, CONTENT_TYPE, HEADER_SIZE, PROFILE_VERSION, PROTOCOL_VERSION,
};
use crate::models::{ActivityRecordSet, LifecycleKind, SampleRecord, Sport};
use chrono::{DateTime, Utc};

/// Structural encode failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("{field} timestamp {at} is not representable as a FIT date_time")]
    Timestamp {
        field: &'static str,
        at: DateTime<Utc>,
    },

    #[error("summary value {field} = {value} is not representable")]
    Unrepresentable { field: &'static str, value: f64 },
}

/// Per-encode counters, reported by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Samples written as record messages.
    pub accepted: usize,
    /// Samples outside `[start, end]`.
    pub skipped_out_of_window: usize,
    /// Samples with no usable field left after validation.
    pub skipped_empty: usize,
    /// Individual sample fields and RR intervals dropped as implausible or
    /// unrepresentable.
    pub omitted_fields: usize,
    /// RR intervals written to hrv messages.
    pub rr_intervals: usize,
}

impl EncodeStats {
    pub fn skipped(&self) -> usize {
        self.skipped_out_of_window + self.skipped_empty
    }
}

/// Messages in emission order, plus counters.
#[derive(Debug, Clone)]
pub struct MessagePlan {
    pub messages: Vec<Message>,
    pub stats: EncodeStats,
}

/// Encoded FIT file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub stats: EncodeStats,
}

impl EncodedArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode a record set into a complete FIT file.
pub fn encode_activity(set: &ActivityRecordSet) -> Result<EncodedArtifact, EncodeError> {
    let plan = plan_messages(set)?;
    let bytes = serialize(&plan.messages)?;
    Ok(EncodedArtifact {
        bytes,
        content_type: CONTENT_TYPE,
        stats: plan.stats,
    })
}

/// Build the ordered message sequence without serializing it.
pub fn plan_messages(set: &ActivityRecordSet) -> Result<MessagePlan, EncodeError> {
    let start = timestamp("start", set.start)?;
    let end = timestamp("end", set.end)?;

    let timer_start = set
        .events
        .iter()
        .find(|e| e.kind == LifecycleKind::Start && set.contains(e.timestamp))
        .map_or(Ok(start), |e| timestamp("start event", e.timestamp))?;
    let timer_stop = set
        .events
        .iter()
        .rev()
        .find(|e| e.kind == LifecycleKind::Stop && set.contains(e.timestamp))
        .map_or(Ok(end), |e| timestamp("stop event", e.timestamp))?;

    let mut messages = Vec::with_capacity(set.samples.len() + 8);
    let mut stats = EncodeStats::default();

    messages.push(Message::FileId(FileId {
        file_type: Some(FILE_TYPE_ACTIVITY),
        manufacturer: Some(MANUFACTURER_DEVELOPMENT),
        product: set.device.product,
        serial_number: set.device.serial_number.filter(|&s| s != 0),
        time_created: Some(start),
    }));
    messages.push(Message::DeviceInfo(DeviceInfo {
        timestamp: Some(start),
        device_index: Some(0),
        manufacturer: Some(MANUFACTURER_DEVELOPMENT),
        serial_number: set.device.serial_number.filter(|&s| s != 0),
        product: set.device.product,
        software_version: set
            .device
            .software_version
            .and_then(|v| to_unsigned(v * 100.0, u16::MAX as f64 - 1.0))
            .map(|v| v as u16),
    }));
    messages.push(Message::Event(Event {
        timestamp: Some(timer_start),
        event: Some(event::TIMER),
        event_type: Some(event_type::START),
    }));

    let mut aggregates = SampleAggregates::default();
    for sample in &set.samples {
        if !set.contains(sample.timestamp) {
            stats.skipped_out_of_window += 1;
            continue;
        }
        let mut filter = FieldFilter::default();
        let record = record_from_sample(sample, &mut filter);
        stats.omitted_fields += filter.omitted;

        if !carries_data(&record) {
            stats.skipped_empty += 1;
            continue;
        }
        aggregates.add(&filter.kept);
        stats.accepted += 1;
        messages.push(Message::Record(record));
    }

    messages.extend(hrv_messages(set, &mut stats));

    let totals = build_totals(set, start, &aggregates)?;
    let timer_time = totals.total_timer_time;

    messages.push(Message::Lap(Lap {
        message_index: Some(0),
        timestamp: Some(end),
        event: Some(event::LAP),
        event_type: Some(event_type::STOP),
        totals: totals.clone(),
    }));
    messages.push(Message::Session(Session {
        message_index: Some(0),
        timestamp: Some(end),
        event: Some(event::SESSION),
        event_type: Some(event_type::STOP),
        sport: Some(sport_code(set.sport)),
        sub_sport: Some(0),
        first_lap_index: Some(0),
        num_laps: Some(1),
        totals,
    }));
    messages.push(Message::Activity(Activity {
        timestamp: Some(end),
        total_timer_time: timer_time,
        num_sessions: Some(1),
        activity_type: Some(0),
        event: Some(event::ACTIVITY),
        event_type: Some(event_type::STOP),
        local_timestamp: Some(end),
    }));
    messages.push(Message::Event(Event {
        timestamp: Some(timer_stop),
        event: Some(event::TIMER),
        event_type: Some(event_type::STOP_ALL),
    }));

    Ok(MessagePlan { messages, stats })
}

/// RR intervals from in-window batches, packed five to a message.
fn hrv_messages(set: &ActivityRecordSet, stats: &mut EncodeStats) -> Vec<Message> {
    let mut intervals = Vec::new();
    for batch in set.variability.iter().filter(|v| set.contains(v.timestamp)) {
        for &secs in &batch.rr_intervals {
            match rr_interval_to_fit(secs) {
                Some(ms) => intervals.push(ms),
                None => stats.omitted_fields += 1,
            }
        }
    }
    stats.rr_intervals = intervals.len();

    intervals
        .chunks(HRV_SLOTS)
        .map(|chunk| {
            let mut time = [HRV_INVALID; HRV_SLOTS];
            time[..chunk.len()].copy_from_slice(chunk);
            Message::Hrv(Hrv { time: Some(time) })
        })
        .collect()
}

/// Seconds → ms. Anything shorter than a 300 bpm beat is implausible.
fn rr_interval_to_fit(secs: f64) -> Option<u16> {
    let ms = (secs * 1000.0).round();
    (secs > 0.2 && ms < f64::from(HRV_INVALID)).then_some(ms as u16)
}

/// Header, messages, trailing CRC.
fn serialize(messages: &[Message]) -> Result<Vec<u8>, EncodeError> {
    let mut out = ByteWriter::with_capacity(256 + messages.len() * 32);
    out.write_u8(HEADER_SIZE);
    out.write_u8(PROTOCOL_VERSION);
    out.write_u16_le(PROFILE_VERSION);
    out.write_u32_le(0); // data size, patched below
    out.write_bytes(b".FIT");
    out.write_u16_le(0); // header CRC, patched below

    let mut writer = MessageWriter::new();
    for message in messages {
        writer.write(&mut out, message);
    }

    let data_size = out.len() - HEADER_SIZE as usize;
    let data_size = u32::try_from(data_size).map_err(|_| EncodeError::Unrepresentable {
        field: "data_size",
        value: data_size as f64,
    })?;
    out.patch_u32_le(4, data_size);
    let header_crc = crc16(&out.as_slice()[..12]);
    out.patch_u16_le(12, header_crc);

    let file_crc = crc16(out.as_slice());
    out.write_u16_le(file_crc);
    Ok(out.into_bytes())
}

fn timestamp(field: &'static str, at: DateTime<Utc>) -> Result<u32, EncodeError> {
    fit_timestamp(at).ok_or(EncodeError::Timestamp { field, at })
}

// ─── Sample validation ───────────────────────────────────────

/// Validated sample values in domain units, used for summary fallbacks.
#[derive(Debug, Default)]
struct KeptValues {
    distance: Option<f64>,
    speed: Option<f64>,
    heart_rate: Option<f64>,
    power: Option<f64>,
    cadence: Option<f64>,
}

/// Drops implausible or unrepresentable values and counts them.
#[derive(Debug, Default)]
struct FieldFilter {
    omitted: usize,
    kept: KeptValues,
}

impl FieldFilter {
    fn keep<T>(
        &mut self,
        value: Option<f64>,
        plausible: impl Fn(f64) -> bool,
        convert: impl Fn(f64) -> Option<T>,
    ) -> Option<T> {
        let value = value?;
        let converted = if value.is_finite() && plausible(value) {
            convert(value)
        } else {
            None
        };
        if converted.is_none() {
            self.omitted += 1;
        }
        converted
    }
}

fn record_from_sample(sample: &SampleRecord, filter: &mut FieldFilter) -> Record {
    let (position_lat, position_long) = match sample.position {
        Some(p) => {
            let lat = degrees_to_semicircles(p.latitude).filter(|_| (-90.0..=90.0).contains(&p.latitude));
            let long =
                degrees_to_semicircles(p.longitude).filter(|_| (-180.0..=180.0).contains(&p.longitude));
            match (lat, long) {
                (Some(lat), Some(long)) => (Some(lat), Some(long)),
                _ => {
                    filter.omitted += 1;
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    let altitude = filter.keep(sample.altitude, |_| true, altitude_to_fit);
    let distance = filter.keep(sample.distance, |m| m >= 0.0, distance_to_fit);
    let speed = filter.keep(sample.speed, |v| v >= 0.0, speed_to_fit);
    let heart_rate = filter.keep(sample.heart_rate, is_plausible_heart_rate, to_u8);
    let power = filter.keep(sample.power, is_plausible_power, to_u16);
    let cadence = filter.keep(sample.cadence, is_plausible_cadence, to_u8);
    let temperature = filter.keep(sample.temperature, |t| (-100.0..100.0).contains(&t), to_i8);

    filter.kept = KeptValues {
        distance: distance.and(sample.distance),
        speed: speed.and(sample.speed),
        heart_rate: heart_rate.and(sample.heart_rate),
        power: power.and(sample.power),
        cadence: cadence.and(sample.cadence),
    };

    Record {
        // Window membership was checked by the caller and the window bounds are
        // representable, so this cannot fail.
        timestamp: fit_timestamp(sample.timestamp),
        position_lat,
        position_long,
        altitude,
        heart_rate,
        cadence,
        distance,
        speed,
        power,
        temperature,
    }
}

fn carries_data(record: &Record) -> bool {
    record.position_lat.is_some()
        || record.altitude.is_some()
        || record.heart_rate.is_some()
        || record.cadence.is_some()
        || record.distance.is_some()
        || record.speed.is_some()
        || record.power.is_some()
        || record.temperature.is_some()
}

fn is_plausible_heart_rate(bpm: f64) -> bool {
    bpm > 0.0 && bpm < 300.0
}

fn is_plausible_power(watts: f64) -> bool {
    (0.0..3000.0).contains(&watts)
}

fn is_plausible_cadence(rpm: f64) -> bool {
    (0.0..300.0).contains(&rpm)
}

/// Round to a non-negative integer no larger than `max` (the invalid sentinel is excluded by the caller's `max`).
fn to_unsigned(value: f64, max: f64) -> Option<f64> {
    let rounded = value.round();
    (rounded.is_finite() && rounded >= 0.0 && rounded <= max).then_some(rounded)
}

fn to_u8(value: f64) -> Option<u8> {
    to_unsigned(value, u8::MAX as f64 - 1.0).map(|v| v as u8)
}

fn to_u16(value: f64) -> Option<u16> {
    to_unsigned(value, u16::MAX as f64 - 1.0).map(|v| v as u16)
}

fn to_i8(value: f64) -> Option<i8> {
    let rounded = value.round();
    (rounded >= i8::MIN as f64 && rounded <= i8::MAX as f64 - 1.0).then_some(rounded as i8)
}

// ─── Summary ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Series {
    sum: f64,
    count: usize,
    max: Option<f64>,
}

impl Series {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
            self.max = Some(self.max.map_or(v, |m| m.max(v)));
        }
    }

    fn avg(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct SampleAggregates {
    distance: Series,
    speed: Series,
    heart_rate: Series,
    power: Series,
    cadence: Series,
}

impl SampleAggregates {
    fn add(&mut self, kept: &KeptValues) {
        self.distance.add(kept.distance);
        self.speed.add(kept.speed);
        self.heart_rate.add(kept.heart_rate);
        self.power.add(kept.power);
        self.cadence.add(kept.cadence);
    }
}

fn build_totals(
    set: &ActivityRecordSet,
    start: u32,
    aggregates: &SampleAggregates,
) -> Result<Totals, EncodeError> {
    let m = &set.metrics;
    let elapsed = set.elapsed_secs();
    let active = active_secs(set);

    let total_distance = match m.distance_m.or(aggregates.distance.max) {
        Some(d) => Some(required(
            "total_distance",
            d,
            (d >= 0.0).then(|| distance_to_fit(d)).flatten(),
        )?),
        None => None,
    };
    let total_calories = optional_total("total_calories", m.calories)?;
    let total_ascent = optional_total("total_ascent", m.total_ascent)?;
    let total_descent = optional_total("total_descent", m.total_descent)?;

    let speed = |v: Option<f64>| v.filter(|s| *s >= 0.0).and_then(speed_to_fit);
    let hr = |v: Option<f64>| v.filter(|h| is_plausible_heart_rate(*h)).and_then(to_u8);
    let cadence = |v: Option<f64>| v.filter(|c| is_plausible_cadence(*c)).and_then(to_u8);
    let power = |v: Option<f64>| v.filter(|p| is_plausible_power(*p)).and_then(to_u16);

    Ok(Totals {
        start_time: Some(start),
        total_elapsed_time: Some(required(
            "total_elapsed_time",
            elapsed,
            seconds_to_fit(elapsed),
        )?),
        total_timer_time: Some(required("total_timer_time", active, seconds_to_fit(active))?),
        total_distance,
        total_calories,
        avg_speed: speed(m.avg_speed.or(aggregates.speed.avg())),
        max_speed: speed(m.max_speed.or(aggregates.speed.max)),
        avg_heart_rate: hr(m.avg_heart_rate.or(aggregates.heart_rate.avg())),
        max_heart_rate: hr(m.max_heart_rate.or(aggregates.heart_rate.max)),
        avg_cadence: cadence(m.avg_cadence.or(aggregates.cadence.avg())),
        max_cadence: cadence(m.max_cadence.or(aggregates.cadence.max)),
        avg_power: power(m.avg_power.or(aggregates.power.avg())),
        max_power: power(m.max_power.or(aggregates.power.max)),
        total_ascent,
        total_descent,
    })
}

fn required<T>(field: &'static str, value: f64, converted: Option<T>) -> Result<T, EncodeError> {
    converted.ok_or(EncodeError::Unrepresentable { field, value })
}

fn optional_total(field: &'static str, value: Option<f64>) -> Result<Option<u16>, EncodeError> {
    value
        .map(|v| required(field, v, to_u16(v)))
        .transpose()
}

/// Elapsed time minus paused spans. An unmatched pause runs until the next
/// stop event or the end of the recording.
fn active_secs(set: &ActivityRecordSet) -> f64 {
    let mut paused_ms: i64 = 0;
    let mut paused_at: Option<DateTime<Utc>> = None;

    for ev in set.events.iter().filter(|e| set.contains(e.timestamp)) {
        match ev.kind {
            LifecycleKind::Pause => {
                paused_at.get_or_insert(ev.timestamp);
            }
            LifecycleKind::Resume | LifecycleKind::Stop => {
                if let Some(at) = paused_at.take() {
                    paused_ms += (ev.timestamp - at).num_milliseconds().max(0);
                }
            }
            LifecycleKind::Start => {}
        }
    }
    if let Some(at) = paused_at {
        paused_ms += (set.end - at).num_milliseconds().max(0);
    }

    (set.elapsed_secs() - paused_ms as f64 / 1000.0).max(0.0)
}

fn sport_code(sport: Sport) -> u8 {
    match sport {
        Sport::Generic => 0,
        Sport::Running => 1,
        Sport::Cycling => 2,
        Sport::Swimming => 5,
        Sport::Walking => 11,
        Sport::Rowing => 15,
        Sport::Hiking => 17,
    }
}
