// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FIT binary interchange format.
//!
//! The scale/offset constants here are a compatibility contract with every
//! downstream FIT reader and must not change.

pub mod encoder;
pub mod messages;
pub mod writer;

pub use encoder::{
    encode_activity, plan_messages, EncodeError, EncodeStats, EncodedArtifact, MessagePlan,
};
pub use writer::ByteWriter;

use chrono::{DateTime, Utc};

/// MIME type of the persisted artifact.
pub const CONTENT_TYPE: &str = "application/vnd.ant.fit";

/// File header length (includes the header CRC).
pub const HEADER_SIZE: u8 = 14;
/// Protocol version 2.0.
pub const PROTOCOL_VERSION: u8 = 0x20;
/// Profile version 21.32.
pub const PROFILE_VERSION: u16 = 2132;

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;
/// `date_time` values below this are relative system times, not absolute.
pub const MIN_ABSOLUTE_TIMESTAMP: u32 = 0x1000_0000;

const SEMICIRCLES_PER_DEGREE: f64 = 2_147_483_648.0 / 180.0;
const ALTITUDE_OFFSET_M: f64 = 500.0;
const ALTITUDE_SCALE: f64 = 5.0;
const DISTANCE_SCALE: f64 = 100.0;
const SPEED_SCALE: f64 = 1000.0;

/// Convert a UTC timestamp to an absolute FIT `date_time`.
///
/// Returns `None` when the instant precedes the absolute range or does not
/// fit in the field (0xFFFFFFFF is the invalid sentinel).
pub fn fit_timestamp(at: DateTime<Utc>) -> Option<u32> {
    let secs = at.timestamp() - FIT_EPOCH_OFFSET;
    let value = u32::try_from(secs).ok()?;
    (MIN_ABSOLUTE_TIMESTAMP..u32::MAX)
        .contains(&value)
        .then_some(value)
}

/// Degrees to semicircles. `None` when the result does not fit a non-sentinel `sint32`.
pub fn degrees_to_semicircles(degrees: f64) -> Option<i32> {
    let scaled = (degrees * SEMICIRCLES_PER_DEGREE).round();
    to_integer(scaled, i32::MIN as f64, (i32::MAX - 1) as f64).map(|v| v as i32)
}

/// Altitude in meters to the offset, scaled `uint16` representation.
pub fn altitude_to_fit(meters: f64) -> Option<u16> {
    let scaled = ((meters + ALTITUDE_OFFSET_M) * ALTITUDE_SCALE).round();
    to_integer(scaled, 0.0, (u16::MAX - 1) as f64).map(|v| v as u16)
}

/// Distance in meters to centimeters.
pub fn distance_to_fit(meters: f64) -> Option<u32> {
    let scaled = (meters * DISTANCE_SCALE).round();
    to_integer(scaled, 0.0, (u32::MAX - 1) as f64).map(|v| v as u32)
}

/// Speed in m/s to mm/s.
pub fn speed_to_fit(meters_per_second: f64) -> Option<u16> {
    let scaled = (meters_per_second * SPEED_SCALE).round();
    to_integer(scaled, 0.0, (u16::MAX - 1) as f64).map(|v| v as u16)
}

/// Seconds to the millisecond-scaled `uint32` used by elapsed/timer fields.
pub fn seconds_to_fit(seconds: f64) -> Option<u32> {
    let scaled = (seconds * 1000.0).round();
    to_integer(scaled, 0.0, (u32::MAX - 1) as f64).map(|v| v as u32)
}

fn to_integer(value: f64, min: f64, max: f64) -> Option<f64> {
    (value.is_finite() && value >= min && value <= max).then_some(value)
}

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// FIT CRC-16, processed a nibble at a time.
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |crc, &byte| {
        let tmp = CRC_TABLE[(crc & 0xF) as usize];
        let crc = ((crc >> 4) & 0x0FFF) ^ tmp ^ CRC_TABLE[(byte & 0xF) as usize];
        let tmp = CRC_TABLE[(crc & 0xF) as usize];
        ((crc >> 4) & 0x0FFF) ^ tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize]
    })
}
