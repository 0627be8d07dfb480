// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed FIT messages.
//!
//! Every message kind the encoder emits is a variant of [`Message`] with its own
//! struct of typed, optional fields. The field tables map each populated field
//! to its profile field number and base type, so a message can only carry
//! values of the type the profile declares.

use crate::fit::writer::ByteWriter;

/// FIT base types used by the emitted messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BaseType {
    Enum = 0x00,
    SInt8 = 0x01,
    UInt8 = 0x02,
    UInt16 = 0x84,
    SInt32 = 0x85,
    UInt32 = 0x86,
    UInt32z = 0x8C,
}

impl BaseType {
    /// Encoded size in bytes.
    pub fn size(self) -> u8 {
        match self {
            BaseType::Enum | BaseType::SInt8 | BaseType::UInt8 => 1,
            BaseType::UInt16 => 2,
            BaseType::SInt32 | BaseType::UInt32 | BaseType::UInt32z => 4,
        }
    }
}

/// Slots in an `hrv.time` array. Unused slots hold the uint16 invalid value.
pub const HRV_SLOTS: usize = 5;
pub const HRV_INVALID: u16 = u16::MAX;

/// A single populated field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Enum(u8),
    SInt8(i8),
    UInt8(u8),
    UInt16(u16),
    SInt32(i32),
    UInt32(u32),
    UInt32z(u32),
    UInt16Array([u16; HRV_SLOTS]),
}

impl FieldValue {
    pub fn base_type(&self) -> BaseType {
        match self {
            FieldValue::Enum(_) => BaseType::Enum,
            FieldValue::SInt8(_) => BaseType::SInt8,
            FieldValue::UInt8(_) => BaseType::UInt8,
            FieldValue::UInt16(_) => BaseType::UInt16,
            FieldValue::SInt32(_) => BaseType::SInt32,
            FieldValue::UInt32(_) => BaseType::UInt32,
            FieldValue::UInt32z(_) => BaseType::UInt32z,
            FieldValue::UInt16Array(_) => BaseType::UInt16,
        }
    }

    /// Encoded size in bytes, counting every array element.
    pub fn size(&self) -> u8 {
        match self {
            FieldValue::UInt16Array(values) => self.base_type().size() * values.len() as u8,
            _ => self.base_type().size(),
        }
    }

    pub fn write(&self, out: &mut ByteWriter) {
        match *self {
            FieldValue::Enum(v) | FieldValue::UInt8(v) => out.write_u8(v),
            FieldValue::SInt8(v) => out.write_i8(v),
            FieldValue::UInt16(v) => out.write_u16_le(v),
            FieldValue::SInt32(v) => out.write_i32_le(v),
            FieldValue::UInt32(v) | FieldValue::UInt32z(v) => out.write_u32_le(v),
            FieldValue::UInt16Array(values) => {
                for v in values {
                    out.write_u16_le(v);
                }
            }
        }
    }
}

/// One entry of a message's field table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub number: u8,
    pub value: FieldValue,
}

/// Collects populated fields; `None` values are skipped (sparse encoding).
#[derive(Default)]
struct FieldTable(Vec<Field>);

impl FieldTable {
    fn put<T>(&mut self, number: u8, value: Option<T>, wrap: fn(T) -> FieldValue) -> &mut Self {
        if let Some(value) = value {
            self.0.push(Field {
                number,
                value: wrap(value),
            });
        }
        self
    }

    fn finish(&mut self) -> Vec<Field> {
        std::mem::take(&mut self.0)
    }
}

// ─── Profile constants ───────────────────────────────────────

pub mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const DEVICE_INFO: u16 = 23;
    pub const ACTIVITY: u16 = 34;
    pub const HRV: u16 = 78;
}

const TIMESTAMP: u8 = 253;
const MESSAGE_INDEX: u8 = 254;

/// `file` enum: activity.
pub const FILE_TYPE_ACTIVITY: u8 = 4;
/// `manufacturer` enum: development.
pub const MANUFACTURER_DEVELOPMENT: u16 = 255;

/// `event` enum values used here.
pub mod event {
    pub const TIMER: u8 = 0;
    pub const SESSION: u8 = 8;
    pub const LAP: u8 = 9;
    pub const ACTIVITY: u8 = 26;
}

/// `event_type` enum values used here.
pub mod event_type {
    pub const START: u8 = 0;
    pub const STOP: u8 = 1;
    pub const STOP_ALL: u8 = 4;
}

// ─── Messages ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileId {
    pub file_type: Option<u8>,
    pub manufacturer: Option<u16>,
    pub product: Option<u16>,
    pub serial_number: Option<u32>,
    pub time_created: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub timestamp: Option<u32>,
    pub device_index: Option<u8>,
    pub manufacturer: Option<u16>,
    pub serial_number: Option<u32>,
    pub product: Option<u16>,
    /// Scaled by 100.
    pub software_version: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub timestamp: Option<u32>,
    pub event: Option<u8>,
    pub event_type: Option<u8>,
}

/// A data record. Values are already in FIT units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub timestamp: Option<u32>,
    pub position_lat: Option<i32>,
    pub position_long: Option<i32>,
    pub altitude: Option<u16>,
    pub heart_rate: Option<u8>,
    pub cadence: Option<u8>,
    pub distance: Option<u32>,
    pub speed: Option<u16>,
    pub power: Option<u16>,
    pub temperature: Option<i8>,
}

/// Totals shared by lap and session messages. Values are in FIT units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub start_time: Option<u32>,
    pub total_elapsed_time: Option<u32>,
    pub total_timer_time: Option<u32>,
    pub total_distance: Option<u32>,
    pub total_calories: Option<u16>,
    pub avg_speed: Option<u16>,
    pub max_speed: Option<u16>,
    pub avg_heart_rate: Option<u8>,
    pub max_heart_rate: Option<u8>,
    pub avg_cadence: Option<u8>,
    pub max_cadence: Option<u8>,
    pub avg_power: Option<u16>,
    pub max_power: Option<u16>,
    pub total_ascent: Option<u16>,
    pub total_descent: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lap {
    pub message_index: Option<u16>,
    pub timestamp: Option<u32>,
    pub event: Option<u8>,
    pub event_type: Option<u8>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub message_index: Option<u16>,
    pub timestamp: Option<u32>,
    pub event: Option<u8>,
    pub event_type: Option<u8>,
    pub sport: Option<u8>,
    pub sub_sport: Option<u8>,
    pub first_lap_index: Option<u16>,
    pub num_laps: Option<u16>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub timestamp: Option<u32>,
    pub total_timer_time: Option<u32>,
    pub num_sessions: Option<u16>,
    pub activity_type: Option<u8>,
    pub event: Option<u8>,
    pub event_type: Option<u8>,
    pub local_timestamp: Option<u32>,
}

/// RR intervals, in milliseconds (seconds scaled by 1000).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hrv {
    pub time: Option<[u16; HRV_SLOTS]>,
}

/// Every message kind the encoder can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    FileId(FileId),
    DeviceInfo(DeviceInfo),
    Event(Event),
    Record(Record),
    Lap(Lap),
    Session(Session),
    Activity(Activity),
    Hrv(Hrv),
}

impl Message {
    /// Global message number from the FIT profile.
    pub fn global_number(&self) -> u16 {
        match self {
            Message::FileId(_) => mesg_num::FILE_ID,
            Message::DeviceInfo(_) => mesg_num::DEVICE_INFO,
            Message::Event(_) => mesg_num::EVENT,
            Message::Record(_) => mesg_num::RECORD,
            Message::Lap(_) => mesg_num::LAP,
            Message::Session(_) => mesg_num::SESSION,
            Message::Activity(_) => mesg_num::ACTIVITY,
            Message::Hrv(_) => mesg_num::HRV,
        }
    }

    /// Local message type. Each kind owns one slot so interleaving never
    /// invalidates another kind's definition.
    pub fn local_type(&self) -> u8 {
        match self {
            Message::FileId(_) => 0,
            Message::DeviceInfo(_) => 1,
            Message::Event(_) => 2,
            Message::Record(_) => 3,
            Message::Lap(_) => 4,
            Message::Session(_) => 5,
            Message::Activity(_) => 6,
            Message::Hrv(_) => 7,
        }
    }

    /// Populated fields in profile order.
    pub fn fields(&self) -> Vec<Field> {
        let mut t = FieldTable::default();
        match self {
            Message::FileId(m) => t
                .put(0, m.file_type, FieldValue::Enum)
                .put(1, m.manufacturer, FieldValue::UInt16)
                .put(2, m.product, FieldValue::UInt16)
                .put(3, m.serial_number, FieldValue::UInt32z)
                .put(4, m.time_created, FieldValue::UInt32)
                .finish(),
            Message::DeviceInfo(m) => t
                .put(TIMESTAMP, m.timestamp, FieldValue::UInt32)
                .put(0, m.device_index, FieldValue::UInt8)
                .put(2, m.manufacturer, FieldValue::UInt16)
                .put(3, m.serial_number, FieldValue::UInt32z)
                .put(4, m.product, FieldValue::UInt16)
                .put(5, m.software_version, FieldValue::UInt16)
                .finish(),
            Message::Event(m) => t
                .put(TIMESTAMP, m.timestamp, FieldValue::UInt32)
                .put(0, m.event, FieldValue::Enum)
                .put(1, m.event_type, FieldValue::Enum)
                .finish(),
            Message::Record(m) => t
                .put(TIMESTAMP, m.timestamp, FieldValue::UInt32)
                .put(0, m.position_lat, FieldValue::SInt32)
                .put(1, m.position_long, FieldValue::SInt32)
                .put(2, m.altitude, FieldValue::UInt16)
                .put(3, m.heart_rate, FieldValue::UInt8)
                .put(4, m.cadence, FieldValue::UInt8)
                .put(5, m.distance, FieldValue::UInt32)
                .put(6, m.speed, FieldValue::UInt16)
                .put(7, m.power, FieldValue::UInt16)
                .put(13, m.temperature, FieldValue::SInt8)
                .finish(),
            Message::Lap(m) => {
                t.put(MESSAGE_INDEX, m.message_index, FieldValue::UInt16)
                    .put(TIMESTAMP, m.timestamp, FieldValue::UInt32)
                    .put(0, m.event, FieldValue::Enum)
                    .put(1, m.event_type, FieldValue::Enum)
                    .put(2, m.totals.start_time, FieldValue::UInt32)
                    .put(7, m.totals.total_elapsed_time, FieldValue::UInt32)
                    .put(8, m.totals.total_timer_time, FieldValue::UInt32)
                    .put(9, m.totals.total_distance, FieldValue::UInt32)
                    .put(11, m.totals.total_calories, FieldValue::UInt16)
                    .put(13, m.totals.avg_speed, FieldValue::UInt16)
                    .put(14, m.totals.max_speed, FieldValue::UInt16)
                    .put(15, m.totals.avg_heart_rate, FieldValue::UInt8)
                    .put(16, m.totals.max_heart_rate, FieldValue::UInt8)
                    .put(17, m.totals.avg_cadence, FieldValue::UInt8)
                    .put(18, m.totals.max_cadence, FieldValue::UInt8)
                    .put(19, m.totals.avg_power, FieldValue::UInt16)
                    .put(20, m.totals.max_power, FieldValue::UInt16)
                    .put(21, m.totals.total_ascent, FieldValue::UInt16)
                    .put(22, m.totals.total_descent, FieldValue::UInt16);
                t.finish()
            }
            Message::Session(m) => {
                // Session numbers the speed fields one higher than lap does.
                t.put(MESSAGE_INDEX, m.message_index, FieldValue::UInt16)
                    .put(TIMESTAMP, m.timestamp, FieldValue::UInt32)
                    .put(0, m.event, FieldValue::Enum)
                    .put(1, m.event_type, FieldValue::Enum)
                    .put(2, m.totals.start_time, FieldValue::UInt32)
                    .put(5, m.sport, FieldValue::Enum)
                    .put(6, m.sub_sport, FieldValue::Enum)
                    .put(7, m.totals.total_elapsed_time, FieldValue::UInt32)
                    .put(8, m.totals.total_timer_time, FieldValue::UInt32)
                    .put(9, m.totals.total_distance, FieldValue::UInt32)
                    .put(11, m.totals.total_calories, FieldValue::UInt16)
                    .put(14, m.totals.avg_speed, FieldValue::UInt16)
                    .put(15, m.totals.max_speed, FieldValue::UInt16)
                    .put(16, m.totals.avg_heart_rate, FieldValue::UInt8)
                    .put(17, m.totals.max_heart_rate, FieldValue::UInt8)
                    .put(18, m.totals.avg_cadence, FieldValue::UInt8)
                    .put(19, m.totals.max_cadence, FieldValue::UInt8)
                    .put(20, m.totals.avg_power, FieldValue::UInt16)
                    .put(21, m.totals.max_power, FieldValue::UInt16)
                    .put(22, m.totals.total_ascent, FieldValue::UInt16)
                    .put(23, m.totals.total_descent, FieldValue::UInt16)
                    .put(25, m.first_lap_index, FieldValue::UInt16)
                    .put(26, m.num_laps, FieldValue::UInt16);
                t.finish()
            }
            Message::Activity(m) => t
                .put(TIMESTAMP, m.timestamp, FieldValue::UInt32)
                .put(0, m.total_timer_time, FieldValue::UInt32)
                .put(1, m.num_sessions, FieldValue::UInt16)
                .put(2, m.activity_type, FieldValue::Enum)
                .put(3, m.event, FieldValue::Enum)
                .put(4, m.event_type, FieldValue::Enum)
                .put(5, m.local_timestamp, FieldValue::UInt32)
                .finish(),
            Message::Hrv(m) => t.put(0, m.time, FieldValue::UInt16Array).finish(),
        }
    }
}

/// Field layout announced by a definition message: number, size, base type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub global_number: u16,
    pub fields: Vec<(u8, u8, BaseType)>,
}

impl Definition {
    pub fn for_fields(global_number: u16, fields: &[Field]) -> Self {
        Self {
            global_number,
            fields: fields
                .iter()
                .map(|f| (f.number, f.value.size(), f.value.base_type()))
                .collect(),
        }
    }
}

const DEFINITION_HEADER: u8 = 0x40;
const LOCAL_TYPE_MASK: u8 = 0x0F;
const ARCHITECTURE_LITTLE_ENDIAN: u8 = 0;

/// Writes messages, emitting a definition whenever a local type's layout changes.
#[derive(Debug, Default)]
pub struct MessageWriter {
    definitions: [Option<Definition>; 16],
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `message`. Returns `false` (and writes nothing) when the message
    /// has no populated fields.
    pub fn write(&mut self, out: &mut ByteWriter, message: &Message) -> bool {
        let fields = message.fields();
        if fields.is_empty() {
            return false;
        }

        let local = message.local_type() & LOCAL_TYPE_MASK;
        let definition = Definition::for_fields(message.global_number(), &fields);
        let slot = &mut self.definitions[local as usize];
        if slot.as_ref() != Some(&definition) {
            write_definition(out, local, &definition);
            *slot = Some(definition);
        }

        out.write_u8(local);
        for field in &fields {
            field.value.write(out);
        }
        true
    }
}

fn write_definition(out: &mut ByteWriter, local: u8, definition: &Definition) {
    out.write_u8(DEFINITION_HEADER | local);
    out.write_u8(0); // reserved
    out.write_u8(ARCHITECTURE_LITTLE_ENDIAN);
    out.write_u16_le(definition.global_number);
    out.write_u8(definition.fields.len() as u8);
    for (number, size, base_type) in &definition.fields {
        out.write_u8(*number);
        out.write_u8(*size);
        out.write_u8(*base_type as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_record_fields() {
        let record = Message::Record(Record {
            timestamp: Some(1_000_000_000),
            heart_rate: Some(140),
            ..Default::default()
        });
        let fields = record.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].number, TIMESTAMP);
        assert_eq!(fields[1].number, 3);
        assert_eq!(fields[1].value, FieldValue::UInt8(140));
    }

    #[test]
    fn test_definition_then_data_layout() {
        let mut out = ByteWriter::new();
        let mut writer = MessageWriter::new();
        let event = Message::Event(Event {
            timestamp: Some(0x1234_5678),
            event: Some(event::TIMER),
            event_type: Some(event_type::START),
        });
        assert!(writer.write(&mut out, &event));

        let expected: Vec<u8> = vec![
            // definition: header, reserved, arch, global 21, 3 fields
            0x42, 0, 0, 21, 0, 3, //
            253, 4, 0x86, //
            0, 1, 0x00, //
            1, 1, 0x00, //
            // data
            0x02, 0x78, 0x56, 0x34, 0x12, 0, 0,
        ];
        assert_eq!(out.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_definition_reused_until_layout_changes() {
        let mut out = ByteWriter::new();
        let mut writer = MessageWriter::new();
        let with_hr = |hr| {
            Message::Record(Record {
                timestamp: Some(1_000_000_000),
                heart_rate: hr,
                ..Default::default()
            })
        };

        writer.write(&mut out, &with_hr(Some(120)));
        let after_first = out.len();
        writer.write(&mut out, &with_hr(Some(121)));
        // Same layout: data only (header + u32 + u8).
        assert_eq!(out.len() - after_first, 6);

        let before_third = out.len();
        writer.write(&mut out, &with_hr(None));
        // New layout: definition (6 + 3) then data (1 + 4).
        assert_eq!(out.len() - before_third, 14);
    }

    #[test]
    fn test_hrv_array_field_layout() {
        let mut out = ByteWriter::new();
        let mut writer = MessageWriter::new();
        let hrv = Message::Hrv(Hrv {
            time: Some([812, 790, HRV_INVALID, HRV_INVALID, HRV_INVALID]),
        });
        assert!(writer.write(&mut out, &hrv));

        let expected: Vec<u8> = vec![
            // definition: local 7, global 78, one 10-byte uint16 array
            0x47, 0, 0, 78, 0, 1, //
            0, 10, 0x84, //
            // data
            0x07, 0x2C, 0x03, 0x16, 0x03, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        assert_eq!(out.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_empty_message_not_written() {
        let mut out = ByteWriter::new();
        let mut writer = MessageWriter::new();
        assert!(!writer.write(&mut out, &Message::Record(Record::default())));
        assert!(out.is_empty());
    }
}
