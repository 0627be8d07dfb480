// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing and formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp with any offset into UTC.
pub fn parse_utc_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop sub-second precision (FIT timestamps are whole seconds).
pub fn floor_to_second(date: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(date.timestamp(), 0).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_with_offset() {
        let parsed = parse_utc_rfc3339("2024-06-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        assert!(parse_utc_rfc3339("yesterday").is_none());
    }

    #[test]
    fn test_floor_and_format() {
        let dt = parse_utc_rfc3339("2024-06-01T08:00:00.900Z").unwrap();
        assert_eq!(format_utc_rfc3339(floor_to_second(dt)), "2024-06-01T08:00:00Z");
    }
}
