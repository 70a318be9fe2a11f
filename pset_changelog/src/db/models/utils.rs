// SPDX-License-Identifier: AGPL-3.0-or-later

//! Conversion of timestamps between their domain and database representation.
use chrono::{DateTime, TimeZone, Utc};

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Returns the time as microseconds since the Unix epoch, the representation used in every
/// timestamp column.
pub fn to_micros(time: &DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

/// Parses microseconds since the Unix epoch, `None` when out of range.
pub fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    let seconds = micros.div_euclid(MICROS_PER_SECOND);
    let nanos = micros.rem_euclid(MICROS_PER_SECOND) * 1_000;

    Utc.timestamp_opt(seconds, nanos as u32).single()
}

/// Current server time at the precision of the database.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    from_micros(to_micros(&now)).unwrap_or(now)
}
