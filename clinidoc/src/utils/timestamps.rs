//! Timestamp helpers shared by tasks, reports and output naming.

use chrono::{DateTime, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as RFC 3339 with microsecond precision.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use clinidoc::utils::format_iso;
///
/// let ts = Utc.with_ymd_and_hms(2025, 11, 18, 9, 30, 0).unwrap();
/// assert_eq!(format_iso(&ts), "2025-11-18T09:30:00.000000+00:00");
/// ```
#[must_use]
pub fn format_iso(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC time as an ISO 8601 formatted string.
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso(&now_utc())
}

/// Compact timestamp used in generated directory names (`20251118_093000`).
#[must_use]
pub fn dir_timestamp(ts: &Timestamp) -> String {
    ts.format("%Y%m%d_%H%M%S").to_string()
}

/// Formats the span between two timestamps as `H:MM:SS.mmm`.
#[must_use]
pub fn format_elapsed(start: &Timestamp, end: &Timestamp) -> String {
    let millis = (*end - *start).num_milliseconds().max(0);
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;
    format!("{hours}:{minutes:02}:{seconds:02}.{:03}", millis % 1000)
}
