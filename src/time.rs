//! Timestamp serialization.
//!
//! Every persisted timestamp column holds an RFC 3339 UTC string with a
//! fixed microsecond fraction, so stored values sort lexicographically in
//! creation order.

use chrono::{DateTime, SecondsFormat, Utc};

/// Serialize a timestamp to its stored textual form.
#[must_use]
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into a `DateTime<Utc>`.
///
/// # Errors
///
/// Returns an error if the input is not a valid RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
