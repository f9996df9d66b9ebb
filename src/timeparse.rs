//! Timestamp normalization.
//!
//! Source exports carry timestamps in several shapes: `YYYY-MM-DD HH:MM:SS`
//! strings (with or without a `T` separator and fractional seconds), bare
//! dates, RFC 3339, and raw integer epochs at nanosecond resolution.
//! Everything funnels through [`parse_datetime`] / [`from_raw_epoch`] into a
//! naive UTC `NaiveDateTime`. Values that cannot be parsed become `None`
//! rather than an error; downstream stages tolerate the nulls.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse a single timestamp string into a canonical naive UTC value.
///
/// Returns `None` for anything unparseable (fails-soft, never panics).
/// All-digit strings are treated as raw integer epochs, see
/// [`from_raw_epoch`].
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    if let Ok(epoch) = trimmed.parse::<i64>() {
        return from_raw_epoch(epoch);
    }

    None
}

/// Convert a raw integer epoch into a timestamp.
///
/// The source tables store `keyindate` / `first_dialysis` / raw `datatime`
/// as integers that are 1000x a microsecond epoch, so the value is divided
/// by 1000 and interpreted as epoch microseconds. Out-of-range values
/// return `None`.
pub fn from_raw_epoch(raw: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(raw / 1000).map(|dt| dt.naive_utc())
}

/// Floor a timestamp onto the bin grid of `interval_minutes`.
pub fn floor_to_bin(ts: NaiveDateTime, interval_minutes: i64) -> NaiveDateTime {
    let width = interval_minutes * 60;
    let secs = ts.and_utc().timestamp();
    let floored = secs.div_euclid(width) * width;
    DateTime::from_timestamp(floored, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(ts)
}

/// Render a timestamp the way the warehouse stores it (`YYYY-MM-DD HH:MM:SS`).
pub fn to_sql_text(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Serde adapter for optional timestamp columns in CSV/JSONL sources.
///
/// Deserialization is fails-soft: an unparseable value reads as `None`.
/// Serialization writes the warehouse text form, `None` as an empty field.
pub mod serde_naive_opt {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_datetime))
    }

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&super::to_sql_text(*ts)),
            None => serializer.serialize_str(""),
        }
    }
}
