//! Timestamp decoding for backend payloads.
//!
//! The backend mixes offset-aware timestamps (`2024-05-02T01:00:00+00:00`) with naive
//! database columns (`2024-05-02T01:00:00`). Naive values are taken to be UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses an RFC 3339 timestamp, or a naive ISO 8601 one read as UTC.
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// For `#[serde(deserialize_with = "...")]` on `DateTime<Utc>` fields.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

/// For `Option<DateTime<Utc>>` fields; pair with `#[serde(default)]`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_offset_and_naive_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 2, 1, 0, 0).unwrap();

        assert_eq!(parse("2024-05-02T01:00:00+00:00"), Some(expected));
        assert_eq!(parse("2024-05-02T10:00:00+09:00"), Some(expected));
        assert_eq!(parse("2024-05-02T01:00:00Z"), Some(expected));
        assert_eq!(parse("2024-05-02T01:00:00"), Some(expected));
        assert_eq!(parse("2024-05-02 01:00:00"), Some(expected));
    }

    #[test]
    fn keeps_fractional_seconds_on_naive_values() {
        let parsed = parse("2024-05-02T01:00:00.250000").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse("yesterday"), None);
        assert_eq!(parse(""), None);
    }
}
