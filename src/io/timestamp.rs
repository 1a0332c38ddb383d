//! Lenient timestamp (de)serialisation for input tables.
//!
//! Meter exports mix ISO-8601 (`2025-08-01T00:15:00`), space-separated
//! (`2025-08-01 00:15:00`), minute-precision, and day-first
//! (`01-08-2025 00:15:00`) layouts. Output is always ISO `YYYY-MM-DD HH:MM:SS`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer, de};

const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parses a timestamp in any of the accepted layouts.
pub fn parse(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(OUTPUT_FORMAT))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| de::Error::custom(format!("unrecognised timestamp \"{raw}\"")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_iso_and_space_separated() {
        let a = parse("2025-08-07T18:00:02");
        let b = parse("2025-08-07 18:00:02");
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn accepts_day_first() {
        let ts = parse("07-08-2025 18:15").map(|t| t.to_string());
        assert_eq!(ts.as_deref(), Some("2025-08-07 18:15:00"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not a time").is_none());
        assert!(parse("").is_none());
    }
}
