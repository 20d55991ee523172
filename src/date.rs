//! Date recognition for classification, marshalling and filter terms.
//!
//! Strings are tested against a [`DateParser`]. The default parser accepts
//! RFC 3339 timestamps and a handful of common date and date-time layouts;
//! callers with other conventions plug in their own implementation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y", "%d %b %Y", "%b %d, %Y"];

/// Result of a successful parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl ParsedDate {
    pub fn date(&self) -> NaiveDate {
        match self {
            ParsedDate::Date(d) => *d,
            ParsedDate::DateTime(dt) => dt.date(),
        }
    }

    pub fn to_datetime(&self) -> NaiveDateTime {
        match self {
            ParsedDate::Date(d) => d.and_time(NaiveTime::MIN),
            ParsedDate::DateTime(dt) => *dt,
        }
    }

    /// Milliseconds since the Unix epoch, UTC.
    pub fn to_millis(&self) -> i64 {
        datetime_to_millis(self.to_datetime())
    }
}

/// Validator and parser for date-like strings.
pub trait DateParser {
    fn parse(&self, s: &str) -> Option<ParsedDate>;

    fn is_valid(&self, s: &str) -> bool {
        self.parse(s).is_some()
    }
}

/// chrono-backed parser used when none is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDateParser;

impl DateParser for IsoDateParser {
    fn parse(&self, s: &str) -> Option<ParsedDate> {
        let s = s.trim();
        // Bare numbers are never dates here.
        if s.is_empty() || s.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(ParsedDate::DateTime(dt.naive_utc()));
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(ParsedDate::DateTime(dt));
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Some(ParsedDate::Date(d));
            }
        }
        None
    }
}

pub fn datetime_to_millis(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

pub fn date_to_millis(d: NaiveDate) -> i64 {
    datetime_to_millis(d.and_time(NaiveTime::MIN))
}

pub fn millis_to_datetime(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// ISO-8601 rendering of an epoch-millisecond timestamp.
pub fn format_timestamp(ms: i64) -> String {
    match millis_to_datetime(ms) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        None => ms.to_string(),
    }
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
