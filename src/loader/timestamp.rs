//! Non-failing timestamp coercion.

use crate::error::AnalysisError;
use crate::models::CellTime;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Unambiguous date-time layouts tried after RFC 3339, in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Slash layouts with the month first (`03/15/2024 14:05`).
const MONTH_FIRST_DATETIME: &[&str] = &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];

/// Slash layouts with the day first (`15/03/2024 14:05`).
const DAY_FIRST_DATETIME: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

/// Unambiguous date-only layouts, read as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const MONTH_FIRST_DATE: &[&str] = &["%m/%d/%Y"];
const DAY_FIRST_DATE: &[&str] = &["%d/%m/%Y"];

/// Cell contents treated as an absent value.
const NULL_TOKENS: &[&str] = &["nan", "nat", "null", "none"];

/// Parses timestamp cells for one column.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    column: String,
    extra_formats: Vec<String>,
    day_first: bool,
}

impl TimestampParser {
    pub fn new(column: impl Into<String>, extra_formats: &[String]) -> Self {
        Self {
            column: column.into(),
            extra_formats: extra_formats.to_vec(),
            day_first: false,
        }
    }

    /// Read ambiguous slash dates day first. Month first is the default;
    /// the other order is still tried when the preferred one fails.
    pub fn with_day_first(mut self, day_first: bool) -> Self {
        self.day_first = day_first;
        self
    }

    /// Slash layouts in the order they are tried.
    fn slash_layouts(&self) -> (&'static [&'static str], &'static [&'static str]) {
        if self.day_first {
            (DAY_FIRST_DATETIME, MONTH_FIRST_DATETIME)
        } else {
            (MONTH_FIRST_DATETIME, DAY_FIRST_DATETIME)
        }
    }

    fn slash_dates(&self) -> (&'static [&'static str], &'static [&'static str]) {
        if self.day_first {
            (DAY_FIRST_DATE, MONTH_FIRST_DATE)
        } else {
            (MONTH_FIRST_DATE, DAY_FIRST_DATE)
        }
    }

    /// Parse one non-empty cell, reporting failure as `InvalidValue`.
    pub fn parse(&self, raw: &str) -> Result<NaiveDateTime, AnalysisError> {
        let value = raw.trim();

        // Wall-clock time in the stated offset.
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.naive_local());
        }

        let (preferred, fallback) = self.slash_layouts();
        let datetime_formats = DATETIME_FORMATS
            .iter()
            .chain(preferred)
            .chain(fallback)
            .copied()
            .chain(self.extra_formats.iter().map(String::as_str));

        for format in datetime_formats {
            if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(ts);
            }
        }

        let (preferred, fallback) = self.slash_dates();
        for format in DATE_FORMATS.iter().chain(preferred).chain(fallback) {
            if let Some(ts) = NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
            {
                return Ok(ts);
            }
        }

        Err(AnalysisError::InvalidValue {
            column: self.column.clone(),
            value: value.to_string(),
        })
    }

    /// Coerce a cell, never failing.
    pub fn coerce(&self, raw: &str) -> CellTime {
        let value = raw.trim();

        if value.is_empty() || NULL_TOKENS.iter().any(|t| value.eq_ignore_ascii_case(t)) {
            return CellTime::Missing;
        }

        match self.parse(value) {
            Ok(ts) => CellTime::Valid(ts),
            Err(_) => CellTime::Invalid(value.to_string()),
        }
    }
}
