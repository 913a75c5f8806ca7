//! Data models for funnel analysis.
//!
//! This module contains the event records produced by the loader and the
//! derived tables produced by the aggregator.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A timestamp cell after coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellTime {
    /// Parsed successfully.
    Valid(NaiveDateTime),
    /// Empty cell or a null token such as `NaT`.
    Missing,
    /// Non-empty cell that did not match any accepted format.
    Invalid(String),
}

impl CellTime {
    /// Returns the timestamp if the cell is valid.
    pub fn valid(&self) -> Option<NaiveDateTime> {
        match self {
            CellTime::Valid(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CellTime::Valid(_))
    }
}

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Acquisition channel label.
    pub funnel: String,
    /// Medical condition label, kept as written in the file.
    pub medical_condition_flag: String,
    /// Responsible coach.
    pub target_class: String,
    /// Scheduled slot start.
    pub slot_start_time: CellTime,
    /// Payment time; anything but `Valid` means the record never converted.
    pub payment_time: CellTime,
}

impl EventRecord {
    /// Whether this record reached a valid payment.
    pub fn converted(&self) -> bool {
        self.payment_time.is_valid()
    }
}

/// Validity counts for one timestamp column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnStats {
    pub valid: usize,
    pub missing: usize,
    pub invalid: usize,
}

impl ColumnStats {
    /// Record one coerced cell.
    pub fn observe(&mut self, cell: &CellTime) {
        match cell {
            CellTime::Valid(_) => self.valid += 1,
            CellTime::Missing => self.missing += 1,
            CellTime::Invalid(_) => self.invalid += 1,
        }
    }
}

/// What the loader saw while reading the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Number of data rows loaded.
    pub rows: usize,
    pub slot_start_time: ColumnStats,
    pub payment_time: ColumnStats,
}

impl LoadSummary {
    /// Build a summary by scanning a set of records.
    pub fn from_records(records: &[EventRecord]) -> Self {
        let mut summary = Self {
            rows: records.len(),
            ..Self::default()
        };

        for record in records {
            summary.slot_start_time.observe(&record.slot_start_time);
            summary.payment_time.observe(&record.payment_time);
        }

        summary
    }
}

/// The validated, in-memory event table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTable {
    pub records: Vec<EventRecord>,
    pub summary: LoadSummary,
}

impl EventTable {
    /// Wrap already-coerced records, computing the summary.
    pub fn from_records(records: Vec<EventRecord>) -> Self {
        let summary = LoadSummary::from_records(&records);
        Self { records, summary }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A ratio that may be undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "Option<f64>")]
pub enum Rate {
    Value(f64),
    /// The group had no records.
    NoData,
}

impl Rate {
    /// Divide, yielding `NoData` for a zero denominator.
    pub fn ratio(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            Rate::NoData
        } else {
            Rate::Value(numerator as f64 / denominator as f64)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Rate::Value(v) => Some(*v),
            Rate::NoData => None,
        }
    }
}

impl From<Rate> for Option<f64> {
    fn from(rate: Rate) -> Self {
        rate.value()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Value(v) => write!(f, "{:.1}%", v * 100.0),
            Rate::NoData => write!(f, "n/a"),
        }
    }
}

/// Conversion rate for one `(funnel, medical_condition_flag)` group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionRow {
    pub funnel: String,
    pub medical_condition_flag: String,
    /// Records converting within the window.
    pub conversions: usize,
    /// All records in the group.
    pub total: usize,
    pub rate: Rate,
}

/// Conversion rates for one day window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionTable {
    pub window_days: u32,
    pub strict_non_negative: bool,
    pub rows: Vec<ConversionRow>,
}

impl ConversionTable {
    /// Rate for a group key, `NoData` if the key never occurred.
    pub fn rate_for(&self, funnel: &str, flag: &str) -> Rate {
        self.rows
            .iter()
            .find(|r| r.funnel == funnel && r.medical_condition_flag == flag)
            .map(|r| r.rate)
            .unwrap_or(Rate::NoData)
    }

    /// Distinct funnels, sorted.
    pub fn funnels(&self) -> Vec<&str> {
        let mut funnels: Vec<&str> = self.rows.iter().map(|r| r.funnel.as_str()).collect();
        funnels.sort_unstable();
        funnels.dedup();
        funnels
    }

    /// Distinct medical condition flags, sorted.
    pub fn flags(&self) -> Vec<&str> {
        let mut flags: Vec<&str> = self
            .rows
            .iter()
            .map(|r| r.medical_condition_flag.as_str())
            .collect();
        flags.sort_unstable();
        flags.dedup();
        flags
    }

    /// Every observed funnel crossed with every observed flag.
    ///
    /// Combinations that never occurred carry `Rate::NoData`.
    pub fn grid(&self) -> Vec<(String, String, Rate)> {
        let flags = self.flags();
        self.funnels()
            .into_iter()
            .flat_map(|funnel| {
                flags.iter().map(move |flag| {
                    (
                        funnel.to_string(),
                        flag.to_string(),
                        self.rate_for(funnel, flag),
                    )
                })
            })
            .collect()
    }
}

/// Count of valid timestamps per hour of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyDistribution {
    /// Source column name.
    pub column: String,
    /// Index is the hour (0-23).
    pub buckets: [usize; 24],
}

impl HourlyDistribution {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            buckets: [0; 24],
        }
    }

    /// `(hour, count)` pairs in ascending hour order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .map(|(hour, count)| (hour as u32, *count))
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().sum()
    }
}

/// Number of conversions for one group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub key: Vec<String>,
    pub conversions: usize,
}

impl CountRow {
    /// The key rendered as a single label.
    pub fn label(&self) -> String {
        self.key.join(" / ")
    }
}

/// A group-by-count table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountTable {
    pub title: String,
    pub key_columns: Vec<String>,
    pub rows: Vec<CountRow>,
}

impl CountTable {
    pub fn total(&self) -> usize {
        self.rows.iter().map(|r| r.conversions).sum()
    }

    /// Fraction of the table total held by `row`, `None` for an empty total.
    pub fn share(&self, row: &CountRow) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(row.conversions as f64 / total as f64),
        }
    }
}

/// Every derived table from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub summary: LoadSummary,
    /// One table per window, ascending by window.
    pub conversions: Vec<ConversionTable>,
    pub slot_hours: HourlyDistribution,
    pub payment_hours: HourlyDistribution,
    pub coach_performance: CountTable,
    pub funnel_performance: CountTable,
    pub medical_condition_impact: CountTable,
}

impl Analysis {
    /// The conversion table for a given window, if it was computed.
    pub fn conversion(&self, window_days: u32) -> Option<&ConversionTable> {
        self.conversions.iter().find(|t| t.window_days == window_days)
    }
}

/// Metadata about a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Input file the report was computed from.
    pub input: String,
    pub generated_at: DateTime<Utc>,
    pub windows: Vec<u32>,
    pub strict_non_negative: bool,
    pub duration_seconds: f64,
}
