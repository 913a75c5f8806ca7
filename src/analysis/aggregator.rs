//! Event aggregation and statistics.
//!
//! This module turns a validated [`EventTable`] into every derived table
//! of a run: conversion rates, hourly distributions and conversion counts.

use super::conversion::conversion_rates;
use crate::config::{ColumnsConfig, Config};
use crate::models::{
    Analysis, CellTime, CountRow, CountTable, EventRecord, EventTable, HourlyDistribution,
};
use chrono::Timelike;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Settings for one aggregation pass.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Conversion windows in days, ascending and unique.
    pub windows: Vec<u32>,
    /// Exclude payments made before the slot start.
    pub strict_non_negative: bool,
    /// Column names used to label the derived tables.
    pub columns: ColumnsConfig,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            windows: vec![3, 7],
            strict_non_negative: false,
            columns: ColumnsConfig::default(),
        }
    }
}

impl From<&Config> for AnalysisOptions {
    fn from(config: &Config) -> Self {
        Self {
            windows: config.windows(),
            strict_non_negative: config.analysis.strict_non_negative,
            columns: config.columns.clone(),
        }
    }
}

/// Run every aggregation over the table.
///
/// Pure: the same table and options always give the same `Analysis`.
pub fn analyze(table: &EventTable, options: &AnalysisOptions) -> Analysis {
    let records = &table.records;
    let columns = &options.columns;

    let conversions = options
        .windows
        .iter()
        .map(|&window| conversion_rates(records, window, options.strict_non_negative))
        .collect();

    let analysis = Analysis {
        summary: table.summary.clone(),
        conversions,
        slot_hours: hourly_distribution(records, &columns.slot_start_time, |r| {
            &r.slot_start_time
        }),
        payment_hours: hourly_distribution(records, &columns.payment_time, |r| &r.payment_time),
        coach_performance: count_conversions(
            records,
            "Coach Performance",
            &[columns.target_class.as_str()],
            |r| vec![r.target_class.as_str()],
        ),
        funnel_performance: count_conversions(
            records,
            "Funnel Performance",
            &[columns.funnel.as_str()],
            |r| vec![r.funnel.as_str()],
        ),
        medical_condition_impact: count_conversions(
            records,
            "Medical Condition Impact",
            &[columns.medical_condition_flag.as_str(), columns.funnel.as_str()],
            |r| vec![r.medical_condition_flag.as_str(), r.funnel.as_str()],
        ),
    };

    info!(
        "Aggregated {} rows into {} conversion table(s)",
        table.len(),
        analysis.conversions.len()
    );

    analysis
}

/// Bucket the valid timestamps of one column by hour of day.
///
/// Missing and invalid cells are skipped, not counted as hour 0.
pub fn hourly_distribution<F>(records: &[EventRecord], column: &str, cell: F) -> HourlyDistribution
where
    F: Fn(&EventRecord) -> &CellTime,
{
    let mut distribution = HourlyDistribution::new(column);

    for ts in records.iter().filter_map(|r| cell(r).valid()) {
        distribution.buckets[ts.hour() as usize] += 1;
    }

    distribution
}

/// Count records with a valid payment per group key.
///
/// Every key that occurs appears in the output, including keys with no
/// conversions. Keys containing a blank label are skipped.
pub fn count_conversions<'a, F>(
    records: &'a [EventRecord],
    title: &str,
    key_columns: &[&str],
    key: F,
) -> CountTable
where
    F: Fn(&'a EventRecord) -> Vec<&'a str>,
{
    let mut counts: BTreeMap<Vec<&str>, usize> = BTreeMap::new();
    let mut ungrouped = 0usize;

    for record in records {
        let group = key(record);
        if group.iter().any(|label| label.is_empty()) {
            ungrouped += 1;
            continue;
        }

        let count = counts.entry(group).or_insert(0);
        if record.converted() {
            *count += 1;
        }
    }

    if ungrouped > 0 {
        debug!("{} record(s) with a blank key left out of {}", ungrouped, title);
    }

    CountTable {
        title: title.to_string(),
        key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
        rows: counts
            .into_iter()
            .map(|(key, conversions)| CountRow {
                key: key.into_iter().map(String::from).collect(),
                conversions,
            })
            .collect(),
    }
}
