//! Windowed conversion rates per funnel and medical condition.

use crate::models::{ConversionRow, ConversionTable, EventRecord, Rate};
use chrono::Duration;
use std::collections::BTreeMap;
use tracing::debug;

/// Time from slot start to payment, if both timestamps are valid.
pub fn time_to_payment(record: &EventRecord) -> Option<Duration> {
    let slot = record.slot_start_time.valid()?;
    let paid = record.payment_time.valid()?;
    Some(paid - slot)
}

/// Whether a record converted within `window_days` of its slot.
///
/// Elapsed time is truncated toward zero to whole days before comparing.
/// A payment before the slot start passes unless `strict_non_negative` is set.
pub fn converts_within(record: &EventRecord, window_days: u32, strict_non_negative: bool) -> bool {
    match time_to_payment(record) {
        Some(elapsed) if strict_non_negative && elapsed < Duration::zero() => false,
        Some(elapsed) => elapsed.num_days() <= i64::from(window_days),
        None => false,
    }
}

/// Compute the conversion rate of every `(funnel, medical_condition_flag)` group.
///
/// The denominator is every record in the group, whatever the state of its
/// timestamps. Records with a blank funnel or flag belong to no group.
pub fn conversion_rates(
    records: &[EventRecord],
    window_days: u32,
    strict_non_negative: bool,
) -> ConversionTable {
    let mut groups: BTreeMap<(&str, &str), (usize, usize)> = BTreeMap::new();
    let mut ungrouped = 0usize;

    for record in records {
        let funnel = record.funnel.as_str();
        let flag = record.medical_condition_flag.as_str();

        if funnel.is_empty() || flag.is_empty() {
            ungrouped += 1;
            continue;
        }

        let entry = groups.entry((funnel, flag)).or_insert((0, 0));
        entry.1 += 1;
        if converts_within(record, window_days, strict_non_negative) {
            entry.0 += 1;
        }
    }

    if ungrouped > 0 {
        debug!(
            "{} record(s) with a blank funnel or medical condition flag left out of {}-day rates",
            ungrouped, window_days
        );
    }

    let rows = groups
        .into_iter()
        .map(|((funnel, flag), (conversions, total))| ConversionRow {
            funnel: funnel.to_string(),
            medical_condition_flag: flag.to_string(),
            conversions,
            total,
            rate: Rate::ratio(conversions, total),
        })
        .collect();

    ConversionTable {
        window_days,
        strict_non_negative,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellTime;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, hour: u32) -> CellTime {
        CellTime::Valid(day_hour(day, hour))
    }

    fn day_hour(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            + Duration::days(i64::from(day))
    }

    fn record(funnel: &str, flag: &str, slot: CellTime, paid: CellTime) -> EventRecord {
        EventRecord {
            funnel: funnel.to_string(),
            medical_condition_flag: flag.to_string(),
            target_class: "coach".to_string(),
            slot_start_time: slot,
            payment_time: paid,
        }
    }

    #[test]
    fn test_worked_example() {
        let records = vec![
            record("A", "true", at(0, 9), at(2, 10)),
            record("A", "true", at(0, 9), at(10, 10)),
        ];

        for (window, expected) in [(3, 0.5), (7, 0.5), (10, 1.0)] {
            let table = conversion_rates(&records, window, false);
            assert_eq!(table.rows.len(), 1);
            assert_eq!(table.rate_for("A", "true"), Rate::Value(expected));
        }
    }

    #[test]
    fn test_days_are_truncated() {
        // 3 days 23 hours is still "3 days".
        let r = record("A", "true", at(0, 0), at(3, 23));
        assert!(converts_within(&r, 3, false));

        let r = record("A", "true", at(0, 0), at(4, 0));
        assert!(!converts_within(&r, 3, false));
    }

    #[test]
    fn test_negative_difference() {
        let r = record("A", "true", at(5, 9), at(1, 9));
        assert!(converts_within(&r, 3, false));
        assert!(!converts_within(&r, 3, true));

        // Less than a day early truncates to zero but is still negative.
        let r = record("A", "true", at(0, 9), at(0, 8));
        assert!(converts_within(&r, 0, false));
        assert!(!converts_within(&r, 0, true));
    }

    #[test]
    fn test_missing_and_invalid_count_in_denominator_only() {
        let records = vec![
            record("A", "false", at(0, 9), at(1, 9)),
            record("A", "false", at(0, 9), CellTime::Missing),
            record("A", "false", CellTime::Invalid("x".to_string()), at(1, 9)),
            record("A", "false", at(0, 9), CellTime::Invalid("later".to_string())),
        ];

        let table = conversion_rates(&records, 7, false);
        let row = &table.rows[0];
        assert_eq!(row.total, 4);
        assert_eq!(row.conversions, 1);
        assert_eq!(row.rate, Rate::Value(0.25));
    }

    #[test]
    fn test_groups_are_sorted_and_keep_zero_rates() {
        let records = vec![
            record("Paid", "true", at(0, 9), CellTime::Missing),
            record("Organic", "true", at(0, 9), at(1, 9)),
            record("Organic", "false", at(0, 9), at(1, 9)),
        ];

        let table = conversion_rates(&records, 3, false);
        let keys: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.funnel.as_str(), r.medical_condition_flag.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("Organic", "false"), ("Organic", "true"), ("Paid", "true")]
        );
        assert_eq!(table.rate_for("Paid", "true"), Rate::Value(0.0));
        assert_eq!(table.rate_for("Paid", "false"), Rate::NoData);
    }

    #[test]
    fn test_blank_keys_are_ungrouped() {
        let records = vec![
            record("", "true", at(0, 9), at(1, 9)),
            record("A", "", at(0, 9), at(1, 9)),
            record("A", "true", at(0, 9), at(1, 9)),
        ];

        let table = conversion_rates(&records, 3, false);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].total, 1);
    }

    #[test]
    fn test_rates_bounded_and_monotone() {
        let mut records = Vec::new();
        for (i, funnel) in ["A", "B", "C"].iter().enumerate() {
            for offset in 0..12u32 {
                let paid = if offset % 5 == 0 {
                    CellTime::Missing
                } else {
                    at(offset + i as u32, 9 + offset)
                };
                let flag = if offset % 2 == 0 { "true" } else { "false" };
                records.push(record(funnel, flag, at(1, 8), paid));
            }
        }

        let three = conversion_rates(&records, 3, false);
        let seven = conversion_rates(&records, 7, false);
        assert_eq!(three.rows.len(), seven.rows.len());

        for (short, long) in three.rows.iter().zip(&seven.rows) {
            let s = short.rate.value().unwrap();
            let l = long.rate.value().unwrap();
            assert!((0.0..=1.0).contains(&s));
            assert!((0.0..=1.0).contains(&l));
            assert!(l >= s, "{}: {} < {}", long.funnel, l, s);
        }
    }

    #[test]
    fn test_empty_input() {
        let table = conversion_rates(&[], 3, false);
        assert!(table.rows.is_empty());
        assert_eq!(table.rate_for("A", "true"), Rate::NoData);
    }
}
