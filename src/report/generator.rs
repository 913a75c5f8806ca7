//! Markdown and JSON report generation.
//!
//! This module renders an [`Analysis`] as a Markdown report with text bar
//! charts, or as a JSON document.

use super::charts::{bar_chart, max_value, Bar};
use crate::models::{Analysis, ConversionTable, CountTable, HourlyDistribution, ReportMetadata};
use anyhow::Result;
use serde::Serialize;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(
    analysis: &Analysis,
    metadata: &ReportMetadata,
    bar_width: usize,
) -> String {
    let mut output = String::new();

    output.push_str("# Funnel Conversion Report\n\n");

    output.push_str(&generate_metadata_section(analysis, metadata));

    for table in metadata.windows.iter().filter_map(|&w| analysis.conversion(w)) {
        output.push_str(&generate_conversion_section(table, bar_width));
    }

    output.push_str(&generate_hourly_section(
        "Slot Hour Distribution",
        &analysis.slot_hours,
        bar_width,
    ));
    output.push_str(&generate_hourly_section(
        "Payment Hour Distribution",
        &analysis.payment_hours,
        bar_width,
    ));

    output.push_str(&generate_count_section(&analysis.funnel_performance, false, bar_width));
    output.push_str(&generate_count_section(&analysis.coach_performance, true, bar_width));
    output.push_str(&generate_count_table(&analysis.medical_condition_impact));

    output.push_str("---\n\n*Report generated by funnelstat*\n");

    output
}

/// Generate the metadata section.
fn generate_metadata_section(analysis: &Analysis, metadata: &ReportMetadata) -> String {
    let mut section = String::new();
    let summary = &analysis.summary;

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Rows Loaded:** {}\n", summary.rows));

    for (name, stats) in [
        ("Slot start", &summary.slot_start_time),
        ("Payment", &summary.payment_time),
    ] {
        section.push_str(&format!(
            "- **{} times:** {} valid, {} missing, {} invalid\n",
            name, stats.valid, stats.missing, stats.invalid
        ));
    }

    let windows: Vec<String> = metadata.windows.iter().map(|w| format!("{w}d")).collect();
    section.push_str(&format!("- **Windows:** {}\n", windows.join(", ")));
    if metadata.strict_non_negative {
        section.push_str("- **Payments before slot start:** excluded\n");
    }
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate one conversion-rate chart, grouped by funnel.
fn generate_conversion_section(table: &ConversionTable, bar_width: usize) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "## {}-Day Conversion Rates by Funnel and Medical Condition\n\n",
        table.window_days
    ));

    if table.rows.is_empty() {
        section.push_str("No grouped records.\n\n");
        return section;
    }

    let bars: Vec<Bar> = table
        .grid()
        .into_iter()
        .map(|(funnel, flag, rate)| {
            Bar::new(format!("{funnel} / {flag}"), rate.value(), rate.to_string())
        })
        .collect();

    section.push_str("```text\n");
    section.push_str(&bar_chart(&bars, 1.0, bar_width));
    section.push_str("```\n\n");

    section.push_str("| Funnel | Medical Condition | Converted | Total | Rate |\n");
    section.push_str("|:---|:---|---:|---:|---:|\n");
    for row in &table.rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.funnel, row.medical_condition_flag, row.conversions, row.total, row.rate
        ));
    }
    section.push('\n');

    section
}

/// Generate an hour-of-day chart.
fn generate_hourly_section(title: &str, dist: &HourlyDistribution, bar_width: usize) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    section.push_str(&format!(
        "*{} valid `{}` values*\n\n",
        dist.total(),
        dist.column
    ));

    let bars: Vec<Bar> = dist
        .entries()
        .map(|(hour, count)| Bar::new(format!("{hour:02}:00"), Some(count as f64), count.to_string()))
        .collect();

    section.push_str("```text\n");
    section.push_str(&bar_chart(&bars, max_value(&bars), bar_width));
    section.push_str("```\n\n");

    section
}

/// Generate a conversions-per-group chart, optionally with shares.
fn generate_count_section(table: &CountTable, with_share: bool, bar_width: usize) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", table.title));

    if table.rows.is_empty() {
        section.push_str("No grouped records.\n\n");
        return section;
    }

    let bars: Vec<Bar> = table
        .rows
        .iter()
        .map(|row| {
            let annotation = match (with_share, table.share(row)) {
                (true, Some(share)) => format!("{} ({:.1}%)", row.conversions, share * 100.0),
                _ => row.conversions.to_string(),
            };
            Bar::new(row.label(), Some(row.conversions as f64), annotation)
        })
        .collect();

    section.push_str("```text\n");
    section.push_str(&bar_chart(&bars, max_value(&bars), bar_width));
    section.push_str("```\n\n");

    section
}

/// Generate a plain Markdown table of conversion counts.
fn generate_count_table(table: &CountTable) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", table.title));

    if table.rows.is_empty() {
        section.push_str("No grouped records.\n\n");
        return section;
    }

    section.push_str(&format!("| {} | Conversions |\n", table.key_columns.join(" | ")));
    section.push_str(&format!(
        "|{}---:|\n",
        ":---|".repeat(table.key_columns.len())
    ));
    for row in &table.rows {
        section.push_str(&format!("| {} | {} |\n", row.key.join(" | "), row.conversions));
    }
    section.push('\n');

    section
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    analysis: &'a Analysis,
}

/// Generate a JSON report.
pub fn generate_json_report(analysis: &Analysis, metadata: &ReportMetadata) -> Result<String> {
    serde_json::to_string_pretty(&JsonReport { metadata, analysis }).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisOptions};
    use crate::models::{CellTime, EventRecord, EventTable};
    use chrono::{NaiveDate, Utc};

    fn create_test_analysis() -> Analysis {
        let slot = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let paid = NaiveDate::from_ymd_opt(2024, 2, 2)
            .unwrap()
            .and_hms_opt(16, 30, 0)
            .unwrap();

        let records = vec![
            EventRecord {
                funnel: "Organic".to_string(),
                medical_condition_flag: "True".to_string(),
                target_class: "ana".to_string(),
                slot_start_time: CellTime::Valid(slot),
                payment_time: CellTime::Valid(paid),
            },
            EventRecord {
                funnel: "Paid".to_string(),
                medical_condition_flag: "False".to_string(),
                target_class: "ben".to_string(),
                slot_start_time: CellTime::Valid(slot),
                payment_time: CellTime::Missing,
            },
        ];

        analyze(&EventTable::from_records(records), &AnalysisOptions::default())
    }

    fn create_test_metadata() -> ReportMetadata {
        ReportMetadata {
            input: "events.csv".to_string(),
            generated_at: Utc::now(),
            windows: vec![3, 7],
            strict_non_negative: false,
            duration_seconds: 0.01,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown =
            generate_markdown_report(&create_test_analysis(), &create_test_metadata(), 20);

        assert!(markdown.contains("# Funnel Conversion Report"));
        assert!(markdown.contains("## 3-Day Conversion Rates by Funnel and Medical Condition"));
        assert!(markdown.contains("## 7-Day Conversion Rates by Funnel and Medical Condition"));
        assert!(markdown.contains("## Slot Hour Distribution"));
        assert!(markdown.contains("## Payment Hour Distribution"));
        assert!(markdown.contains("## Funnel Performance"));
        assert!(markdown.contains("## Coach Performance"));
        assert!(markdown.contains("## Medical Condition Impact"));
        assert!(markdown.contains("`events.csv`"));
    }

    #[test]
    fn test_conversion_section_marks_absent_groups() {
        let analysis = create_test_analysis();
        let section = generate_conversion_section(analysis.conversion(3).unwrap(), 10);

        assert!(section.contains("Organic / True"));
        assert!(section.contains("100.0%"));
        // Organic/False and Paid/True never occur.
        assert_eq!(section.matches("n/a").count(), 2);
        assert!(section.contains("| Paid | False | 0 | 1 | 0.0% |"));
    }

    #[test]
    fn test_hourly_section_lists_every_hour() {
        let analysis = create_test_analysis();
        let section = generate_hourly_section("Slot Hour Distribution", &analysis.slot_hours, 10);

        assert!(section.contains("00:00"));
        assert!(section.contains("23:00"));
        assert!(section.contains("*2 valid `slot_start_time` values*"));
    }

    #[test]
    fn test_coach_section_shows_share() {
        let analysis = create_test_analysis();
        let section = generate_count_section(&analysis.coach_performance, true, 10);

        assert!(section.contains("1 (100.0%)"));
        assert!(section.contains("ben"));
    }

    #[test]
    fn test_count_table() {
        let analysis = create_test_analysis();
        let table = generate_count_table(&analysis.medical_condition_impact);

        assert!(table.contains("| medicalconditionflag | funnel | Conversions |"));
        assert!(table.contains("|:---|:---|---:|"));
        assert!(table.contains("| True | Organic | 1 |"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_analysis(), &create_test_metadata()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["input"], "events.csv");
        assert_eq!(value["analysis"]["conversions"][0]["window_days"], 3);
        assert_eq!(value["analysis"]["conversions"][0]["rows"][0]["rate"], 1.0);
        assert_eq!(
            value["analysis"]["slot_hours"]["buckets"]
                .as_array()
                .map(|b| b.len()),
            Some(24)
        );
    }
}
