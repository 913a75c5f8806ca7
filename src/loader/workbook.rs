//! Spreadsheet workbooks, read from their first sheet.

use super::{finish_table, resolve_columns, LoadOptions, TimeParsers, TimestampParser};
use crate::error::AnalysisError;
use crate::models::{CellTime, EventRecord, EventTable};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use csv::StringRecord;
use std::path::Path;
use tracing::debug;

/// Extensions read as workbooks instead of delimited text.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Whether `path` names a workbook, judged by its extension.
pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

/// Read the first sheet of a workbook. Its first row is the header.
pub fn read_workbook(path: &Path, options: &LoadOptions) -> Result<EventTable, AnalysisError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| AnalysisError::malformed(path, e))?;

    let sheet = workbook.sheet_names().first().cloned().unwrap_or_default();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalysisError::malformed(path, "workbook has no worksheets"))?
        .map_err(|e| AnalysisError::malformed(path, e))?;
    debug!("Reading sheet '{}' ({} rows)", sheet, range.height());

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|row| {
            StringRecord::from(
                row.iter()
                    .map(|cell| cell_text(Some(cell)))
                    .collect::<Vec<String>>(),
            )
        })
        .unwrap_or_default();

    let index = resolve_columns(&headers, path, options)?;
    let parsers = TimeParsers::new(options);

    let records = rows
        .map(|row| EventRecord {
            funnel: cell_text(row.get(index.funnel)),
            medical_condition_flag: cell_text(row.get(index.medical_condition_flag)),
            target_class: cell_text(row.get(index.target_class)),
            slot_start_time: cell_time(row.get(index.slot_start_time), &parsers.slot),
            payment_time: cell_time(row.get(index.payment_time), &parsers.payment),
        })
        .collect();

    Ok(finish_table(records, options))
}

/// Text of a label cell. Booleans read as `True`/`False`.
fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Bool(true)) => "True".to_string(),
        Some(Data::Bool(false)) => "False".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Coerce a time cell. Date cells convert directly; text goes through
/// the same parser as CSV input.
fn cell_time(cell: Option<&Data>, parser: &TimestampParser) -> CellTime {
    match cell {
        None | Some(Data::Empty) | Some(Data::Error(_)) => CellTime::Missing,
        Some(Data::String(s)) => parser.coerce(s),
        Some(data @ (Data::DateTime(_) | Data::DateTimeIso(_))) => match data.as_datetime() {
            Some(ts) => CellTime::Valid(ts),
            None => CellTime::Invalid(data.to_string()),
        },
        Some(other) => CellTime::Invalid(other.to_string()),
    }
}
