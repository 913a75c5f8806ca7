//! Event table loading and validation.
//!
//! This module reads the funnel spreadsheet (a workbook or a CSV export)
//! into an in-memory [`EventTable`]. Missing files and unparseable tables are
//! fatal; bad timestamp cells are coerced to [`CellTime::Invalid`].

pub mod timestamp;
mod workbook;

use crate::config::ColumnsConfig;
use crate::error::AnalysisError;
use crate::models::{CellTime, EventRecord, EventTable};
use csv::{ReaderBuilder, StringRecord, Trim};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use timestamp::TimestampParser;

/// Number of invalid cells echoed at debug level per column.
const INVALID_SAMPLE: usize = 3;

/// Options controlling how the input is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Header names of the required columns.
    pub columns: ColumnsConfig,
    /// Field delimiter.
    pub delimiter: u8,
    /// Extra `strftime` layouts accepted for timestamps.
    pub extra_formats: Vec<String>,
    /// Read ambiguous slash dates day first.
    pub day_first: bool,
    /// Show a progress bar while reading.
    pub show_progress: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            columns: ColumnsConfig::default(),
            delimiter: b',',
            extra_formats: Vec::new(),
            day_first: false,
            show_progress: false,
        }
    }
}

impl From<&crate::config::Config> for LoadOptions {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            columns: config.columns.clone(),
            delimiter: config.input.delimiter_byte(),
            extra_formats: config.timestamps.extra_formats.clone(),
            day_first: config.timestamps.day_first,
            show_progress: false,
        }
    }
}

/// Positions of the required columns within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnIndex {
    funnel: usize,
    medical_condition_flag: usize,
    target_class: usize,
    slot_start_time: usize,
    payment_time: usize,
}

impl ColumnIndex {
    /// Resolve every required column, failing on the first one absent.
    fn resolve(headers: &StringRecord, columns: &ColumnsConfig) -> Result<Self, String> {
        let find = |name: &str| -> Result<usize, String> {
            find_column(headers, name).ok_or_else(|| format!("missing required column '{}'", name))
        };

        Ok(Self {
            funnel: find(&columns.funnel)?,
            medical_condition_flag: find(&columns.medical_condition_flag)?,
            target_class: find(&columns.target_class)?,
            slot_start_time: find(&columns.slot_start_time)?,
            payment_time: find(&columns.payment_time)?,
        })
    }
}

/// Find a header by exact name, then by a loose comparison.
fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    let wanted = name.trim();
    headers
        .iter()
        .position(|h| h.trim() == wanted)
        .or_else(|| {
            let loose = normalize_header(wanted);
            headers.iter().position(|h| normalize_header(h) == loose)
        })
}

/// Lowercase and drop `_`, `-` and whitespace.
fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Timestamp parsers for the slot and payment columns.
struct TimeParsers {
    slot: TimestampParser,
    payment: TimestampParser,
}

impl TimeParsers {
    fn new(options: &LoadOptions) -> Self {
        let parser = |column: &str| {
            TimestampParser::new(column, &options.extra_formats).with_day_first(options.day_first)
        };

        Self {
            slot: parser(&options.columns.slot_start_time),
            payment: parser(&options.columns.payment_time),
        }
    }
}

/// Load an event table from a file on disk.
///
/// Workbooks (`.xlsx`, `.xls`, `.xlsb`, `.ods`) are read from their first
/// sheet; anything else is read as delimited text. The file is released
/// before this function returns.
pub fn load_events(path: &Path, options: &LoadOptions) -> Result<EventTable, AnalysisError> {
    info!("Loading events from: {}", path.display());

    let not_found = || AnalysisError::NotFound {
        path: path.to_path_buf(),
    };

    let metadata = std::fs::metadata(path).map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    let table = if workbook::is_workbook(path) {
        debug!("Reading {} as a workbook", path.display());
        workbook::read_workbook(path, options)?
    } else {
        let file = File::open(path).map_err(|e| {
            debug!("Cannot open {}: {}", path.display(), e);
            not_found()
        })?;

        let progress = if options.show_progress {
            let pb = ProgressBar::new(metadata.len());
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        let table = read_events(file, path, options, progress.as_ref());

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        table?
    };

    info!(
        "Loaded {} rows ({} valid slot times, {} valid payment times)",
        table.summary.rows, table.summary.slot_start_time.valid, table.summary.payment_time.valid
    );

    Ok(table)
}

/// Load an event table from any reader (an in-memory table, for instance).
///
/// The content is read as delimited text. `source` only labels error
/// messages.
pub fn load_from_reader<R: Read>(
    reader: R,
    source: impl Into<PathBuf>,
    options: &LoadOptions,
) -> Result<EventTable, AnalysisError> {
    let source = source.into();
    read_events(reader, &source, options, None)
}

fn read_events<R: Read>(
    reader: R,
    source: &Path,
    options: &LoadOptions,
    progress: Option<&ProgressBar>,
) -> Result<EventTable, AnalysisError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| AnalysisError::malformed(source, e))?
        .clone();

    let index = resolve_columns(&headers, source, options)?;
    let parsers = TimeParsers::new(options);

    let mut records = Vec::new();
    let mut record = StringRecord::new();

    loop {
        match csv_reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => return Err(AnalysisError::malformed(source, e)),
        }

        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let slot_raw = record.get(index.slot_start_time).unwrap_or("");
        let payment_raw = record.get(index.payment_time).unwrap_or("");

        records.push(EventRecord {
            funnel: field(index.funnel),
            medical_condition_flag: field(index.medical_condition_flag),
            target_class: field(index.target_class),
            slot_start_time: parsers.slot.coerce(slot_raw),
            payment_time: parsers.payment.coerce(payment_raw),
        });

        if let Some(pb) = progress {
            if records.len() % 1024 == 0 {
                pb.set_position(record.position().map(|p| p.byte()).unwrap_or(0));
            }
        }
    }

    Ok(finish_table(records, options))
}

/// Check the header row and locate the required columns.
fn resolve_columns(
    headers: &StringRecord,
    source: &Path,
    options: &LoadOptions,
) -> Result<ColumnIndex, AnalysisError> {
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(AnalysisError::malformed(source, "no header row"));
    }

    let index = ColumnIndex::resolve(headers, &options.columns)
        .map_err(|reason| AnalysisError::malformed(source, reason))?;
    debug!("Resolved columns: {:?}", index);

    Ok(index)
}

fn finish_table(records: Vec<EventRecord>, options: &LoadOptions) -> EventTable {
    let table = EventTable::from_records(records);
    report_invalid(&table, &options.columns);
    table
}

/// Log how many timestamp cells were coerced to invalid.
fn report_invalid(table: &EventTable, columns: &ColumnsConfig) {
    let checks: [(&str, fn(&EventRecord) -> &CellTime, usize); 2] = [
        (
            columns.slot_start_time.as_str(),
            |r| &r.slot_start_time,
            table.summary.slot_start_time.invalid,
        ),
        (
            columns.payment_time.as_str(),
            |r| &r.payment_time,
            table.summary.payment_time.invalid,
        ),
    ];

    for (column, cell, invalid) in checks {
        if invalid == 0 {
            continue;
        }

        warn!(
            "{} unparseable value(s) in '{}' treated as invalid",
            invalid, column
        );

        let samples: Vec<&str> = table
            .records
            .iter()
            .filter_map(|r| match cell(r) {
                CellTime::Invalid(raw) => Some(raw.as_str()),
                _ => None,
            })
            .take(INVALID_SAMPLE)
            .collect();
        debug!("Invalid '{}' samples: {:?}", column, samples);
    }
}
