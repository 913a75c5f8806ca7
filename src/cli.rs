//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// funnelstat - conversion statistics for sales-funnel event exports
///
/// Loads a CSV export of funnel events and reports 3- and 7-day
/// conversion rates by funnel and medical condition, slot and payment
/// hour distributions, and coach and funnel performance.
///
/// Examples:
///   funnelstat events.csv
///   funnelstat events.csv --format json --output report.json
///   funnelstat events.csv --window 3 --window 7 --window 14
///   funnelstat --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Event file to analyse (CSV with a header row)
    ///
    /// Use "-" to read from stdin. When omitted, the path is asked for
    /// on the terminal.
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file for the report ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .funnelstat.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Conversion window in days (repeatable)
    ///
    /// Overrides the windows from the config file. Default: 3 and 7.
    #[arg(short, long, value_name = "DAYS")]
    pub window: Vec<u32>,

    /// Do not count payments recorded before the slot start as conversions
    #[arg(long)]
    pub strict_non_negative: bool,

    /// Field delimiter of the input file (single character or "tab")
    #[arg(short, long, value_name = "CHAR")]
    pub delimiter: Option<String>,

    /// Width of the longest bar in Markdown charts
    #[arg(long, value_name = "CELLS")]
    pub bar_width: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .funnelstat.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown with text charts (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref delimiter) = self.delimiter {
            if crate::config::parse_delimiter(delimiter).is_none() {
                return Err(format!(
                    "Delimiter must be a single ASCII character or 'tab', got {:?}",
                    delimiter
                ));
            }
        }

        if self.bar_width == Some(0) {
            return Err("Bar width must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
