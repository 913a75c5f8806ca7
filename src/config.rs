//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.funnelstat.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".funnelstat.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input column names.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Input file settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Timestamp coercion settings.
    #[serde(default)]
    pub timestamps: TimestampsConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report destination; `-` writes to stdout.
    #[serde(default = "default_output")]
    pub output: String,

    /// Report format (`markdown` or `json`).
    #[serde(default = "default_format")]
    pub format: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: default_format(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "-".to_string()
}

fn default_format() -> String {
    "markdown".to_string()
}

/// Header names of the required input columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_funnel")]
    pub funnel: String,
    #[serde(default = "default_medical_condition_flag")]
    pub medical_condition_flag: String,
    #[serde(default = "default_target_class")]
    pub target_class: String,
    #[serde(default = "default_slot_start_time")]
    pub slot_start_time: String,
    #[serde(default = "default_payment_time")]
    pub payment_time: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            funnel: default_funnel(),
            medical_condition_flag: default_medical_condition_flag(),
            target_class: default_target_class(),
            slot_start_time: default_slot_start_time(),
            payment_time: default_payment_time(),
        }
    }
}

fn default_funnel() -> String {
    "funnel".to_string()
}

fn default_medical_condition_flag() -> String {
    "medicalconditionflag".to_string()
}

fn default_target_class() -> String {
    "target_class".to_string()
}

fn default_slot_start_time() -> String {
    "slot_start_time".to_string()
}

fn default_payment_time() -> String {
    "payment_time".to_string()
}

/// Input file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Field delimiter (a single ASCII character, or `tab`).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl InputConfig {
    /// The delimiter as a byte, falling back to `,` when unusable.
    pub fn delimiter_byte(&self) -> u8 {
        parse_delimiter(&self.delimiter).unwrap_or(b',')
    }
}

/// Parse a delimiter setting into a single byte.
pub fn parse_delimiter(value: &str) -> Option<u8> {
    match value {
        "tab" | "\\t" | "\t" => Some(b'\t'),
        v if v.len() == 1 && v.is_ascii() => v.bytes().next(),
        _ => None,
    }
}

/// Timestamp coercion settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimestampsConfig {
    /// Extra `strftime` layouts tried after the built-in ones.
    #[serde(default)]
    pub extra_formats: Vec<String>,

    /// Read ambiguous slash dates (`01/02/2024`) day first.
    #[serde(default)]
    pub day_first: bool,
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Conversion windows in days.
    #[serde(default = "default_windows")]
    pub windows: Vec<u32>,

    /// Exclude payments recorded before the slot start from conversions.
    #[serde(default)]
    pub strict_non_negative: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            windows: default_windows(),
            strict_non_negative: false,
        }
    }
}

fn default_windows() -> Vec<u32> {
    vec![3, 7]
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Width of the longest bar in text charts.
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            bar_width: default_bar_width(),
        }
    }
}

fn default_bar_width() -> usize {
    40
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.funnelstat.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format.as_str().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if !args.window.is_empty() {
            self.analysis.windows = args.window.clone();
        }
        if args.strict_non_negative {
            self.analysis.strict_non_negative = true;
        }

        if let Some(ref delimiter) = args.delimiter {
            self.input.delimiter = delimiter.clone();
        }
        if let Some(width) = args.bar_width {
            self.report.bar_width = width;
        }
    }

    /// Sorted, deduplicated conversion windows.
    pub fn windows(&self) -> Vec<u32> {
        let mut windows = self.analysis.windows.clone();
        windows.sort_unstable();
        windows.dedup();
        windows
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.windows.is_empty() {
            anyhow::bail!("At least one conversion window is required");
        }
        if parse_delimiter(&self.input.delimiter).is_none() {
            anyhow::bail!(
                "Delimiter must be a single ASCII character or 'tab', got {:?}",
                self.input.delimiter
            );
        }
        if !matches!(self.general.format.as_str(), "markdown" | "json") {
            anyhow::bail!(
                "Unknown report format {:?} (expected 'markdown' or 'json')",
                self.general.format
            );
        }
        if self.report.bar_width == 0 {
            anyhow::bail!("Bar width must be at least 1");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.columns.medical_condition_flag, "medicalconditionflag");
        assert_eq!(config.analysis.windows, vec![3, 7]);
        assert!(!config.analysis.strict_non_negative);
        assert_eq!(config.input.delimiter_byte(), b',');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
format = "json"
verbose = true

[columns]
target_class = "coach"

[analysis]
windows = [14, 3, 7, 3]
strict_non_negative = true

[input]
delimiter = ";"

[timestamps]
day_first = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.format, "json");
        assert_eq!(config.general.output, "-");
        assert!(config.general.verbose);
        assert_eq!(config.columns.target_class, "coach");
        assert_eq!(config.columns.funnel, "funnel");
        assert_eq!(config.windows(), vec![3, 7, 14]);
        assert!(config.analysis.strict_non_negative);
        assert_eq!(config.input.delimiter_byte(), b';');
        assert_eq!(config.report.bar_width, 40);
        assert!(config.timestamps.day_first);
        assert!(config.timestamps.extra_formats.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.analysis.windows.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.delimiter = ";;".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.format = "html".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(","), Some(b','));
        assert_eq!(parse_delimiter("tab"), Some(b'\t'));
        assert_eq!(parse_delimiter("é"), None);
        assert_eq!(parse_delimiter(""), None);
    }

    #[test]
    fn test_load_from_file_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[report]\nbar_width = 20").unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.report.bar_width, 20);

        std::fs::write(&path, "[report\nbar_width = ").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[columns]"));
        assert!(toml_str.contains("[analysis]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.analysis.windows, vec![3, 7]);
    }
}
