//! Error taxonomy for loading and analysing funnel data.
//!
//! `NotFound` and `MalformedInput` abort the run. `InvalidValue` is only
//! ever produced for a single cell and is absorbed by the loader.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while reading and validating an event table.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The input path does not resolve to a readable file.
    #[error("File not found at {}. Please check the path and try again.", path.display())]
    NotFound { path: PathBuf },

    /// The input cannot be parsed as a table, or required columns are absent.
    #[error("Error while reading the file {}: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    /// A single cell failed timestamp coercion.
    #[error("Invalid value in column '{column}': {value:?}")]
    InvalidValue { column: String, value: String },
}

impl AnalysisError {
    /// Build a `MalformedInput` error from anything displayable.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        AnalysisError::MalformedInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = AnalysisError::NotFound {
            path: PathBuf::from("/data/events.csv"),
        };
        assert_eq!(
            err.to_string(),
            "File not found at /data/events.csv. Please check the path and try again."
        );
    }

    #[test]
    fn test_malformed_message() {
        let err = AnalysisError::malformed("events.csv", "missing required column 'funnel'");
        let msg = err.to_string();
        assert!(msg.starts_with("Error while reading the file events.csv"));
        assert!(msg.contains("missing required column 'funnel'"));
    }

    #[test]
    fn test_invalid_value_message() {
        let err = AnalysisError::InvalidValue {
            column: "payment_time".to_string(),
            value: "soon".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value in column 'payment_time': \"soon\""
        );
    }
}
