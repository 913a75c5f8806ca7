//! Aggregation of validated event tables.
//!
//! Everything here is a pure function of the loaded table.

pub mod aggregator;
pub mod conversion;

pub use aggregator::{analyze, AnalysisOptions};
