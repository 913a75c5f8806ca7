//! Report rendering.
//!
//! The aggregation core hands its tables to a [`Renderer`]; this module
//! provides the Markdown and JSON renderers and the output sink.

pub mod charts;
pub mod generator;

use crate::models::{Analysis, ReportMetadata};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

pub use generator::{generate_json_report, generate_markdown_report};

/// Turns derived tables into a document.
pub trait Renderer {
    fn render(&self, analysis: &Analysis, metadata: &ReportMetadata) -> Result<String>;
}

/// Markdown report with text bar charts.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    pub bar_width: usize,
}

impl Renderer for MarkdownRenderer {
    fn render(&self, analysis: &Analysis, metadata: &ReportMetadata) -> Result<String> {
        Ok(generate_markdown_report(analysis, metadata, self.bar_width))
    }
}

/// Pretty-printed JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, analysis: &Analysis, metadata: &ReportMetadata) -> Result<String> {
        generate_json_report(analysis, metadata)
    }
}

/// Pick a renderer by format name (`markdown` or `json`).
pub fn renderer_for(format: &str, bar_width: usize) -> Result<Box<dyn Renderer>> {
    match format {
        "markdown" => Ok(Box::new(MarkdownRenderer { bar_width })),
        "json" => Ok(Box::new(JsonRenderer)),
        other => anyhow::bail!("Unknown report format: {}", other),
    }
}

/// Write a rendered report to `destination`, or stdout for `-`.
pub fn write_report(content: &str, destination: &str) -> Result<()> {
    if destination == "-" {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(content.as_bytes())
            .context("Failed to write report to stdout")?;
        return Ok(());
    }

    let path = Path::new(destination);
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
