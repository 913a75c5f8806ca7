//! Text bar charts for Markdown reports.

/// One bar of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Left-hand label.
    pub label: String,
    /// Bar value; `None` draws an empty bar.
    pub value: Option<f64>,
    /// Text printed after the bar.
    pub annotation: String,
}

impl Bar {
    pub fn new(label: impl Into<String>, value: Option<f64>, annotation: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value,
            annotation: annotation.into(),
        }
    }
}

const FILL: char = '█';

/// Number of cells filled for `value` on a `scale_max` axis `width` cells wide.
pub fn bar_length(value: f64, scale_max: f64, width: usize) -> usize {
    if scale_max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let cells = (value / scale_max * width as f64).round() as usize;
    cells.min(width)
}

/// Render bars as aligned text lines.
///
/// Values are scaled against `scale_max`; pass the largest value for
/// counts, or `1.0` for rates.
pub fn bar_chart(bars: &[Bar], scale_max: f64, width: usize) -> String {
    let label_width = bars
        .iter()
        .map(|b| b.label.chars().count())
        .max()
        .unwrap_or(0);

    let mut chart = String::new();

    for bar in bars {
        let filled = bar
            .value
            .map(|v| bar_length(v, scale_max, width))
            .unwrap_or(0);
        let cells: String = std::iter::repeat(FILL).take(filled).collect();

        chart.push_str(&format!(
            "{:<label_width$} | {:<width$} {}\n",
            bar.label, cells, bar.annotation
        ));
    }

    chart
}

/// Largest value among the bars, or zero.
pub fn max_value(bars: &[Bar]) -> f64 {
    bars.iter()
        .filter_map(|b| b.value)
        .fold(0.0, f64::max)
}
