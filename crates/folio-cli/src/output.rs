//! Output formatting utilities.

use colored::Colorize;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

use folio_portfolio::RiskMetrics;

use crate::cli::OutputFormat;

/// Formats and prints rows based on the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => print_table(data),
        OutputFormat::Json => print_json(data),
        OutputFormat::Csv => print_csv(data),
        OutputFormat::Minimal => print_minimal(data),
    }
}

/// Prints a single document as pretty JSON.
pub fn print_json_document<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Prints data as a formatted table.
fn print_table<T: Tabled>(data: &[T]) -> anyhow::Result<()> {
    if data.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let table = Table::new(data)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::left()))
        .to_string();

    println!("{}", table);
    Ok(())
}

/// Prints data as JSON.
fn print_json<T: Serialize>(data: &[T]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Prints data as CSV.
fn print_csv<T: Serialize>(data: &[T]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for item in data {
        wtr.serialize(item)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Prints one compact JSON line per row.
fn print_minimal<T: Serialize>(data: &[T]) -> anyhow::Result<()> {
    for item in data {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}

/// Formats a fraction as a percentage string.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Formats an optional ratio, `n/a` when undefined.
pub fn format_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

/// Prints a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Prints an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Prints a warning message.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message);
}

/// Prints a header for a section.
pub fn print_header(title: &str) {
    println!("\n{}", title.bold().underline());
}

// =============================================================================
// ROWS
// =============================================================================

/// A key-value pair for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct KeyValue {
    #[tabled(rename = "Metric")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a key-value pair formatted as percentage.
    pub fn from_percent(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, format_percent(value))
    }

    /// Creates a key-value pair from an optional percentage.
    pub fn from_optional_percent(key: impl Into<String>, value: Option<f64>) -> Self {
        Self::new(key, value.map_or_else(|| "n/a".to_string(), format_percent))
    }

    /// Creates a key-value pair from an optional ratio.
    pub fn from_ratio(key: impl Into<String>, value: Option<f64>) -> Self {
        Self::new(key, format_ratio(value))
    }
}

/// Weight of one asset.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct WeightRow {
    #[tabled(rename = "Symbol")]
    pub symbol: String,
    #[tabled(rename = "Weight", display_with = "display_percent")]
    pub weight: f64,
    #[tabled(rename = "Risk Contribution", display_with = "display_percent")]
    pub risk_contribution: f64,
}

fn display_percent(value: &f64) -> String {
    format_percent(*value)
}

/// Rows for the standard risk metrics.
pub fn metric_rows(metrics: &RiskMetrics) -> Vec<KeyValue> {
    let confidence = format!("{:.0}%", metrics.confidence_level * 100.0);
    let mut rows = vec![
        KeyValue::from_percent("Expected Return", metrics.expected_return),
        KeyValue::from_percent("Volatility", metrics.volatility),
        KeyValue::from_ratio("Sharpe Ratio", metrics.sharpe_ratio),
        KeyValue::from_ratio("Sortino Ratio", metrics.sortino_ratio),
        KeyValue::from_percent(format!("VaR ({})", confidence), metrics.value_at_risk),
        KeyValue::from_percent(
            format!("CVaR ({})", confidence),
            metrics.conditional_value_at_risk,
        ),
        KeyValue::from_optional_percent("Max Drawdown", metrics.max_drawdown),
    ];
    if metrics.beta.is_some() {
        rows.extend([
            KeyValue::from_ratio("Beta", metrics.beta),
            KeyValue::from_optional_percent("Alpha", metrics.alpha),
            KeyValue::from_optional_percent("Tracking Error", metrics.tracking_error),
            KeyValue::from_ratio("Information Ratio", metrics.information_ratio),
        ]);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.1234), "12.34%");
        assert_eq!(format_ratio(None), "n/a");
        assert_eq!(format_ratio(Some(1.5)), "1.5000");
    }

    #[test]
    fn test_benchmark_rows_only_with_benchmark() {
        let mut metrics = RiskMetrics {
            confidence_level: 0.95,
            ..Default::default()
        };
        let without = metric_rows(&metrics).len();
        metrics.beta = Some(1.0);
        assert_eq!(metric_rows(&metrics).len(), without + 4);
        assert!(metric_rows(&metrics)[4].key.contains("95%"));
    }
}
