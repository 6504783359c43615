//! Output files of a run: the Elena import CSV and the XLSX run report

pub mod report;
pub mod target_csv;

use serde::Serialize;
use std::path::PathBuf;

pub use report::ReportExporter;
pub use target_csv::{BrandCodeLookup, TargetCsvExporter, TARGET_COLUMNS};

/// Result of writing one output file
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportOutcome {
    pub success: bool,
    pub path: Option<PathBuf>,
    pub rows_exported: usize,
    pub sheets_created: usize,
    pub errors: Vec<String>,
}

impl ExportOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
            ..Self::default()
        }
    }
}

/// Convert a dot-decimal number to the German comma notation.
///
/// Empty input stays empty; anything that is not a number is an error.
pub fn comma_decimal(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(String::new());
    }

    value
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a decimal", value))?;
    Ok(value.replace('.', ","))
}

/// Render a computed number with at most six decimals, comma separated
pub fn format_decimal(value: f64) -> String {
    let fixed = format!("{:.6}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    trimmed.replace('.', ",")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_decimal() {
        assert_eq!(comma_decimal("12.99").unwrap(), "12,99");
        assert_eq!(comma_decimal("7").unwrap(), "7");
        assert_eq!(comma_decimal("").unwrap(), "");
        assert!(comma_decimal("1.2.3").is_err());
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(0.5), "0,5");
        assert_eq!(format_decimal(2.0), "2");
        assert_eq!(format_decimal(1.234), "1,234");
    }
}
