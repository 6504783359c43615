//! Run report workbook

use chrono::Utc;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::{info, warn};

use super::ExportOutcome;
use crate::storage::{Brand, Manufacturer, Supplier};

const MAX_COLUMN_WIDTH: usize = 60;
const MIN_COLUMN_WIDTH: usize = 8;

/// Writes the XLSX summary of one conversion
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportExporter;

impl ReportExporter {
    pub fn new() -> Self {
        Self
    }

    /// Write the workbook: a summary sheet, then one sheet per non-empty
    /// entity list.
    pub fn export(
        &self,
        supplier: Option<&Supplier>,
        manufacturers: &[Manufacturer],
        brands: &[Brand],
        output_path: &Path,
        article_count: usize,
    ) -> ExportOutcome {
        let result = self.write(supplier, manufacturers, brands, output_path, article_count);

        match result {
            Ok(sheets) => {
                info!(path = %output_path.display(), sheets, "Report written");
                ExportOutcome {
                    success: true,
                    path: Some(output_path.to_path_buf()),
                    rows_exported: article_count,
                    sheets_created: sheets,
                    errors: Vec::new(),
                }
            },
            Err(e) => {
                warn!(path = %output_path.display(), error = %e, "Report export failed");
                ExportOutcome::failed(format!("Cannot write report {}: {}", output_path.display(), e))
            },
        }
    }

    fn write(
        &self,
        supplier: Option<&Supplier>,
        manufacturers: &[Manufacturer],
        brands: &[Brand],
        output_path: &Path,
        article_count: usize,
    ) -> crate::error::Result<usize> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let mut sheets = 0;

        let supplier_name = supplier.map(|s| s.name.clone()).unwrap_or_default();
        let summary = vec![
            vec!["Generated".to_string(), Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()],
            vec!["Supplier".to_string(), supplier_name],
            vec!["Articles".to_string(), article_count.to_string()],
            vec!["Manufacturers".to_string(), manufacturers.len().to_string()],
            vec!["Brands".to_string(), brands.len().to_string()],
        ];
        write_sheet(workbook.add_worksheet(), "Summary", &["Key", "Value"], &summary, &bold)?;
        sheets += 1;

        if let Some(supplier) = supplier {
            let rows = vec![vec![
                supplier.id.to_string(),
                supplier.gln.clone().unwrap_or_default(),
                supplier.supplier_number.clone().unwrap_or_default(),
                supplier.name.clone(),
                if supplier.active { "yes" } else { "no" }.to_string(),
                supplier.source_filename.clone().unwrap_or_default(),
            ]];
            write_sheet(
                workbook.add_worksheet(),
                "Supplier",
                &["ID", "GLN", "Number", "Name", "Active", "Source file"],
                &rows,
                &bold,
            )?;
            sheets += 1;
        }

        if !manufacturers.is_empty() {
            let rows: Vec<Vec<String>> = manufacturers
                .iter()
                .map(|m| {
                    vec![
                        m.id.to_string(),
                        m.gln.clone(),
                        m.manufacturer_number.clone().unwrap_or_default(),
                        m.name.clone(),
                    ]
                })
                .collect();
            write_sheet(
                workbook.add_worksheet(),
                "Manufacturers",
                &["ID", "GLN", "Number", "Name"],
                &rows,
                &bold,
            )?;
            sheets += 1;
        }

        if !brands.is_empty() {
            let rows: Vec<Vec<String>> = brands
                .iter()
                .map(|b| {
                    vec![
                        b.id.to_string(),
                        b.manufacturer_id.to_string(),
                        b.code.clone(),
                        b.name.clone(),
                    ]
                })
                .collect();
            write_sheet(
                workbook.add_worksheet(),
                "Brands",
                &["ID", "Manufacturer ID", "Code", "Name"],
                &rows,
                &bold,
            )?;
            sheets += 1;
        }

        workbook.save(output_path)?;
        Ok(sheets)
    }
}

fn write_sheet(
    sheet: &mut Worksheet,
    name: &str,
    headers: &[&str],
    rows: &[Vec<String>],
    bold: &Format,
) -> Result<(), XlsxError> {
    sheet.set_name(name)?;

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, bold)?;
    }

    for (row_index, row) in rows.iter().enumerate() {
        let row_number = (row_index + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            sheet.write_string(row_number, col as u16, value)?;
            if let Some(width) = widths.get_mut(col) {
                *width = (*width).max(value.chars().count());
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let width = (*width + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH);
        sheet.set_column_width(col as u16, width as f64)?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn supplier() -> Supplier {
        let now = Utc::now();
        Supplier {
            id: 7,
            gln: Some("4012345000009".to_string()),
            supplier_number: Some("1872".to_string()),
            name: "Lego Spielwaren GmbH".to_string(),
            active: false,
            source_filename: None,
            last_converted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_summary_and_supplier_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("report.xlsx");

        let outcome = ReportExporter::new().export(Some(&supplier()), &[], &[], &path, 3);

        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(outcome.sheets_created, 2);
        assert!(path.exists());
    }

    #[test]
    fn test_all_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let now = Utc::now();
        let manufacturers = vec![Manufacturer {
            id: 1,
            gln: "5701234000004".to_string(),
            manufacturer_number: None,
            name: "LEGO A/S".to_string(),
            created_at: now,
            updated_at: now,
        }];
        let brands = vec![Brand {
            id: 2,
            manufacturer_id: 1,
            name: "LEGO City".to_string(),
            code: "5701234000004_1".to_string(),
            created_at: now,
        }];

        let outcome =
            ReportExporter::new().export(Some(&supplier()), &manufacturers, &brands, &path, 1);
        assert_eq!(outcome.sheets_created, 4);
    }

    #[test]
    fn test_failure_is_single_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let outcome = ReportExporter::new().export(None, &[], &[], &blocker.join("r.xlsx"), 0);
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
    }
}
