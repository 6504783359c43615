//! Elena import CSV
//!
//! 90 fixed columns in the order the Elena importer expects, `;` separated,
//! German decimal notation. Columns without a PRICAT counterpart are written
//! with their fixed default.

use csv::{QuoteStyle, WriterBuilder};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::{comma_decimal, format_decimal, ExportOutcome};
use crate::images::file_name_from_url;
use crate::models::{ArticleRecord, BrandKey, CatalogueBatch};

/// Brand code per (manufacturer GLN, brand name)
pub type BrandCodeLookup = HashMap<BrandKey, String>;

type Getter = for<'a> fn(&'a ArticleRecord) -> &'a str;

/// How a target column is filled
#[derive(Clone, Copy)]
pub enum Cell {
    /// Copied verbatim
    Text(Getter),
    /// Decimal reformatted to comma notation
    Decimal(Getter),
    /// Weight, grams converted to kilograms
    Weight,
    /// Weight unit matching [`Cell::Weight`]
    WeightUnit,
    /// File name part of the image URL
    ImageFile,
    /// Brand code from the lookup
    BrandCode,
    /// Constant default
    Fixed(&'static str),
}

pub const TARGET_COLUMNS: &[(&str, Cell)] = &[
    ("Artikelnummer", Cell::Text(|a| &a.supplier_article_number)),
    ("EAN", Cell::Text(|a| &a.ean)),
    ("Herstellerartikelnummer", Cell::Text(|a| &a.manufacturer_article_number)),
    ("Bezeichnung", Cell::Text(|a| &a.short_description)),
    ("Bezeichnung2", Cell::Text(|a| &a.description)),
    ("Langtext", Cell::Text(|a| &a.long_description)),
    ("Werbetext", Cell::Text(|a| &a.marketing_text)),
    ("Suchbegriffe", Cell::Text(|a| &a.keywords)),
    ("Warengruppe", Cell::Text(|a| &a.article_group)),
    ("Serie", Cell::Text(|a| &a.series)),
    ("Hersteller", Cell::Text(|a| &a.manufacturer.name)),
    ("Hersteller_GLN", Cell::Text(|a| &a.manufacturer.gln)),
    ("Herstellernummer", Cell::Text(|a| &a.manufacturer.local_id)),
    ("Marke", Cell::Text(|a| &a.brand.name)),
    ("Marken_Globalcode", Cell::BrandCode),
    ("Lieferant", Cell::Text(|a| &a.supplier.name)),
    ("Lieferant_GLN", Cell::Text(|a| &a.supplier.gln)),
    ("Lieferantennummer", Cell::Text(|a| &a.supplier.local_id)),
    ("Lieferantenartikelnummer", Cell::Text(|a| &a.supplier_article_number)),
    ("UVP", Cell::Decimal(|a| &a.recommended_price)),
    ("EK_Netto", Cell::Decimal(|a| &a.net_price)),
    ("Waehrung", Cell::Text(|a| &a.currency)),
    ("MwSt_Satz", Cell::Decimal(|a| &a.vat_rate)),
    ("Preiseinheit", Cell::Decimal(|a| &a.price_unit)),
    ("Bestelleinheit", Cell::Text(|a| &a.order_unit)),
    ("Mindestbestellmenge", Cell::Decimal(|a| &a.min_order_quantity)),
    ("Verpackungseinheit", Cell::Decimal(|a| &a.packaging_quantity)),
    ("Mengeneinheit", Cell::Fixed("Stck")),
    ("Gewicht", Cell::Weight),
    ("Gewichtseinheit", Cell::WeightUnit),
    ("Laenge", Cell::Decimal(|a| &a.length)),
    ("Breite", Cell::Decimal(|a| &a.width)),
    ("Hoehe", Cell::Decimal(|a| &a.height)),
    ("Masseinheit", Cell::Text(|a| &a.dimension_unit)),
    ("Lieferzeit", Cell::Text(|a| &a.delivery_time)),
    ("Zolltarifnummer", Cell::Text(|a| &a.customs_code)),
    ("Ursprungsland", Cell::Text(|a| &a.origin_country)),
    ("Artikelstatus", Cell::Text(|a| &a.status)),
    ("Altersempfehlung", Cell::Text(|a| &a.age_recommendation)),
    ("Gueltig_ab", Cell::Text(|a| &a.valid_from)),
    ("Batterie_erforderlich", Cell::Text(|a| &a.battery_required)),
    ("Bild1", Cell::ImageFile),
    ("Bild2", Cell::Fixed("")),
    ("Bild3", Cell::Fixed("")),
    ("Bild4", Cell::Fixed("")),
    ("Bild5", Cell::Fixed("")),
    ("Bild_URL", Cell::Text(|a| &a.image_url)),
    ("Aktiv", Cell::Fixed("1")),
    ("Lagerartikel", Cell::Fixed("1")),
    ("Bestellbar", Cell::Fixed("1")),
    ("Rabattfaehig", Cell::Fixed("1")),
    ("Skontofaehig", Cell::Fixed("1")),
    ("Verkaufseinheit", Cell::Fixed("Stck")),
    ("Inhalt", Cell::Fixed("1")),
    ("Inhaltseinheit", Cell::Fixed("Stck")),
    ("Grundpreiseinheit", Cell::Fixed("")),
    ("Grundpreisfaktor", Cell::Fixed("")),
    ("Lagerort", Cell::Fixed("")),
    ("Lagerplatz", Cell::Fixed("")),
    ("Mindestbestand", Cell::Fixed("")),
    ("Meldebestand", Cell::Fixed("")),
    ("Hoechstbestand", Cell::Fixed("")),
    ("Kostenstelle", Cell::Fixed("")),
    ("Erloeskonto", Cell::Fixed("")),
    ("Aufwandskonto", Cell::Fixed("")),
    ("Steuerschluessel", Cell::Fixed("")),
    ("Provisionsgruppe", Cell::Fixed("")),
    ("Preisgruppe", Cell::Fixed("")),
    ("Rabattgruppe", Cell::Fixed("")),
    ("Sonderpreis", Cell::Fixed("")),
    ("Sonderpreis_ab", Cell::Fixed("")),
    ("Sonderpreis_bis", Cell::Fixed("")),
    ("Staffelmenge1", Cell::Fixed("")),
    ("Staffelpreis1", Cell::Fixed("")),
    ("Staffelmenge2", Cell::Fixed("")),
    ("Staffelpreis2", Cell::Fixed("")),
    ("Webshop", Cell::Fixed("1")),
    ("Webshop_Kategorie", Cell::Fixed("")),
    ("Meta_Titel", Cell::Fixed("")),
    ("Meta_Beschreibung", Cell::Fixed("")),
    ("Freitext1", Cell::Fixed("")),
    ("Freitext2", Cell::Fixed("")),
    ("Freitext3", Cell::Fixed("")),
    ("Freitext4", Cell::Fixed("")),
    ("Freitext5", Cell::Fixed("")),
    ("Bemerkung", Cell::Fixed("")),
    ("Seriennummernpflicht", Cell::Fixed("")),
    ("Chargenpflicht", Cell::Fixed("")),
    ("Importstatus", Cell::Fixed("1")),
];

/// Writes the Elena import CSV
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetCsvExporter;

impl TargetCsvExporter {
    pub fn new() -> Self {
        Self
    }

    /// Write `batch` to `output_path`.
    ///
    /// Rows that cannot be mapped are skipped and listed in the outcome's
    /// errors; only failing to create or write the file fails the export.
    pub fn export(
        &self,
        batch: &CatalogueBatch,
        brand_codes: &BrandCodeLookup,
        output_path: &Path,
    ) -> ExportOutcome {
        match self.write(batch, brand_codes, output_path) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(path = %output_path.display(), error = %e, "Target CSV export failed");
                ExportOutcome::failed(format!(
                    "Cannot write {}: {}",
                    output_path.display(),
                    e
                ))
            },
        }
    }

    fn write(
        &self,
        batch: &CatalogueBatch,
        brand_codes: &BrandCodeLookup,
        output_path: &Path,
    ) -> crate::error::Result<ExportOutcome> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .quote_style(QuoteStyle::Necessary)
            .from_path(output_path)?;

        writer.write_record(TARGET_COLUMNS.iter().map(|(name, _)| *name))?;

        let mut outcome = ExportOutcome {
            path: Some(output_path.to_path_buf()),
            ..ExportOutcome::default()
        };

        for article in &batch.articles {
            match map_row(article, brand_codes) {
                Ok(row) => {
                    writer.write_record(&row)?;
                    outcome.rows_exported += 1;
                },
                Err(message) => {
                    warn!(row = article.line, reason = %message, "Article not exported");
                    outcome.errors.push(format!("row {}: {}", article.line, message));
                },
            }
        }

        writer.flush()?;
        outcome.success = true;

        info!(
            path = %output_path.display(),
            rows = outcome.rows_exported,
            skipped = outcome.errors.len(),
            "Target CSV written"
        );

        Ok(outcome)
    }
}

/// Map one article to the target column values
pub fn map_row(article: &ArticleRecord, brand_codes: &BrandCodeLookup) -> Result<Vec<String>, String> {
    TARGET_COLUMNS
        .iter()
        .map(|(name, cell)| {
            map_cell(article, *cell, brand_codes).map_err(|e| format!("column {}: {}", name, e))
        })
        .collect()
}

fn map_cell(article: &ArticleRecord, cell: Cell, brand_codes: &BrandCodeLookup) -> Result<String, String> {
    match cell {
        Cell::Text(get) => Ok(get(article).to_string()),
        Cell::Decimal(get) => comma_decimal(get(article)),
        Cell::Weight => {
            if is_grams(article) && !article.weight.is_empty() {
                let grams: f64 = article
                    .weight
                    .parse()
                    .map_err(|_| format!("'{}' is not a weight", article.weight))?;
                Ok(format_decimal(grams / 1000.0))
            } else {
                Ok(article.weight.clone())
            }
        },
        Cell::WeightUnit => {
            if is_grams(article) && !article.weight.is_empty() {
                Ok("KG".to_string())
            } else {
                Ok(article.weight_unit.clone())
            }
        },
        Cell::ImageFile => Ok(image_file_name(&article.image_url)),
        Cell::BrandCode => Ok(article
            .brand_key()
            .and_then(|key| brand_codes.get(&key).cloned())
            .unwrap_or_default()),
        Cell::Fixed(value) => Ok(value.to_string()),
    }
}

/// Only the exact unit `G` is converted; `g` or `KG` pass through
fn is_grams(article: &ArticleRecord) -> bool {
    article.weight_unit == "G"
}

/// Name the image fetcher stores the URL under, so `Bild1` always points at
/// a file of the package
pub fn image_file_name(url: &str) -> String {
    file_name_from_url(url).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::PartyIdentity;

    fn column(name: &str) -> usize {
        TARGET_COLUMNS.iter().position(|(n, _)| *n == name).unwrap()
    }

    fn article() -> ArticleRecord {
        ArticleRecord {
            line: 2,
            ean: "5702017154268".to_string(),
            supplier_article_number: "60198".to_string(),
            manufacturer: PartyIdentity {
                gln: "5701234000004".to_string(),
                local_id: String::new(),
                name: "LEGO A/S".to_string(),
            },
            brand: PartyIdentity {
                name: "LEGO City".to_string(),
                ..PartyIdentity::default()
            },
            recommended_price: "99.99".to_string(),
            weight: "500".to_string(),
            weight_unit: "G".to_string(),
            image_url: "https://img.example.com/lego/60198.jpg".to_string(),
            ..ArticleRecord::default()
        }
    }

    #[test]
    fn test_column_count() {
        assert_eq!(TARGET_COLUMNS.len(), 90);
    }

    #[test]
    fn test_map_row() {
        let mut codes = BrandCodeLookup::new();
        codes.insert(BrandKey::new("5701234000004", "LEGO City"), "5701234000004_1".to_string());

        let row = map_row(&article(), &codes).unwrap();

        assert_eq!(row.len(), TARGET_COLUMNS.len());
        assert_eq!(row[column("UVP")], "99,99");
        assert_eq!(row[column("Gewicht")], "0,5");
        assert_eq!(row[column("Gewichtseinheit")], "KG");
        assert_eq!(row[column("Bild1")], "60198.jpg");
        assert_eq!(row[column("Marken_Globalcode")], "5701234000004_1");
        assert_eq!(row[column("Mengeneinheit")], "Stck");
        assert_eq!(row[column("Aktiv")], "1");
        assert_eq!(row[column("Lagerort")], "");
    }

    #[test]
    fn test_weight_other_unit_passes_through() {
        let mut a = article();
        a.weight = "1.5".to_string();
        a.weight_unit = "KG".to_string();

        let row = map_row(&a, &BrandCodeLookup::new()).unwrap();
        assert_eq!(row[column("Gewicht")], "1.5");
        assert_eq!(row[column("Gewichtseinheit")], "KG");
        assert_eq!(row[column("Marken_Globalcode")], "");
    }

    #[test]
    fn test_lowercase_gram_unit_is_not_converted() {
        let mut a = article();
        a.weight_unit = "g".to_string();

        let row = map_row(&a, &BrandCodeLookup::new()).unwrap();
        assert_eq!(row[column("Gewicht")], "500");
        assert_eq!(row[column("Gewichtseinheit")], "g");
    }

    #[test]
    fn test_image_name_matches_downloaded_file() {
        let mut a = article();
        a.image_url = "https://img.example.com/lego/60198.jpg?v=3#zoom".to_string();

        let row = map_row(&a, &BrandCodeLookup::new()).unwrap();
        assert_eq!(row[column("Bild1")], "60198.jpg");
        assert_eq!(
            Some(row[column("Bild1")].clone()),
            file_name_from_url(&a.image_url)
        );
    }

    #[test]
    fn test_unmappable_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("elena.csv");

        let mut bad = article();
        bad.line = 3;
        bad.net_price = "n/a".to_string();
        let batch = CatalogueBatch {
            articles: vec![article(), bad, article()],
            ..CatalogueBatch::default()
        };

        let outcome = TargetCsvExporter::new().export(&batch, &BrandCodeLookup::new(), &path);

        assert!(outcome.success);
        assert_eq!(outcome.rows_exported, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("row 3: column EK_Netto"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("Artikelnummer;EAN;"));
    }

    #[test]
    fn test_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let outcome = TargetCsvExporter::new().export(
            &CatalogueBatch::default(),
            &BrandCodeLookup::new(),
            &blocker.join("elena.csv"),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
    }
}
