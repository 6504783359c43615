//! PRICAT catalogue parser
//!
//! Reads a `;`-separated feed into a [`CatalogueBatch`]. Rows starting with
//! `H` are headers, rows starting with `P` are articles, everything else is
//! ignored. Every physical line is one record, so a broken quote cannot pull
//! the following lines into its row. A malformed article row is skipped and
//! reported; it never stops the rest of the file from being read.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricat_import::parser::CatalogueParser;
//!
//! let batch = CatalogueParser::new().parse(Path::new("imports/pricat_1872.csv"));
//! println!("{} articles, {} skipped", batch.articles.len(), batch.rows_skipped);
//! ```

pub mod encoding;
pub mod schema;

use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexSet;
use pricat_common::types::{strip_leading_zeros, Gln};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::ImportError;
use crate::models::{ArticleRecord, CatalogueBatch, PartyIdentity};
use schema::{field, Column, DATA_MARKER, DELIMITER, HEADER_MARKER, QUOTE};

/// Parser for PRICAT feeds
#[derive(Debug, Clone)]
pub struct CatalogueParser {
    sample_lines: usize,
}

impl Default for CatalogueParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogueParser {
    pub fn new() -> Self {
        Self {
            sample_lines: encoding::DEFAULT_SAMPLE_LINES,
        }
    }

    /// Number of lines used for encoding detection
    pub fn with_sample_lines(mut self, lines: usize) -> Self {
        self.sample_lines = lines.max(1);
        self
    }

    /// Parse a feed file.
    ///
    /// A missing or unreadable file yields an empty batch with one error.
    pub fn parse(&self, path: &Path) -> CatalogueBatch {
        match std::fs::read(path) {
            Ok(data) => {
                info!(path = %path.display(), bytes = data.len(), "Parsing catalogue");
                self.parse_bytes(&data)
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Catalogue file not readable");
                CatalogueBatch::failed(format!("Cannot read {}: {}", path.display(), e))
            },
        }
    }

    /// Parse raw feed bytes
    pub fn parse_bytes(&self, data: &[u8]) -> CatalogueBatch {
        let (text, encoding) = encoding::decode_detected(data, self.sample_lines);
        debug!(encoding = encoding.as_str(), "Detected feed encoding");

        let mut batch = CatalogueBatch {
            encoding,
            ..CatalogueBatch::default()
        };
        let mut image_urls = IndexSet::new();

        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(DELIMITER)
            .quote(QUOTE)
            .has_headers(false)
            .flexible(true);

        for (index, raw) in text.lines().enumerate() {
            let line = index as u64 + 1;

            match record_type(raw) {
                HEADER_MARKER => {
                    if batch.header_line.is_none() {
                        batch.header_line = Some(raw.to_string());
                    }
                },
                DATA_MARKER => {
                    batch.rows_seen += 1;
                    let parsed = read_line(&builder, line, raw)
                        .and_then(|record| parse_article(line, &record));
                    match parsed {
                        Ok(article) => collect(&mut batch, &mut image_urls, article),
                        Err(e) => skip_row(&mut batch, line, e_message(e)),
                    }
                },
                _ => {},
            }
        }

        batch.image_urls = image_urls.into_iter().collect();

        info!(
            articles = batch.articles.len(),
            skipped = batch.rows_skipped,
            manufacturers = batch.manufacturers.len(),
            brands = batch.brands.len(),
            images = batch.image_urls.len(),
            "Catalogue parsed"
        );

        batch
    }
}

fn e_message(err: ImportError) -> String {
    match err {
        ImportError::RowParse { message, .. } => message,
        other => other.to_string(),
    }
}

fn skip_row(batch: &mut CatalogueBatch, line: u64, message: String) {
    warn!(row = line, reason = %message, "Skipping catalogue row");
    batch.rows_skipped += 1;
    batch.errors.push(format!("row {}: {}", line, message));
}

/// First cell of a raw line, unquoted
fn record_type(raw: &str) -> &str {
    raw.split(DELIMITER as char)
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(QUOTE as char)
}

/// Read one physical line as one record; records never span lines
fn read_line(builder: &ReaderBuilder, line: u64, raw: &str) -> Result<StringRecord, ImportError> {
    let row_err = |message: String| ImportError::RowParse { row: line, message };

    if has_unterminated_quote(raw) {
        return Err(row_err("unterminated quoted field".to_string()));
    }

    let mut record = StringRecord::new();
    match builder.from_reader(raw.as_bytes()).read_record(&mut record) {
        Ok(true) => Ok(record),
        Ok(false) => Err(row_err("empty row".to_string())),
        Err(e) => Err(row_err(e.to_string())),
    }
}

/// Whether a field opened with a quote is still open at the end of the line
fn has_unterminated_quote(raw: &str) -> bool {
    let quote = QUOTE as char;
    let delimiter = DELIMITER as char;

    let mut chars = raw.chars().peekable();
    let mut field_start = true;
    let mut quoted = false;

    while let Some(c) = chars.next() {
        if quoted {
            if c == quote {
                if chars.peek() == Some(&quote) {
                    chars.next();
                } else {
                    quoted = false;
                }
            }
        } else if field_start && c == quote {
            quoted = true;
            field_start = false;
        } else {
            field_start = c == delimiter;
        }
    }

    quoted
}

/// Fold a parsed article into the batch's identity sets
fn collect(batch: &mut CatalogueBatch, image_urls: &mut IndexSet<String>, article: ArticleRecord) {
    if !article.supplier.is_empty() {
        match &batch.supplier {
            None => batch.supplier = Some(article.supplier.clone()),
            Some(first) if first.gln != article.supplier.gln => {
                warn!(
                    row = article.line,
                    expected = %first.gln,
                    found = %article.supplier.gln,
                    "Row names a different supplier than the first article"
                );
            },
            Some(_) => {},
        }
    }

    if !article.manufacturer.gln.is_empty() {
        let entry = batch
            .manufacturers
            .entry(article.manufacturer.gln.clone())
            .or_insert_with(|| article.manufacturer.clone());
        if entry.name.is_empty() && !article.manufacturer.name.is_empty() {
            entry.name = article.manufacturer.name.clone();
        }
    }

    if let Some(key) = article.brand_key() {
        batch.brands.insert(key);
    }

    if !article.image_url.is_empty() {
        image_urls.insert(article.image_url.clone());
    }

    batch.articles.push(article);
}

/// Turn one `P` row into an article
pub fn parse_article(line: u64, record: &StringRecord) -> Result<ArticleRecord, ImportError> {
    let row_err = |message: String| ImportError::RowParse { row: line, message };

    let ean = field(record, Column::Ean).to_string();
    let supplier_article_number = field(record, Column::SupplierArticleNumber).to_string();

    if ean.is_empty() && supplier_article_number.is_empty() {
        return Err(row_err("neither EAN nor supplier article number present".to_string()));
    }
    if !ean.is_empty() && !ean.bytes().all(|b| b.is_ascii_digit()) {
        return Err(row_err(format!("invalid EAN '{}'", ean)));
    }

    let decimal = |column: Column| {
        normalize_decimal(field(record, column))
            .map_err(|value| row_err(format!("invalid {} '{}'", column.name(), value)))
    };

    Ok(ArticleRecord {
        line,
        supplier: party(record, Column::SupplierGln, Column::SupplierNumber, Column::SupplierName)
            .map_err(row_err)?,
        manufacturer: party(
            record,
            Column::ManufacturerGln,
            Column::ManufacturerNumber,
            Column::ManufacturerName,
        )
        .map_err(row_err)?,
        brand: PartyIdentity {
            gln: field(record, Column::BrandId).to_string(),
            local_id: strip_leading_zeros(field(record, Column::BrandNumber)),
            name: field(record, Column::BrandName).to_string(),
        },
        ean,
        supplier_article_number,
        manufacturer_article_number: field(record, Column::ManufacturerArticleNumber).to_string(),
        short_description: field(record, Column::ShortDescription).to_string(),
        description: field(record, Column::Description).to_string(),
        long_description: field(record, Column::LongDescription).to_string(),
        marketing_text: field(record, Column::MarketingText).to_string(),
        keywords: field(record, Column::Keywords).to_string(),
        article_group: field(record, Column::ArticleGroup).to_string(),
        series: field(record, Column::Series).to_string(),
        recommended_price: decimal(Column::RecommendedPrice)?,
        net_price: decimal(Column::NetPrice)?,
        currency: field(record, Column::Currency).to_uppercase(),
        vat_rate: decimal(Column::VatRate)?,
        price_unit: decimal(Column::PriceUnit)?,
        order_unit: field(record, Column::OrderUnit).to_string(),
        min_order_quantity: decimal(Column::MinOrderQuantity)?,
        packaging_quantity: decimal(Column::PackagingQuantity)?,
        weight: decimal(Column::Weight)?,
        weight_unit: field(record, Column::WeightUnit).to_string(),
        length: decimal(Column::Length)?,
        width: decimal(Column::Width)?,
        height: decimal(Column::Height)?,
        dimension_unit: field(record, Column::DimensionUnit).to_uppercase(),
        delivery_time: field(record, Column::DeliveryTime).to_string(),
        image_url: field(record, Column::PrimaryImageUrl).to_string(),
        customs_code: field(record, Column::CustomsCode).to_string(),
        origin_country: field(record, Column::OriginCountry).to_uppercase(),
        status: field(record, Column::Status).to_string(),
        age_recommendation: field(record, Column::AgeRecommendation).to_string(),
        valid_from: field(record, Column::ValidFrom).to_string(),
        battery_required: field(record, Column::BatteryRequired).to_string(),
    })
}

fn party(
    record: &StringRecord,
    gln: Column,
    number: Column,
    name: Column,
) -> Result<PartyIdentity, String> {
    let raw_gln = field(record, gln);
    let gln_value = if raw_gln.is_empty() {
        String::new()
    } else {
        Gln::parse(raw_gln).map_err(|e| e.to_string())?.to_string()
    };

    Ok(PartyIdentity {
        gln: gln_value,
        local_id: strip_leading_zeros(field(record, number)),
        name: field(record, name).to_string(),
    })
}

/// Normalize a decimal to dot notation.
///
/// Accepts `12.5`, `12,5`, `1.234,56` and `1,234.56`. Empty input stays
/// empty. Returns the offending input when it is not a number.
pub fn normalize_decimal(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(String::new());
    }

    let normalized = match (value.rfind(','), value.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => value.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => value.replace(',', ""),
        (Some(_), None) => value.replace(',', "."),
        _ => value.to_string(),
    };

    match normalized.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(normalized),
        _ => Err(value.to_string()),
    }
}
