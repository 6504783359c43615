//! Parsed catalogue data
//!
//! Everything in here lives for one pipeline run only; nothing is persisted
//! directly from these types.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// (global id, local id, name) triple identifying a supplier, manufacturer or
/// brand inside the feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyIdentity {
    /// GLN, may be empty for brands
    pub gln: String,

    /// Local number with leading zeros stripped
    pub local_id: String,

    pub name: String,
}

impl PartyIdentity {
    pub fn is_empty(&self) -> bool {
        self.gln.is_empty() && self.local_id.is_empty() && self.name.is_empty()
    }
}

/// Natural key of a brand: (manufacturer GLN, brand name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrandKey {
    pub manufacturer_gln: String,
    pub brand_name: String,
}

impl BrandKey {
    pub fn new(manufacturer_gln: impl Into<String>, brand_name: impl Into<String>) -> Self {
        Self {
            manufacturer_gln: manufacturer_gln.into(),
            brand_name: brand_name.into(),
        }
    }
}

/// One catalogue data row
///
/// Numeric fields hold dot-decimal text exactly as validated by the parser;
/// exporters reformat them for their target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Physical line number in the source file
    pub line: u64,

    pub ean: String,
    pub supplier_article_number: String,
    pub manufacturer_article_number: String,

    pub short_description: String,
    pub description: String,
    pub long_description: String,
    pub marketing_text: String,
    pub keywords: String,
    pub article_group: String,
    pub series: String,

    pub supplier: PartyIdentity,
    pub manufacturer: PartyIdentity,
    pub brand: PartyIdentity,

    pub recommended_price: String,
    pub net_price: String,
    pub currency: String,
    pub vat_rate: String,
    pub price_unit: String,
    pub order_unit: String,
    pub min_order_quantity: String,
    pub packaging_quantity: String,

    pub weight: String,
    pub weight_unit: String,
    pub length: String,
    pub width: String,
    pub height: String,
    pub dimension_unit: String,
    pub delivery_time: String,

    pub image_url: String,

    pub customs_code: String,
    pub origin_country: String,
    pub status: String,
    pub age_recommendation: String,
    pub valid_from: String,
    pub battery_required: String,
}

impl ArticleRecord {
    /// Brand key this article refers to, when both parts are known
    pub fn brand_key(&self) -> Option<BrandKey> {
        if self.manufacturer.gln.is_empty() || self.brand.name.is_empty() {
            return None;
        }
        Some(BrandKey::new(&self.manufacturer.gln, &self.brand.name))
    }
}

/// Text encoding the feed was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SourceEncoding {
    #[default]
    Utf8,
    Latin1,
    Windows1252,
}

impl SourceEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Latin1 => "iso-8859-1",
            SourceEncoding::Windows1252 => "windows-1252",
        }
    }
}

/// Result of parsing one feed
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogueBatch {
    /// Header row as it appeared in the file
    pub header_line: Option<String>,

    pub articles: Vec<ArticleRecord>,

    pub supplier: Option<PartyIdentity>,

    /// Unique manufacturers keyed by GLN, in first-seen order
    pub manufacturers: IndexMap<String, PartyIdentity>,

    /// Unique (manufacturer GLN, brand name) pairs, in first-seen order
    pub brands: IndexSet<BrandKey>,

    /// Deduplicated image URLs, in first-seen order
    pub image_urls: Vec<String>,

    /// One entry per skipped row, `row {n}: {reason}`
    pub errors: Vec<String>,

    /// Data rows encountered, parsed or not
    pub rows_seen: usize,

    pub rows_skipped: usize,

    pub encoding: SourceEncoding,
}

impl CatalogueBatch {
    /// Empty batch carrying a single fatal error
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }
}
