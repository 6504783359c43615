//! Positional layout of PRICAT rows
//!
//! Data rows carry 146 columns. Only the columns the import consumes are named
//! here; the gaps are reserved or free-text fields the Elena package ignores.

use csv::StringRecord;

/// Number of columns in a complete PRICAT data row
pub const COLUMN_COUNT: usize = 146;

pub const DELIMITER: u8 = b';';
pub const QUOTE: u8 = b'"';

/// Record type marker of header rows
pub const HEADER_MARKER: &str = "H";

/// Record type marker of data rows
pub const DATA_MARKER: &str = "P";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Column {
    RecordType = 0,
    FeedName = 1,
    FeedVersion = 2,

    // Parties
    SupplierGln = 3,
    SupplierNumber = 4,
    SupplierName = 5,
    ManufacturerGln = 6,
    ManufacturerNumber = 7,
    ManufacturerName = 8,
    BrandId = 9,
    BrandNumber = 10,
    BrandName = 11,

    // Identification and texts
    Ean = 12,
    SupplierArticleNumber = 13,
    ManufacturerArticleNumber = 14,
    ShortDescription = 15,
    Description = 16,
    LongDescription = 17,
    ArticleGroup = 18,
    Series = 19,

    // Commercial
    RecommendedPrice = 20,
    NetPrice = 21,
    Currency = 22,
    VatRate = 23,
    PriceUnit = 24,
    OrderUnit = 25,
    MinOrderQuantity = 26,
    PackagingQuantity = 27,
    DiscountGroup = 28,
    PriceValidFrom = 29,

    // Logistics
    Weight = 30,
    WeightUnit = 31,
    Length = 32,
    Width = 33,
    Height = 34,
    DimensionUnit = 35,
    GrossWeight = 36,
    DeliveryTime = 37,

    // Classification
    CustomsCode = 40,
    OriginCountry = 41,
    Status = 42,
    AgeRecommendation = 43,
    ValidFrom = 44,
    ValidTo = 45,
    BatteryRequired = 46,
    HazardNotice = 47,

    // Marketing
    MarketingText = 60,
    Keywords = 61,

    PrimaryImageUrl = 120,

    ReleaseDate = 140,
    Remark = 145,
}

impl Column {
    pub const ALL: &'static [Column] = &[
        Column::RecordType,
        Column::FeedName,
        Column::FeedVersion,
        Column::SupplierGln,
        Column::SupplierNumber,
        Column::SupplierName,
        Column::ManufacturerGln,
        Column::ManufacturerNumber,
        Column::ManufacturerName,
        Column::BrandId,
        Column::BrandNumber,
        Column::BrandName,
        Column::Ean,
        Column::SupplierArticleNumber,
        Column::ManufacturerArticleNumber,
        Column::ShortDescription,
        Column::Description,
        Column::LongDescription,
        Column::ArticleGroup,
        Column::Series,
        Column::RecommendedPrice,
        Column::NetPrice,
        Column::Currency,
        Column::VatRate,
        Column::PriceUnit,
        Column::OrderUnit,
        Column::MinOrderQuantity,
        Column::PackagingQuantity,
        Column::DiscountGroup,
        Column::PriceValidFrom,
        Column::Weight,
        Column::WeightUnit,
        Column::Length,
        Column::Width,
        Column::Height,
        Column::DimensionUnit,
        Column::GrossWeight,
        Column::DeliveryTime,
        Column::CustomsCode,
        Column::OriginCountry,
        Column::Status,
        Column::AgeRecommendation,
        Column::ValidFrom,
        Column::ValidTo,
        Column::BatteryRequired,
        Column::HazardNotice,
        Column::MarketingText,
        Column::Keywords,
        Column::PrimaryImageUrl,
        Column::ReleaseDate,
        Column::Remark,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable column name used in row error messages
    pub fn name(self) -> &'static str {
        match self {
            Column::RecordType => "record type",
            Column::FeedName => "feed name",
            Column::FeedVersion => "feed version",
            Column::SupplierGln => "supplier GLN",
            Column::SupplierNumber => "supplier number",
            Column::SupplierName => "supplier name",
            Column::ManufacturerGln => "manufacturer GLN",
            Column::ManufacturerNumber => "manufacturer number",
            Column::ManufacturerName => "manufacturer name",
            Column::BrandId => "brand id",
            Column::BrandNumber => "brand number",
            Column::BrandName => "brand name",
            Column::Ean => "EAN",
            Column::SupplierArticleNumber => "supplier article number",
            Column::ManufacturerArticleNumber => "manufacturer article number",
            Column::ShortDescription => "short description",
            Column::Description => "description",
            Column::LongDescription => "long description",
            Column::ArticleGroup => "article group",
            Column::Series => "series",
            Column::RecommendedPrice => "recommended price",
            Column::NetPrice => "net price",
            Column::Currency => "currency",
            Column::VatRate => "VAT rate",
            Column::PriceUnit => "price unit",
            Column::OrderUnit => "order unit",
            Column::MinOrderQuantity => "minimum order quantity",
            Column::PackagingQuantity => "packaging quantity",
            Column::DiscountGroup => "discount group",
            Column::PriceValidFrom => "price valid from",
            Column::Weight => "weight",
            Column::WeightUnit => "weight unit",
            Column::Length => "length",
            Column::Width => "width",
            Column::Height => "height",
            Column::DimensionUnit => "dimension unit",
            Column::GrossWeight => "gross weight",
            Column::DeliveryTime => "delivery time",
            Column::CustomsCode => "customs code",
            Column::OriginCountry => "origin country",
            Column::Status => "status",
            Column::AgeRecommendation => "age recommendation",
            Column::ValidFrom => "valid from",
            Column::ValidTo => "valid to",
            Column::BatteryRequired => "battery required",
            Column::HazardNotice => "hazard notice",
            Column::MarketingText => "marketing text",
            Column::Keywords => "keywords",
            Column::PrimaryImageUrl => "image URL",
            Column::ReleaseDate => "release date",
            Column::Remark => "remark",
        }
    }
}

/// Read a column, trimmed; columns past the end of a short row read as empty
pub fn field(record: &StringRecord, column: Column) -> &str {
    record.get(column.index()).map(str::trim).unwrap_or("")
}
