//! Shared fixtures for integration tests

#![allow(dead_code)]

use pricat_import::config::Config;
use pricat_import::parser::schema::{Column, COLUMN_COUNT};
use pricat_import::pipeline::{Pipeline, PipelineServices};
use pricat_import::storage::MemoryEntityStore;
use std::path::Path;
use std::sync::Arc;

pub const SUPPLIER_GLN: &str = "4012345000009";
pub const LEGO_GLN: &str = "5701234000004";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pricat_import=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// One `P` row with the given cells set
pub fn row(values: &[(Column, &str)]) -> String {
    let mut cells = vec![String::new(); COLUMN_COUNT];
    cells[Column::RecordType.index()] = "P".to_string();
    cells[Column::FeedName.index()] = "PRICAT".to_string();
    for (column, value) in values {
        cells[column.index()] = value.to_string();
    }
    cells.join(";")
}

pub fn article(ean: &str, article_number: &str, brand: &str, image_url: &str) -> String {
    row(&[
        (Column::SupplierGln, SUPPLIER_GLN),
        (Column::SupplierNumber, "0000001872"),
        (Column::SupplierName, "Lego Spielwaren GmbH"),
        (Column::ManufacturerGln, LEGO_GLN),
        (Column::ManufacturerName, "LEGO A/S"),
        (Column::BrandName, brand),
        (Column::Ean, ean),
        (Column::SupplierArticleNumber, article_number),
        (Column::ShortDescription, "Bausatz"),
        (Column::RecommendedPrice, "99,99"),
        (Column::NetPrice, "59,50"),
        (Column::Currency, "eur"),
        (Column::Weight, "500"),
        (Column::WeightUnit, "G"),
        (Column::PrimaryImageUrl, image_url),
    ])
}

/// Header plus four article rows, the third of which has a broken EAN
pub fn five_line_feed(image_base: &str) -> String {
    [
        "H;PRICAT;2.0;Lego Spielwaren GmbH".to_string(),
        article("5702017154268", "60198", "LEGO City", &format!("{}/img/60198.jpg", image_base)),
        article("5702017154275", "42115", "LEGO Technic", &format!("{}/img/42115.jpg", image_base)),
        article("57020X7154299", "60200", "LEGO City", ""),
        article("5702017154282", "60199", "LEGO City", &format!("{}/img/60198.jpg", image_base)),
    ]
    .join("\r\n")
}

/// Configuration rooted in `root`, with every network step pointing nowhere
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.imports_dir = root.join("imports");
    config.paths.exports_dir = root.join("exports");
    config.paths.images_dir = root.join("images");
    config.source_ftp.host = "127.0.0.1".to_string();
    config.source_ftp.port = 1;
    config.source_ftp.timeout_secs = 2;
    config.target_ftp = config.source_ftp.clone();
    config
}

pub fn pipeline(config: &Config, store: Arc<MemoryEntityStore>) -> Pipeline {
    let services = PipelineServices::from_config(config, store).expect("services");
    Pipeline::new(services)
}
