//! Error taxonomy for the import pipeline
//!
//! Services convert these into outcome values at their boundary; only the
//! pipeline decides whether a failure stops the run.

use thiserror::Error;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    /// FTP connect, login or transfer failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single catalogue row could not be turned into an article
    #[error("row {row}: {message}")]
    RowParse { row: u64, message: String },

    /// Output file could not be produced
    #[error("Export error: {0}")]
    Export(String),

    /// A single image download failed
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Import trigger call failed
    #[error("Notify error: {0}")]
    Notify(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] pricat_common::PricatError),
}

impl From<sqlx::Error> for ImportError {
    fn from(err: sqlx::Error) -> Self {
        ImportError::Store(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Export(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::Export(err.to_string())
    }
}
