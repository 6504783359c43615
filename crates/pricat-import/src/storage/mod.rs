//! Master data persistence
//!
//! The import only needs find/insert/update by natural key for suppliers,
//! manufacturers and brands. [`EntityStore`] captures that contract;
//! [`PgEntityStore`] backs it with PostgreSQL and [`MemoryEntityStore`] keeps
//! everything in process for dry runs and tests.

pub mod memory;
pub mod postgres;
pub mod upsert;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryEntityStore;
pub use postgres::PgEntityStore;
pub use upsert::{EntityUpserter, ExtractOutcome};

/// Supplier master record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Supplier {
    pub id: i64,
    pub gln: Option<String>,
    /// Numeric supplier number without leading zeros
    pub supplier_number: Option<String>,
    pub name: String,
    pub active: bool,
    /// Feed file name last seen on the source FTP server
    pub source_filename: Option<String>,
    pub last_converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub gln: Option<String>,
    pub supplier_number: Option<String>,
    pub name: String,
    pub active: bool,
    pub source_filename: Option<String>,
}

/// Manufacturer master record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Manufacturer {
    pub id: i64,
    pub gln: String,
    pub manufacturer_number: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewManufacturer {
    pub gln: String,
    pub manufacturer_number: Option<String>,
    pub name: String,
}

/// Brand master record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Brand {
    pub id: i64,
    pub manufacturer_id: i64,
    pub name: String,
    /// `{manufacturer GLN}_{sequence}`, assigned once at creation
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBrand {
    pub manufacturer_id: i64,
    pub name: String,
    pub code: String,
}

/// Natural-key persistence contract used by the import
///
/// Inserts must be idempotent on the natural key: when a concurrent run
/// created the same entity first, the existing row is returned.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_supplier_by_gln(&self, gln: &str) -> Result<Option<Supplier>>;
    async fn find_supplier_by_number(&self, number: &str) -> Result<Option<Supplier>>;
    async fn insert_supplier(&self, supplier: NewSupplier) -> Result<Supplier>;
    async fn update_supplier_name(&self, id: i64, name: &str) -> Result<()>;
    async fn update_supplier_gln(&self, id: i64, gln: &str) -> Result<()>;
    async fn update_supplier_source_filename(&self, id: i64, filename: &str) -> Result<()>;
    async fn mark_supplier_converted(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
    async fn list_suppliers(&self) -> Result<Vec<Supplier>>;

    async fn find_manufacturer_by_gln(&self, gln: &str) -> Result<Option<Manufacturer>>;
    async fn insert_manufacturer(&self, manufacturer: NewManufacturer) -> Result<Manufacturer>;
    async fn update_manufacturer_name(&self, id: i64, name: &str) -> Result<()>;

    async fn find_brand(&self, manufacturer_id: i64, name: &str) -> Result<Option<Brand>>;
    async fn count_brands(&self, manufacturer_id: i64) -> Result<i64>;
    async fn insert_brand(&self, brand: NewBrand) -> Result<Brand>;
}

/// Generated downstream code for the `sequence`-th brand of a manufacturer
pub fn brand_code(manufacturer_gln: &str, sequence: i64) -> String {
    format!("{}_{}", manufacturer_gln, sequence)
}
