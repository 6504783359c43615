//! PostgreSQL entity store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

use super::{Brand, EntityStore, Manufacturer, NewBrand, NewManufacturer, NewSupplier, Supplier};
use crate::error::{ImportError, Result};

const SUPPLIER_COLUMNS: &str = "id, gln, supplier_number, name, active, source_filename, \
                                last_converted_at, created_at, updated_at";

const MANUFACTURER_COLUMNS: &str = "id, gln, manufacturer_number, name, created_at, updated_at";

const BRAND_COLUMNS: &str = "id, manufacturer_id, name, code, created_at";

/// Entity store backed by a Postgres pool
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self> {
        info!(max_connections, "Connecting to master data database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ImportError::Store(format!("migration failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute_update(&self, sql: &str, id: i64, value: &str, what: &str) -> Result<()> {
        let result = sqlx::query(sql).bind(value).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(ImportError::Store(format!("{} {} not found", what, id)));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn find_supplier_by_gln(&self, gln: &str) -> Result<Option<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers WHERE gln = $1", SUPPLIER_COLUMNS);
        Ok(sqlx::query_as::<_, Supplier>(&sql)
            .bind(gln)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_supplier_by_number(&self, number: &str) -> Result<Option<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers WHERE supplier_number = $1", SUPPLIER_COLUMNS);
        Ok(sqlx::query_as::<_, Supplier>(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_supplier(&self, supplier: NewSupplier) -> Result<Supplier> {
        let sql = format!(
            r#"
            INSERT INTO suppliers (gln, supplier_number, name, active, source_filename)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        );

        let inserted = sqlx::query_as::<_, Supplier>(&sql)
            .bind(&supplier.gln)
            .bind(&supplier.supplier_number)
            .bind(&supplier.name)
            .bind(supplier.active)
            .bind(&supplier.source_filename)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(record) = inserted {
            debug!(id = record.id, "Inserted supplier");
            return Ok(record);
        }

        // Another run created it first
        if let Some(gln) = &supplier.gln {
            if let Some(existing) = self.find_supplier_by_gln(gln).await? {
                return Ok(existing);
            }
        }
        if let Some(number) = &supplier.supplier_number {
            if let Some(existing) = self.find_supplier_by_number(number).await? {
                return Ok(existing);
            }
        }

        Err(ImportError::Store("supplier insert conflicted but no row was found".to_string()))
    }

    async fn update_supplier_name(&self, id: i64, name: &str) -> Result<()> {
        self.execute_update(
            "UPDATE suppliers SET name = $1, updated_at = NOW() WHERE id = $2",
            id,
            name,
            "supplier",
        )
        .await
    }

    async fn update_supplier_gln(&self, id: i64, gln: &str) -> Result<()> {
        self.execute_update(
            "UPDATE suppliers SET gln = $1, updated_at = NOW() WHERE id = $2",
            id,
            gln,
            "supplier",
        )
        .await
    }

    async fn update_supplier_source_filename(&self, id: i64, filename: &str) -> Result<()> {
        self.execute_update(
            "UPDATE suppliers SET source_filename = $1, updated_at = NOW() WHERE id = $2",
            id,
            filename,
            "supplier",
        )
        .await
    }

    async fn mark_supplier_converted(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE suppliers SET last_converted_at = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ImportError::Store(format!("supplier {} not found", id)));
        }
        Ok(())
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        let sql = format!("SELECT {} FROM suppliers ORDER BY id", SUPPLIER_COLUMNS);
        Ok(sqlx::query_as::<_, Supplier>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find_manufacturer_by_gln(&self, gln: &str) -> Result<Option<Manufacturer>> {
        let sql = format!("SELECT {} FROM manufacturers WHERE gln = $1", MANUFACTURER_COLUMNS);
        Ok(sqlx::query_as::<_, Manufacturer>(&sql)
            .bind(gln)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_manufacturer(&self, manufacturer: NewManufacturer) -> Result<Manufacturer> {
        let sql = format!(
            r#"
            INSERT INTO manufacturers (gln, manufacturer_number, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (gln) DO NOTHING
            RETURNING {}
            "#,
            MANUFACTURER_COLUMNS
        );

        let inserted = sqlx::query_as::<_, Manufacturer>(&sql)
            .bind(&manufacturer.gln)
            .bind(&manufacturer.manufacturer_number)
            .bind(&manufacturer.name)
            .fetch_optional(&self.pool)
            .await?;

        match inserted {
            Some(record) => Ok(record),
            None => self.find_manufacturer_by_gln(&manufacturer.gln).await?.ok_or_else(|| {
                ImportError::Store(format!("manufacturer {} vanished after conflict", manufacturer.gln))
            }),
        }
    }

    async fn update_manufacturer_name(&self, id: i64, name: &str) -> Result<()> {
        self.execute_update(
            "UPDATE manufacturers SET name = $1, updated_at = NOW() WHERE id = $2",
            id,
            name,
            "manufacturer",
        )
        .await
    }

    async fn find_brand(&self, manufacturer_id: i64, name: &str) -> Result<Option<Brand>> {
        let sql = format!(
            "SELECT {} FROM brands WHERE manufacturer_id = $1 AND name = $2",
            BRAND_COLUMNS
        );
        Ok(sqlx::query_as::<_, Brand>(&sql)
            .bind(manufacturer_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn count_brands(&self, manufacturer_id: i64) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM brands WHERE manufacturer_id = $1")
            .bind(manufacturer_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_brand(&self, brand: NewBrand) -> Result<Brand> {
        let sql = format!(
            r#"
            INSERT INTO brands (manufacturer_id, name, code)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            BRAND_COLUMNS
        );

        let inserted = sqlx::query_as::<_, Brand>(&sql)
            .bind(brand.manufacturer_id)
            .bind(&brand.name)
            .bind(&brand.code)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(record) = inserted {
            return Ok(record);
        }

        // Either the same brand was created concurrently, or its code was
        // taken by a different brand of the same manufacturer.
        self.find_brand(brand.manufacturer_id, &brand.name)
            .await?
            .ok_or_else(|| ImportError::Store(format!("brand code {} already in use", brand.code)))
    }
}
