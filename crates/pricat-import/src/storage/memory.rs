//! In-process entity store
//!
//! Used by `--dry-run` and by tests. Natural-key uniqueness is enforced the
//! same way the database constraints do it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{Brand, EntityStore, Manufacturer, NewBrand, NewManufacturer, NewSupplier, Supplier};
use crate::error::{ImportError, Result};

#[derive(Default)]
struct State {
    next_id: i64,
    suppliers: Vec<Supplier>,
    manufacturers: Vec<Manufacturer>,
    brands: Vec<Brand>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn supplier_mut(&mut self, id: i64) -> Result<&mut Supplier> {
        self.suppliers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ImportError::Store(format!("supplier {} not found", id)))
    }
}

/// Entity store kept entirely in memory
#[derive(Default)]
pub struct MemoryEntityStore {
    state: Mutex<State>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn manufacturers(&self) -> Vec<Manufacturer> {
        self.state.lock().await.manufacturers.clone()
    }

    pub async fn brands(&self) -> Vec<Brand> {
        self.state.lock().await.brands.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn find_supplier_by_gln(&self, gln: &str) -> Result<Option<Supplier>> {
        let state = self.state.lock().await;
        Ok(state
            .suppliers
            .iter()
            .find(|s| s.gln.as_deref() == Some(gln))
            .cloned())
    }

    async fn find_supplier_by_number(&self, number: &str) -> Result<Option<Supplier>> {
        let state = self.state.lock().await;
        Ok(state
            .suppliers
            .iter()
            .find(|s| s.supplier_number.as_deref() == Some(number))
            .cloned())
    }

    async fn insert_supplier(&self, supplier: NewSupplier) -> Result<Supplier> {
        let mut state = self.state.lock().await;

        let existing = state.suppliers.iter().find(|s| {
            (supplier.gln.is_some() && s.gln == supplier.gln)
                || (supplier.supplier_number.is_some()
                    && s.supplier_number == supplier.supplier_number)
        });
        if let Some(existing) = existing {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let record = Supplier {
            id: state.next_id(),
            gln: supplier.gln,
            supplier_number: supplier.supplier_number,
            name: supplier.name,
            active: supplier.active,
            source_filename: supplier.source_filename,
            last_converted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.suppliers.push(record.clone());
        Ok(record)
    }

    async fn update_supplier_name(&self, id: i64, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let supplier = state.supplier_mut(id)?;
        supplier.name = name.to_string();
        supplier.updated_at = Utc::now();
        Ok(())
    }

    async fn update_supplier_gln(&self, id: i64, gln: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.suppliers.iter().any(|s| s.id != id && s.gln.as_deref() == Some(gln)) {
            return Err(ImportError::Store(format!("GLN {} already assigned", gln)));
        }
        let supplier = state.supplier_mut(id)?;
        supplier.gln = Some(gln.to_string());
        supplier.updated_at = Utc::now();
        Ok(())
    }

    async fn update_supplier_source_filename(&self, id: i64, filename: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let supplier = state.supplier_mut(id)?;
        supplier.source_filename = Some(filename.to_string());
        supplier.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_supplier_converted(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;
        let supplier = state.supplier_mut(id)?;
        supplier.last_converted_at = Some(at);
        supplier.updated_at = at;
        Ok(())
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        Ok(self.state.lock().await.suppliers.clone())
    }

    async fn find_manufacturer_by_gln(&self, gln: &str) -> Result<Option<Manufacturer>> {
        let state = self.state.lock().await;
        Ok(state.manufacturers.iter().find(|m| m.gln == gln).cloned())
    }

    async fn insert_manufacturer(&self, manufacturer: NewManufacturer) -> Result<Manufacturer> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.manufacturers.iter().find(|m| m.gln == manufacturer.gln) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let record = Manufacturer {
            id: state.next_id(),
            gln: manufacturer.gln,
            manufacturer_number: manufacturer.manufacturer_number,
            name: manufacturer.name,
            created_at: now,
            updated_at: now,
        };
        state.manufacturers.push(record.clone());
        Ok(record)
    }

    async fn update_manufacturer_name(&self, id: i64, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let manufacturer = state
            .manufacturers
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ImportError::Store(format!("manufacturer {} not found", id)))?;
        manufacturer.name = name.to_string();
        manufacturer.updated_at = Utc::now();
        Ok(())
    }

    async fn find_brand(&self, manufacturer_id: i64, name: &str) -> Result<Option<Brand>> {
        let state = self.state.lock().await;
        Ok(state
            .brands
            .iter()
            .find(|b| b.manufacturer_id == manufacturer_id && b.name == name)
            .cloned())
    }

    async fn count_brands(&self, manufacturer_id: i64) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .brands
            .iter()
            .filter(|b| b.manufacturer_id == manufacturer_id)
            .count() as i64)
    }

    async fn insert_brand(&self, brand: NewBrand) -> Result<Brand> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .brands
            .iter()
            .find(|b| b.manufacturer_id == brand.manufacturer_id && b.name == brand.name)
        {
            return Ok(existing.clone());
        }
        if state.brands.iter().any(|b| b.code == brand.code) {
            return Err(ImportError::Store(format!("brand code {} already in use", brand.code)));
        }

        let record = Brand {
            id: state.next_id(),
            manufacturer_id: brand.manufacturer_id,
            name: brand.name,
            code: brand.code,
            created_at: Utc::now(),
        };
        state.brands.push(record.clone());
        Ok(record)
    }
}
