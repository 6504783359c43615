//! Supplier / manufacturer / brand extraction
//!
//! Turns the identity sets of a parsed batch into master records. Every
//! write stands on its own; when a write fails the entities stored before it
//! stay, and re-running the import picks up where it stopped.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{brand_code, Brand, EntityStore, Manufacturer, NewBrand, NewManufacturer, NewSupplier, Supplier};
use crate::error::{ImportError, Result};
use crate::models::{BrandKey, CatalogueBatch, PartyIdentity};

/// Result of one extraction
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractOutcome {
    pub success: bool,
    pub supplier: Option<Supplier>,
    pub manufacturers: Vec<Manufacturer>,
    pub brands: Vec<Brand>,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,

    /// Brand code per (manufacturer GLN, brand name)
    #[serde(skip)]
    pub brand_codes: HashMap<BrandKey, String>,
}

/// Applies a batch's identities to an [`EntityStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityUpserter;

impl EntityUpserter {
    pub fn new() -> Self {
        Self
    }

    /// Find-or-create the supplier, manufacturers and brands of `batch`.
    ///
    /// Stops at the first store error; everything written before it is kept
    /// and reported in the outcome.
    pub async fn extract(&self, batch: &CatalogueBatch, store: &dyn EntityStore) -> ExtractOutcome {
        let mut outcome = ExtractOutcome::default();

        if let Err(e) = self.extract_into(batch, store, &mut outcome).await {
            warn!(error = %e, "Entity extraction stopped");
            outcome.errors.push(e.to_string());
        }

        outcome.success = outcome.errors.is_empty();
        info!(
            manufacturers = outcome.manufacturers.len(),
            brands = outcome.brands.len(),
            created = outcome.created,
            updated = outcome.updated,
            success = outcome.success,
            "Entity extraction finished"
        );
        outcome
    }

    async fn extract_into(
        &self,
        batch: &CatalogueBatch,
        store: &dyn EntityStore,
        outcome: &mut ExtractOutcome,
    ) -> Result<()> {
        match &batch.supplier {
            Some(identity) => {
                outcome.supplier = Some(self.upsert_supplier(identity, store, outcome).await?);
            },
            None => warn!("Catalogue carries no supplier identity"),
        }

        let mut by_gln: HashMap<&str, Manufacturer> = HashMap::new();
        for (gln, identity) in &batch.manufacturers {
            let manufacturer = self.upsert_manufacturer(identity, store, outcome).await?;
            by_gln.insert(gln.as_str(), manufacturer.clone());
            outcome.manufacturers.push(manufacturer);
        }

        for key in &batch.brands {
            let manufacturer = by_gln.get(key.manufacturer_gln.as_str()).ok_or_else(|| {
                ImportError::Store(format!(
                    "brand '{}' references unknown manufacturer {}",
                    key.brand_name, key.manufacturer_gln
                ))
            })?;

            let brand = self.upsert_brand(manufacturer, &key.brand_name, store, outcome).await?;
            outcome.brand_codes.insert(key.clone(), brand.code.clone());
            outcome.brands.push(brand);
        }

        Ok(())
    }

    async fn upsert_supplier(
        &self,
        identity: &PartyIdentity,
        store: &dyn EntityStore,
        outcome: &mut ExtractOutcome,
    ) -> Result<Supplier> {
        let mut existing = None;
        if !identity.gln.is_empty() {
            existing = store.find_supplier_by_gln(&identity.gln).await?;
        }

        // Suppliers discovered by the FTP sync only know their number
        if existing.is_none() && !identity.local_id.is_empty() {
            if let Some(mut found) = store.find_supplier_by_number(&identity.local_id).await? {
                if found.gln.is_none() && !identity.gln.is_empty() {
                    store.update_supplier_gln(found.id, &identity.gln).await?;
                    found.gln = Some(identity.gln.clone());
                    outcome.updated += 1;
                }
                existing = Some(found);
            }
        }

        match existing {
            Some(mut supplier) => {
                if !identity.name.is_empty() && supplier.name != identity.name {
                    store.update_supplier_name(supplier.id, &identity.name).await?;
                    supplier.name = identity.name.clone();
                    outcome.updated += 1;
                }
                debug!(id = supplier.id, "Supplier already known");
                Ok(supplier)
            },
            None => {
                let supplier = store
                    .insert_supplier(NewSupplier {
                        gln: non_empty(&identity.gln),
                        supplier_number: non_empty(&identity.local_id),
                        name: identity.name.clone(),
                        active: false,
                        source_filename: None,
                    })
                    .await?;
                info!(id = supplier.id, name = %supplier.name, "Created inactive supplier");
                outcome.created += 1;
                Ok(supplier)
            },
        }
    }

    async fn upsert_manufacturer(
        &self,
        identity: &PartyIdentity,
        store: &dyn EntityStore,
        outcome: &mut ExtractOutcome,
    ) -> Result<Manufacturer> {
        match store.find_manufacturer_by_gln(&identity.gln).await? {
            Some(mut manufacturer) => {
                if !identity.name.is_empty() && manufacturer.name != identity.name {
                    store.update_manufacturer_name(manufacturer.id, &identity.name).await?;
                    manufacturer.name = identity.name.clone();
                    outcome.updated += 1;
                }
                Ok(manufacturer)
            },
            None => {
                let manufacturer = store
                    .insert_manufacturer(NewManufacturer {
                        gln: identity.gln.clone(),
                        manufacturer_number: non_empty(&identity.local_id),
                        name: identity.name.clone(),
                    })
                    .await?;
                outcome.created += 1;
                Ok(manufacturer)
            },
        }
    }

    async fn upsert_brand(
        &self,
        manufacturer: &Manufacturer,
        name: &str,
        store: &dyn EntityStore,
        outcome: &mut ExtractOutcome,
    ) -> Result<Brand> {
        if let Some(brand) = store.find_brand(manufacturer.id, name).await? {
            return Ok(brand);
        }

        let sequence = store.count_brands(manufacturer.id).await? + 1;
        let brand = store
            .insert_brand(NewBrand {
                manufacturer_id: manufacturer.id,
                name: name.to_string(),
                code: brand_code(&manufacturer.gln, sequence),
            })
            .await?;
        debug!(code = %brand.code, name = %brand.name, "Created brand");
        outcome.created += 1;
        Ok(brand)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryEntityStore;

    const LEGO: &str = "5701234000004";

    fn batch(brands: &[&str]) -> CatalogueBatch {
        let mut batch = CatalogueBatch {
            supplier: Some(PartyIdentity {
                gln: "4012345000009".to_string(),
                local_id: "1872".to_string(),
                name: "Lego Spielwaren GmbH".to_string(),
            }),
            ..CatalogueBatch::default()
        };
        batch.manufacturers.insert(
            LEGO.to_string(),
            PartyIdentity {
                gln: LEGO.to_string(),
                local_id: String::new(),
                name: "LEGO A/S".to_string(),
            },
        );
        for brand in brands {
            batch.brands.insert(BrandKey::new(LEGO, *brand));
        }
        batch
    }

    #[tokio::test]
    async fn test_brand_codes_are_sequential_and_stable() {
        let store = MemoryEntityStore::new();
        let upserter = EntityUpserter::new();

        let first = upserter.extract(&batch(&["LEGO City"]), &store).await;
        assert!(first.success);
        assert_eq!(first.brands[0].code, format!("{}_1", LEGO));

        let second = upserter.extract(&batch(&["LEGO Technic", "LEGO City"]), &store).await;
        assert!(second.success);
        let codes: HashMap<_, _> =
            second.brands.iter().map(|b| (b.name.as_str(), b.code.as_str())).collect();
        assert_eq!(codes["LEGO Technic"], format!("{}_2", LEGO));
        assert_eq!(codes["LEGO City"], format!("{}_1", LEGO));
        assert_eq!(store.brands().await.len(), 2);
    }

    #[tokio::test]
    async fn test_supplier_created_inactive_then_renamed() {
        let store = MemoryEntityStore::new();
        let upserter = EntityUpserter::new();

        let outcome = upserter.extract(&batch(&[]), &store).await;
        let supplier = outcome.supplier.unwrap();
        assert!(!supplier.active);
        assert_eq!(supplier.supplier_number.as_deref(), Some("1872"));

        let mut renamed = batch(&[]);
        renamed.supplier.as_mut().unwrap().name = "LEGO GmbH".to_string();
        let outcome = upserter.extract(&renamed, &store).await;
        assert_eq!(outcome.supplier.unwrap().name, "LEGO GmbH");
        assert_eq!(store.list_suppliers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_does_not_overwrite() {
        let store = MemoryEntityStore::new();
        let upserter = EntityUpserter::new();
        upserter.extract(&batch(&[]), &store).await;

        let mut unnamed = batch(&[]);
        unnamed.manufacturers.get_mut(LEGO).unwrap().name.clear();
        upserter.extract(&unnamed, &store).await;

        assert_eq!(store.manufacturers().await[0].name, "LEGO A/S");
    }

    #[tokio::test]
    async fn test_synced_supplier_adopted_by_number() {
        let store = MemoryEntityStore::new();
        let synced = store
            .insert_supplier(NewSupplier {
                supplier_number: Some("1872".to_string()),
                name: "Lego Spielwaren GmbH".to_string(),
                source_filename: Some("pricat_1872_Lego Spielwaren GmbH_0.csv".to_string()),
                ..NewSupplier::default()
            })
            .await
            .unwrap();

        let outcome = EntityUpserter::new().extract(&batch(&[]), &store).await;
        let supplier = outcome.supplier.unwrap();

        assert_eq!(supplier.id, synced.id);
        assert_eq!(supplier.gln.as_deref(), Some("4012345000009"));
    }
}
