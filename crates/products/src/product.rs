use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracechain_core::{Address, BoxId, DomainError, ProductId};
use tracechain_events::EntryRecord;

/// Attributes a customs officer enters for a new box of products.
///
/// One entry mints `quantity` products sharing these attributes under a single
/// box id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub name: String,
    pub description: String,
    pub category: String,
    pub country_of_origin: String,
    pub manufacturer: String,
    /// Price in the smallest currency unit.
    pub price: u64,
    pub quantity: u64,
    pub importer: Address,
}

impl ProductEntry {
    /// Local validation. No ledger access.
    pub fn validate(&self) -> Result<(), DomainError> {
        let text_fields = [
            ("name", &self.name),
            ("description", &self.description),
            ("category", &self.category),
            ("country_of_origin", &self.country_of_origin),
            ("manufacturer", &self.manufacturer),
        ];
        for (field, value) in text_fields {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} cannot be empty")));
            }
        }
        if self.price == 0 {
            return Err(DomainError::validation("price must be positive"));
        }
        if self.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.importer.is_burn() {
            return Err(DomainError::validation("importer cannot be the burn address"));
        }
        Ok(())
    }
}

/// A minted product as the ledger stores it.
///
/// Immutable apart from `price`, which the importer may revise per box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub box_id: BoxId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub country_of_origin: String,
    pub manufacturer: String,
    pub price: u64,
    pub quantity: u64,
    pub imported_at: DateTime<Utc>,
    pub importer: Address,
    pub customs: Address,
}

impl Product {
    pub fn from_entry(
        product_id: ProductId,
        box_id: BoxId,
        entry: &ProductEntry,
        customs: Address,
        imported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            box_id,
            name: entry.name.clone(),
            description: entry.description.clone(),
            category: entry.category.clone(),
            country_of_origin: entry.country_of_origin.clone(),
            manufacturer: entry.manufacturer.clone(),
            price: entry.price,
            quantity: entry.quantity,
            imported_at,
            importer: entry.importer.clone(),
            customs,
        }
    }
}

impl From<&EntryRecord> for Product {
    fn from(r: &EntryRecord) -> Self {
        Self {
            product_id: r.product_id,
            box_id: r.box_id,
            name: r.name.clone(),
            description: r.description.clone(),
            category: r.category.clone(),
            country_of_origin: r.country_of_origin.clone(),
            manufacturer: r.manufacturer.clone(),
            price: r.price,
            quantity: r.quantity,
            imported_at: r.imported_at,
            importer: r.importer.clone(),
            customs: r.customs.clone(),
        }
    }
}
