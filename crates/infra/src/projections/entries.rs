use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracechain_core::{Address, BoxId, ProductId};
use tracechain_events::EntryRecord;
use tracechain_products::ProductStatus;

use super::dispatches::AggregateError;

/// One customs entry: a box of products minted together with shared attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxEntry {
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
    /// Product ids minted under this box, ascending.
    pub product_ids: Vec<ProductId>,
    /// Status of the box's first product, when a snapshot was fetched for it.
    pub status: Option<ProductStatus>,
}

impl BoxEntry {
    fn from_record(r: &EntryRecord) -> Self {
        Self {
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
            product_ids: Vec::new(),
            status: None,
        }
    }

    pub fn first_product(&self) -> Option<ProductId> {
        self.product_ids.first().copied()
    }
}

/// Same product, same attributes. Log position may differ.
fn same_mint(a: &EntryRecord, b: &EntryRecord) -> bool {
    EntryRecord {
        position: b.position,
        ..a.clone()
    } == *b
}

/// Group entry records by box id (ascending).
///
/// Shared attributes come from the lowest product id in the box, so the output
/// does not depend on input order. A product reported twice with the same
/// attributes is collapsed; with different attributes the input is corrupt.
pub fn entry_view<'a>(
    records: impl IntoIterator<Item = &'a EntryRecord>,
) -> Result<Vec<BoxEntry>, AggregateError> {
    let mut sorted: Vec<&EntryRecord> = records.into_iter().collect();
    sorted.sort_by_key(|r| (r.box_id, r.product_id, r.position));

    let mut boxes: BTreeMap<BoxId, BoxEntry> = BTreeMap::new();
    let mut previous: Option<&EntryRecord> = None;
    for r in sorted {
        if let Some(prev) = previous.filter(|p| (p.box_id, p.product_id) == (r.box_id, r.product_id)) {
            if !same_mint(prev, r) {
                return Err(AggregateError::ConflictingEntry {
                    box_id: r.box_id,
                    product_id: r.product_id,
                });
            }
            tracing::warn!(
                box_id = %r.box_id,
                product_id = %r.product_id,
                position = ?r.position,
                "dropping duplicate ProductAdded record"
            );
            continue;
        }

        boxes
            .entry(r.box_id)
            .or_insert_with(|| BoxEntry::from_record(r))
            .product_ids
            .push(r.product_id);
        previous = Some(r);
    }

    Ok(boxes.into_values().collect())
}
