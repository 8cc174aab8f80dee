use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracechain_core::{Address, BoxId, DispatchId, ProductId};
use tracechain_products::Product;

/// What gets printed for the customer after a confirmed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSlip {
    pub product_id: ProductId,
    pub box_id: BoxId,
    pub name: String,
    pub manufacturer: String,
    pub country_of_origin: String,
    pub imported_at: DateTime<Utc>,
    pub price: u64,
    pub seller: Address,
    pub dispatch_id: DispatchId,
    pub sold_at: DateTime<Utc>,
}

impl SaleSlip {
    pub fn new(product: &Product, price: u64, seller: Address, dispatch_id: DispatchId, sold_at: DateTime<Utc>) -> Self {
        Self {
            product_id: product.product_id,
            box_id: product.box_id,
            name: product.name.clone(),
            manufacturer: product.manufacturer.clone(),
            country_of_origin: product.country_of_origin.clone(),
            imported_at: product.imported_at,
            price,
            seller,
            dispatch_id,
            sold_at,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrintError {
    #[error("printer unavailable: {0}")]
    Unavailable(String),
}

/// Hook run after a sale is confirmed on the ledger.
pub trait SlipPrinter: Send + Sync {
    fn print(&self, slip: &SaleSlip) -> Result<(), PrintError>;
}

/// Keeps printed slips in memory.
#[derive(Debug, Default)]
pub struct RecordingPrinter {
    printed: Mutex<Vec<SaleSlip>>,
}

impl RecordingPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn printed(&self) -> Vec<SaleSlip> {
        self.printed.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl SlipPrinter for RecordingPrinter {
    fn print(&self, slip: &SaleSlip) -> Result<(), PrintError> {
        self.printed
            .lock()
            .map_err(|_| PrintError::Unavailable("lock poisoned".to_string()))?
            .push(slip.clone());
        Ok(())
    }
}
