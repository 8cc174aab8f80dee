use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use tracechain_core::Address;
use tracechain_infra::{
    projections::{BoxEntry, ClassifiedDispatch, ReconciliationState},
    submitter::IdempotencyKey,
};
use tracechain_products::{Custodian, ProductEntry};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct EnterProductRequest {
    pub name: String,
    pub description: String,
    pub category: String,
    pub country_of_origin: String,
    pub manufacturer: String,
    pub price: u64,
    pub quantity: u64,
    pub importer: String,
}

impl EnterProductRequest {
    pub fn into_entry(self) -> Result<ProductEntry, axum::response::Response> {
        Ok(ProductEntry {
            importer: parse_address("importer", &self.importer)?,
            name: self.name,
            description: self.description,
            category: self.category,
            country_of_origin: self.country_of_origin,
            manufacturer: self.manufacturer,
            price: self.price,
            quantity: self.quantity,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub start_id: u64,
    pub end_id: u64,
    pub to: String,
    pub memo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmDeliveryRequest {
    pub dispatch_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub product_id: u64,
    pub price: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub product_id: u64,
    pub description: String,
    pub report_for: String,
    pub proof_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub box_id: u64,
    pub price: u64,
}

// -------------------------
// Response DTOs
// -------------------------

/// A panel's state plus the counts its tabs show.
#[derive(Debug, Serialize)]
pub struct PanelResponse<'a> {
    pub pending: usize,
    pub completed: usize,
    pub invalid: usize,
    /// Boxes the viewer entered or imports, for the entry history tab.
    pub own_entries: Vec<&'a BoxEntry>,
    #[serde(flatten)]
    pub state: &'a ReconciliationState,
}

impl<'a> From<&'a ReconciliationState> for PanelResponse<'a> {
    fn from(state: &'a ReconciliationState) -> Self {
        Self {
            pending: state.pending().count(),
            completed: state.completed().count(),
            invalid: state.invalid().count(),
            own_entries: state.own_entries().collect(),
            state,
        }
    }
}

/// Only the dispatches awaiting the viewer's confirmation.
#[derive(Debug, Serialize)]
pub struct PendingResponse<'a> {
    pub stage: Custodian,
    pub pending: Vec<&'a ClassifiedDispatch>,
}

// -------------------------
// Path/field parsing
// -------------------------

pub fn parse_address(field: &'static str, raw: &str) -> Result<Address, axum::response::Response> {
    Address::parse(raw).map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "validation_error", format!("{field}: {e}"))
    })
}

pub fn parse_stage(raw: &str) -> Result<Custodian, axum::response::Response> {
    raw.parse::<Custodian>().map_err(|e| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_stage",
            format!("{e}; stage must be one of: customs, importer, distributor, retailer"),
        )
    })
}

pub fn parse_key(raw: &str) -> Result<IdempotencyKey, axum::response::Response> {
    raw.parse::<IdempotencyKey>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_key", "invalid idempotency key"))
}
