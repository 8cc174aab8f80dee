use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracechain_core::{Address, BoxId, DispatchId, ProductId};
use tracechain_events::{LedgerEventKind, RawLedgerEvent};
use tracechain_products::{
    OnwardPointers, Product, ProductEntry, ProductLifeCycle, ProductStatus,
};

use crate::directory::RoleDirectoryEntry;

/// Transaction hash returned by a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TxHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current custody state of one product, as read from `productLifeCycles(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeCycleSnapshot {
    pub product_id: ProductId,
    pub owner: Address,
    pub status: ProductStatus,
    pub onward: OnwardPointers,
    /// Dispatch awaiting acceptance, if any.
    pub in_transit: Option<DispatchId>,
}

impl From<&ProductLifeCycle> for LifeCycleSnapshot {
    fn from(lc: &ProductLifeCycle) -> Self {
        Self {
            product_id: lc.product_id(),
            owner: lc.owner().clone(),
            status: lc.status(),
            onward: *lc.onward(),
            in_transit: lc.in_transit().map(|t| t.dispatch_id),
        }
    }
}

/// One entry of `dispatches(dispatchId, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchItem {
    pub dispatch_id: DispatchId,
    pub start_id: ProductId,
    pub end_id: ProductId,
    pub from: Address,
    pub to: Address,
    pub quantity: u64,
    pub memo: Option<String>,
    pub dispatched_at: DateTime<Utc>,
}

/// A state-changing ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LedgerCall {
    /// `bulkProductEntry(...)`: mint `entry.quantity` products under a new box.
    BulkProductEntry { entry: ProductEntry, customs: Address },
    /// `dispatch(startId, endId, to, memo)`. To the burn address it is a sale.
    Dispatch {
        start_id: ProductId,
        end_id: ProductId,
        to: Address,
        memo: Option<String>,
    },
    /// `confirmDelivery(dispatchId)`.
    ConfirmDelivery { dispatch_id: DispatchId },
    /// `reportProduct(productId, desc, reportee, proofHash)`.
    ReportProduct {
        product_id: ProductId,
        description: String,
        report_for: Address,
        proof_hash: String,
    },
    /// `updateMultipleProductPriceByImporter(boxId, price)`.
    UpdatePrice { box_id: BoxId, price: u64 },
}

impl LedgerCall {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::BulkProductEntry { .. } => "bulkProductEntry",
            LedgerCall::Dispatch { .. } => "dispatch",
            LedgerCall::ConfirmDelivery { .. } => "confirmDelivery",
            LedgerCall::ReportProduct { .. } => "reportProduct",
            LedgerCall::UpdatePrice { .. } => "updateMultipleProductPriceByImporter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Reverted { reason: String },
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: ReceiptStatus,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Ledger transport / node error. Reverts are not errors; they are receipts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger rejected the transaction: {0}")]
    Rejected(String),

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// Client for the traceability contract.
///
/// Reads are plain calls. Writes are two-step: [`LedgerClient::submit`] returns a
/// transaction hash as soon as the node accepts it, and
/// [`LedgerClient::wait_for_receipt`] resolves once it is mined (successfully
/// or reverted). Callers bound the wait themselves.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// `productLifeCycles(id)`; `None` if the product was never minted.
    async fn product_life_cycle(&self, id: ProductId) -> Result<Option<LifeCycleSnapshot>, LedgerError>;

    /// `products(id)`.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, LedgerError>;

    /// `productCounter()`: the highest product id minted so far.
    async fn product_counter(&self) -> Result<u64, LedgerError>;

    /// `getDispatchLength(dispatchId)`.
    async fn dispatch_length(&self, dispatch_id: DispatchId) -> Result<u64, LedgerError>;

    /// `dispatches(dispatchId, index)`.
    async fn dispatch_item(&self, dispatch_id: DispatchId, index: u64) -> Result<Option<DispatchItem>, LedgerError>;

    /// `rolesData(address)`.
    async fn roles_data(&self, address: &Address) -> Result<Option<RoleDirectoryEntry>, LedgerError>;

    /// `getOthersParty()`: every registered non-admin party.
    async fn others_party(&self) -> Result<Vec<Address>, LedgerError>;

    /// All logs of one kind, in emission order.
    async fn query_events(&self, kind: LedgerEventKind) -> Result<Vec<RawLedgerEvent>, LedgerError>;

    /// Sign and send `call` from `from`.
    async fn submit(&self, from: &Address, call: LedgerCall) -> Result<TxHash, LedgerError>;

    /// Wait until `tx` is mined.
    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<Receipt, LedgerError>;
}

#[async_trait]
impl<L> LedgerClient for Arc<L>
where
    L: LedgerClient + ?Sized,
{
    async fn product_life_cycle(&self, id: ProductId) -> Result<Option<LifeCycleSnapshot>, LedgerError> {
        (**self).product_life_cycle(id).await
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, LedgerError> {
        (**self).product(id).await
    }

    async fn product_counter(&self) -> Result<u64, LedgerError> {
        (**self).product_counter().await
    }

    async fn dispatch_length(&self, dispatch_id: DispatchId) -> Result<u64, LedgerError> {
        (**self).dispatch_length(dispatch_id).await
    }

    async fn dispatch_item(&self, dispatch_id: DispatchId, index: u64) -> Result<Option<DispatchItem>, LedgerError> {
        (**self).dispatch_item(dispatch_id, index).await
    }

    async fn roles_data(&self, address: &Address) -> Result<Option<RoleDirectoryEntry>, LedgerError> {
        (**self).roles_data(address).await
    }

    async fn others_party(&self) -> Result<Vec<Address>, LedgerError> {
        (**self).others_party().await
    }

    async fn query_events(&self, kind: LedgerEventKind) -> Result<Vec<RawLedgerEvent>, LedgerError> {
        (**self).query_events(kind).await
    }

    async fn submit(&self, from: &Address, call: LedgerCall) -> Result<TxHash, LedgerError> {
        (**self).submit(from, call).await
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<Receipt, LedgerError> {
        (**self).wait_for_receipt(tx).await
    }
}
