//! Action submitter: every state-changing call goes through here.
//!
//! Each operation runs in two phases:
//! 1. local validation (no ledger access, fails with [`SubmitError::Validation`])
//! 2. read-only pre-checks, then submit and await the receipt within the
//!    configured bound
//!
//! Success is reported only after confirmation. Every submission is journaled
//! under an [`IdempotencyKey`] so a caller can [`ActionSubmitter::retry`] it.

pub mod error;
pub mod in_flight;
pub mod journal;
pub mod slip;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use tracechain_core::{Address, BoxId, DispatchId, ProductId};
use tracechain_events::{normalize, DispatchRecord, EntryRecord, LedgerEventKind, NormalizedEvent};
use tracechain_products::{Product, ProductEntry, ProductStatus};

use crate::ledger::{DispatchItem, LedgerCall, LedgerClient, LifeCycleSnapshot, Receipt, ReceiptStatus, TxHash};

pub use error::SubmitError;
pub use in_flight::{InFlightGuard, InFlightSet};
pub use journal::{
    IdempotencyKey, JournalEntry, JournalError, SubmissionJournal, SubmissionStatus, DEFAULT_RETENTION,
};
pub use slip::{PrintError, RecordingPrinter, SaleSlip, SlipPrinter};

/// A confirmed submission and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmed<T> {
    pub key: IdempotencyKey,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub value: T,
}

/// Product ids minted by one customs entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnteredProducts {
    pub box_id: BoxId,
    pub first_id: ProductId,
    pub last_id: ProductId,
}

impl EnteredProducts {
    pub fn quantity(&self) -> u64 {
        self.last_id.get() - self.first_id.get() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    pub slip: SaleSlip,
    /// Whether the slip printer hook succeeded. A failed print never undoes a sale.
    pub printed: bool,
}

/// What a confirmed call produced, read back from its logs.
///
/// `retry` reports the same value the original call would have returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", content = "result", rename_all = "snake_case")]
pub enum Outcome {
    Entered(EnteredProducts),
    Dispatched(DispatchRecord),
    Accepted(DispatchItem),
    Sold(Sale),
    Reported,
    PriceUpdated,
}

/// Submits calls for one account.
pub struct ActionSubmitter<L: ?Sized> {
    ledger: Arc<L>,
    account: Address,
    confirmation_timeout: Duration,
    journal: SubmissionJournal,
    in_flight: InFlightSet,
    printer: Option<Arc<dyn SlipPrinter>>,
}

impl<L> ActionSubmitter<L>
where
    L: LedgerClient + ?Sized,
{
    pub fn new(ledger: Arc<L>, account: Address, confirmation_timeout: Duration) -> Self {
        Self {
            ledger,
            account,
            confirmation_timeout,
            journal: SubmissionJournal::new(),
            in_flight: InFlightSet::new(),
            printer: None,
        }
    }

    pub fn with_printer(mut self, printer: Arc<dyn SlipPrinter>) -> Self {
        self.printer = Some(printer);
        self
    }

    /// Keep at most `retention` resolved submissions in the journal.
    pub fn with_journal_retention(mut self, retention: usize) -> Self {
        self.journal = SubmissionJournal::with_retention(retention);
        self
    }

    pub fn account(&self) -> &Address {
        &self.account
    }

    pub fn journal(&self) -> &SubmissionJournal {
        &self.journal
    }

    /// `bulkProductEntry`: mint `entry.quantity` products under one new box.
    pub async fn enter_product(&self, entry: ProductEntry) -> Result<Confirmed<EnteredProducts>, SubmitError> {
        entry.validate()?;

        let counter = self.ledger.product_counter().await?;
        let call = LedgerCall::BulkProductEntry {
            entry,
            customs: self.account.clone(),
        };
        let key = IdempotencyKey::new();
        let receipt = self.submit_and_confirm(key, call).await?;

        let entered = self.entered_in(&receipt.tx_hash).await?;
        if entered.first_id.get() != counter + 1 {
            tracing::debug!(
                key = %key,
                expected = counter + 1,
                actual = %entered.first_id,
                "another entry was mined first"
            );
        }

        Ok(confirmed(key, &receipt, entered))
    }

    /// `dispatch(startId, endId, to, memo)` to the next custodian.
    pub async fn dispatch(
        &self,
        start_id: ProductId,
        end_id: ProductId,
        to: Address,
        memo: Option<String>,
    ) -> Result<Confirmed<DispatchRecord>, SubmitError> {
        if start_id.get() == 0 {
            return Err(SubmitError::validation("product id cannot be 0"));
        }
        if start_id > end_id {
            return Err(SubmitError::validation(format!("invalid range {start_id}..={end_id}")));
        }
        if to == self.account {
            return Err(SubmitError::validation("cannot dispatch to yourself"));
        }
        if to.is_burn() {
            return Err(SubmitError::validation("dispatching to the burn address is a sale"));
        }

        let start = self.owned_life_cycle(start_id).await?;
        if start.in_transit.is_some() {
            return Err(SubmitError::precondition(format!("product {start_id} is already in transit")));
        }
        if end_id != start_id && self.ledger.product_life_cycle(end_id).await?.is_none() {
            return Err(SubmitError::precondition(format!("product {end_id} does not exist")));
        }

        let call = LedgerCall::Dispatch {
            start_id,
            end_id,
            to,
            memo: memo.filter(|m| !m.trim().is_empty()),
        };
        let key = IdempotencyKey::new();
        let receipt = self.submit_and_confirm(key, call).await?;
        let record = self.dispatched_in(&receipt.tx_hash).await?;
        Ok(confirmed(key, &receipt, record))
    }

    /// `confirmDelivery(dispatchId)`.
    ///
    /// Refused while another confirmation of the same dispatch is being
    /// submitted, or while a timed-out one has not been resolved by `retry`.
    pub async fn confirm_delivery(&self, dispatch_id: DispatchId) -> Result<Confirmed<DispatchItem>, SubmitError> {
        if dispatch_id.get() == 0 {
            return Err(SubmitError::validation("dispatch id cannot be 0"));
        }

        let _guard = self.in_flight.try_acquire(dispatch_id).ok_or(SubmitError::InFlight {
            dispatch_id,
            key: None,
        })?;
        if let Some(key) = self.journal.unresolved_confirmation(dispatch_id)? {
            return Err(SubmitError::InFlight {
                dispatch_id,
                key: Some(key),
            });
        }

        if self.ledger.dispatch_length(dispatch_id).await? == 0 {
            return Err(SubmitError::precondition(format!("dispatch {dispatch_id} does not exist")));
        }
        let item = self
            .ledger
            .dispatch_item(dispatch_id, 0)
            .await?
            .ok_or_else(|| SubmitError::precondition(format!("dispatch {dispatch_id} does not exist")))?;
        if item.to != self.account {
            return Err(SubmitError::precondition(format!("dispatch {dispatch_id} is not addressed to you")));
        }
        let in_transit = self
            .ledger
            .product_life_cycle(item.start_id)
            .await?
            .and_then(|lc| lc.in_transit);
        if in_transit != Some(dispatch_id) {
            return Err(SubmitError::precondition(format!("dispatch {dispatch_id} was already accepted")));
        }

        let key = IdempotencyKey::new();
        let receipt = self
            .submit_and_confirm(key, LedgerCall::ConfirmDelivery { dispatch_id })
            .await?;
        Ok(confirmed(key, &receipt, item))
    }

    /// Sell one product to the end consumer: a dispatch to the burn address
    /// with the price as memo. The slip printer runs only after confirmation.
    pub async fn sell(&self, product_id: ProductId, price: u64) -> Result<Confirmed<Sale>, SubmitError> {
        if product_id.get() == 0 {
            return Err(SubmitError::validation("product id cannot be 0"));
        }
        if price == 0 {
            return Err(SubmitError::validation("price must be positive"));
        }

        let life_cycle = self.owned_life_cycle(product_id).await?;
        if !matches!(life_cycle.status, ProductStatus::InHouse(_)) {
            return Err(SubmitError::precondition(format!(
                "product {product_id} is not in house ({})",
                life_cycle.status
            )));
        }
        let product = self
            .ledger
            .product(product_id)
            .await?
            .ok_or_else(|| SubmitError::precondition(format!("product {product_id} does not exist")))?;

        let call = LedgerCall::Dispatch {
            start_id: product_id,
            end_id: product_id,
            to: Address::burn(),
            memo: Some(price.to_string()),
        };
        let key = IdempotencyKey::new();
        let receipt = self.submit_and_confirm(key, call).await?;
        let record = self.dispatched_in(&receipt.tx_hash).await?;
        let sale = self.complete_sale(key, &product, price, &record);

        Ok(confirmed(key, &receipt, sale))
    }

    /// `reportProduct(productId, desc, reportee, proofHash)`. Only the current
    /// owner may report.
    pub async fn report_product(
        &self,
        product_id: ProductId,
        description: String,
        report_for: Address,
        proof_hash: String,
    ) -> Result<Confirmed<()>, SubmitError> {
        if product_id.get() == 0 {
            return Err(SubmitError::validation("product id cannot be 0"));
        }
        if description.trim().is_empty() {
            return Err(SubmitError::validation("report description cannot be empty"));
        }
        if proof_hash.trim().is_empty() {
            return Err(SubmitError::validation("proof hash cannot be empty"));
        }
        if report_for.is_burn() {
            return Err(SubmitError::validation("reportee cannot be the burn address"));
        }

        self.owned_life_cycle(product_id).await?;

        let call = LedgerCall::ReportProduct {
            product_id,
            description,
            report_for,
            proof_hash,
        };
        let key = IdempotencyKey::new();
        let receipt = self.submit_and_confirm(key, call).await?;
        Ok(confirmed(key, &receipt, ()))
    }

    /// `updateMultipleProductPriceByImporter(boxId, price)`. The ledger checks
    /// that the caller imports the box.
    pub async fn update_price(&self, box_id: BoxId, price: u64) -> Result<Confirmed<()>, SubmitError> {
        if box_id.get() == 0 {
            return Err(SubmitError::validation("box id cannot be 0"));
        }
        if price == 0 {
            return Err(SubmitError::validation("price must be positive"));
        }

        let key = IdempotencyKey::new();
        let receipt = self.submit_and_confirm(key, LedgerCall::UpdatePrice { box_id, price }).await?;
        Ok(confirmed(key, &receipt, ()))
    }

    /// Resolve a journaled submission.
    ///
    /// A submission that has a transaction hash is re-awaited, never resent.
    /// Only a submission that failed (no hash, or reverted) is submitted again
    /// under the same key. Once confirmed, the follow-up a direct call would run
    /// (the sale slip) runs here too.
    pub async fn retry(&self, key: IdempotencyKey) -> Result<Confirmed<Outcome>, SubmitError> {
        let entry = self.journal.get(key)?.ok_or(SubmitError::UnknownKey(key))?;

        let _guard = match entry.confirms() {
            Some(dispatch_id) => Some(
                self.in_flight
                    .try_acquire(dispatch_id)
                    .ok_or(SubmitError::InFlight {
                        dispatch_id,
                        key: Some(key),
                    })?,
            ),
            None => None,
        };

        let receipt = match (&entry.status, &entry.tx_hash) {
            (SubmissionStatus::Failed { .. }, _) => {
                tracing::info!(key = %key, call = entry.call.name(), "resubmitting failed submission");
                self.submit_and_confirm(key, entry.call.clone()).await?
            }
            (_, Some(tx_hash)) => {
                tracing::info!(key = %key, tx = %tx_hash, "re-awaiting submission");
                self.await_confirmation(key, tx_hash.clone()).await?
            }
            (_, None) => {
                return Err(SubmitError::Submission {
                    key,
                    reason: "submission is still being sent".to_string(),
                });
            }
        };

        let outcome = self.outcome_of(key, &entry.call, &receipt).await?;
        Ok(confirmed(key, &receipt, outcome))
    }

    /// Rebuild what a confirmed `call` produced.
    async fn outcome_of(&self, key: IdempotencyKey, call: &LedgerCall, receipt: &Receipt) -> Result<Outcome, SubmitError> {
        let outcome = match call {
            LedgerCall::BulkProductEntry { .. } => Outcome::Entered(self.entered_in(&receipt.tx_hash).await?),
            LedgerCall::Dispatch { start_id, to, memo, .. } if to.is_burn() => {
                let price = memo
                    .as_deref()
                    .and_then(|m| m.trim().parse::<u64>().ok())
                    .ok_or_else(|| SubmitError::Unavailable(format!("sale {key} has no price memo")))?;
                let product = self
                    .ledger
                    .product(*start_id)
                    .await?
                    .ok_or_else(|| SubmitError::Unavailable(format!("sold product {start_id} does not exist")))?;
                let record = self.dispatched_in(&receipt.tx_hash).await?;
                Outcome::Sold(self.complete_sale(key, &product, price, &record))
            }
            LedgerCall::Dispatch { .. } => Outcome::Dispatched(self.dispatched_in(&receipt.tx_hash).await?),
            LedgerCall::ConfirmDelivery { dispatch_id } => Outcome::Accepted(
                self.ledger
                    .dispatch_item(*dispatch_id, 0)
                    .await?
                    .ok_or_else(|| SubmitError::Unavailable(format!("dispatch {dispatch_id} has no items")))?,
            ),
            LedgerCall::ReportProduct { .. } => Outcome::Reported,
            LedgerCall::UpdatePrice { .. } => Outcome::PriceUpdated,
        };
        Ok(outcome)
    }

    /// Build the slip for a confirmed sale and hand it to the printer.
    fn complete_sale(&self, key: IdempotencyKey, product: &Product, price: u64, record: &DispatchRecord) -> Sale {
        let slip = SaleSlip::new(product, price, self.account.clone(), record.dispatch_id(), record.timestamp());
        let printed = match &self.printer {
            Some(printer) => match printer.print(&slip) {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(key = %key, product_id = %product.product_id, "sale confirmed but slip not printed: {error}");
                    false
                }
            },
            None => false,
        };
        Sale { slip, printed }
    }

    /// Nothing unresolved and no confirmation being sent.
    pub fn is_idle(&self) -> Result<bool, SubmitError> {
        Ok(self.in_flight.is_empty() && !self.journal.has_unresolved()?)
    }

    async fn owned_life_cycle(&self, product_id: ProductId) -> Result<LifeCycleSnapshot, SubmitError> {
        let life_cycle = self
            .ledger
            .product_life_cycle(product_id)
            .await?
            .ok_or_else(|| SubmitError::precondition(format!("product {product_id} does not exist")))?;
        if life_cycle.owner != self.account {
            return Err(SubmitError::precondition(format!("you do not own product {product_id}")));
        }
        Ok(life_cycle)
    }

    async fn submit_and_confirm(&self, key: IdempotencyKey, call: LedgerCall) -> Result<Receipt, SubmitError> {
        self.journal.begin(key, &self.account, &call)?;
        tracing::info!(key = %key, account = %self.account, call = call.name(), "submitting");

        let call_name = call.name();
        let tx_hash = match self.ledger.submit(&self.account, call).await {
            Ok(tx_hash) => tx_hash,
            Err(error) => {
                let reason = error.to_string();
                tracing::warn!(key = %key, call = call_name, "submission failed: {reason}");
                self.journal
                    .set_status(key, SubmissionStatus::Failed { reason: reason.clone() })?;
                return Err(SubmitError::Submission { key, reason });
            }
        };
        self.journal.set_tx_hash(key, &tx_hash)?;

        self.await_confirmation(key, tx_hash).await
    }

    async fn await_confirmation(&self, key: IdempotencyKey, tx_hash: TxHash) -> Result<Receipt, SubmitError> {
        let waited = tokio::time::timeout(self.confirmation_timeout, self.ledger.wait_for_receipt(&tx_hash)).await;

        let receipt = match waited {
            Err(_) => {
                tracing::warn!(key = %key, tx = %tx_hash, timeout = ?self.confirmation_timeout, "confirmation timed out");
                self.journal.set_status(key, SubmissionStatus::Unknown)?;
                return Err(SubmitError::TimedOut {
                    key,
                    tx_hash,
                    timeout: self.confirmation_timeout,
                });
            }
            Ok(Err(error)) => {
                tracing::warn!(key = %key, tx = %tx_hash, "confirmation wait failed: {error}");
                self.journal.set_status(key, SubmissionStatus::Unknown)?;
                return Err(SubmitError::Submission {
                    key,
                    reason: error.to_string(),
                });
            }
            Ok(Ok(receipt)) => receipt,
        };

        match &receipt.status {
            ReceiptStatus::Success => {
                tracing::info!(key = %key, tx = %tx_hash, block = receipt.block_number, "confirmed");
                self.journal.set_status(key, SubmissionStatus::Confirmed)?;
                Ok(receipt)
            }
            ReceiptStatus::Reverted { reason } => {
                tracing::warn!(key = %key, tx = %tx_hash, "reverted: {reason}");
                self.journal
                    .set_status(key, SubmissionStatus::Failed { reason: reason.clone() })?;
                Err(SubmitError::Submission {
                    key,
                    reason: reason.clone(),
                })
            }
        }
    }

    /// The box and id range minted by `tx_hash`.
    async fn entered_in(&self, tx_hash: &TxHash) -> Result<EnteredProducts, SubmitError> {
        let mut minted: Vec<EntryRecord> = self
            .ledger
            .query_events(LedgerEventKind::ProductAdded)
            .await?
            .iter()
            .filter(|e| e.tx_hash() == tx_hash.as_str())
            .filter_map(|e| match normalize(e) {
                Ok(NormalizedEvent::Entry(record)) => Some(record),
                _ => None,
            })
            .collect();
        minted.sort_by_key(|r| r.product_id);

        let (Some(first), Some(last)) = (minted.first(), minted.last()) else {
            return Err(SubmitError::Unavailable(format!(
                "entry {tx_hash} confirmed but left no ProductAdded log"
            )));
        };
        Ok(EnteredProducts {
            box_id: first.box_id,
            first_id: first.product_id,
            last_id: last.product_id,
        })
    }

    /// The dispatch record emitted by `tx_hash`.
    async fn dispatched_in(&self, tx_hash: &TxHash) -> Result<DispatchRecord, SubmitError> {
        for kind in [LedgerEventKind::ProductDispatched, LedgerEventKind::MultiProductDispatched] {
            let found = self
                .ledger
                .query_events(kind)
                .await?
                .iter()
                .filter(|e| e.tx_hash() == tx_hash.as_str())
                .find_map(|e| match normalize(e) {
                    Ok(NormalizedEvent::Dispatch(record)) => Some(record),
                    _ => None,
                });
            if let Some(record) = found {
                return Ok(record);
            }
        }
        Err(SubmitError::Unavailable(format!(
            "dispatch {tx_hash} confirmed but left no dispatch log"
        )))
    }
}

fn confirmed<T>(key: IdempotencyKey, receipt: &Receipt, value: T) -> Confirmed<T> {
    Confirmed {
        key,
        tx_hash: receipt.tx_hash.clone(),
        block_number: receipt.block_number,
        value,
    }
}
