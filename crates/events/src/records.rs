//! Normalized record shapes.
//!
//! Whatever event produced them, records carry plain numeric ids, `DateTime<Utc>`
//! timestamps and normalized addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracechain_core::{Address, BoxId, DispatchId, ProductId};

use crate::normalize::MalformedEventError;
use crate::{Event, LogPosition};

/// Which dispatch event produced a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchKind {
    /// `ProductDispatched`: exactly one product id.
    Single,
    /// `MultiProductDispatched`: an inclusive id range.
    Multi,
}

/// One dispatch of an inclusive product id range from one custodian to another.
///
/// Constructed only through [`DispatchRecord::new`], which enforces
/// `start_id <= end_id`, `quantity > 0` and `start_id == end_id` for
/// [`DispatchKind::Single`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    dispatch_id: DispatchId,
    kind: DispatchKind,
    start_id: ProductId,
    end_id: ProductId,
    from: Address,
    to: Address,
    timestamp: DateTime<Utc>,
    quantity: u64,
    memo: Option<String>,
    position: LogPosition,
}

impl DispatchRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dispatch_id: DispatchId,
        kind: DispatchKind,
        start_id: ProductId,
        end_id: ProductId,
        from: Address,
        to: Address,
        timestamp: DateTime<Utc>,
        quantity: u64,
        memo: Option<String>,
        position: LogPosition,
    ) -> Result<Self, MalformedEventError> {
        if start_id > end_id {
            return Err(MalformedEventError::InvertedRange {
                start: start_id.get(),
                end: end_id.get(),
            });
        }
        if kind == DispatchKind::Single && start_id != end_id {
            return Err(MalformedEventError::InvertedRange {
                start: start_id.get(),
                end: end_id.get(),
            });
        }
        if quantity == 0 {
            return Err(MalformedEventError::NonPositiveQuantity { quantity: 0 });
        }

        Ok(Self {
            dispatch_id,
            kind,
            start_id,
            end_id,
            from,
            to,
            timestamp,
            quantity,
            memo: memo.filter(|m| !m.trim().is_empty()),
            position,
        })
    }

    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    pub fn kind(&self) -> DispatchKind {
        self.kind
    }

    pub fn start_id(&self) -> ProductId {
        self.start_id
    }

    pub fn end_id(&self) -> ProductId {
        self.end_id
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn position(&self) -> LogPosition {
        self.position
    }

    /// A dispatch to the burn address is a sale to the end consumer.
    pub fn is_sale(&self) -> bool {
        self.to.is_burn()
    }

    pub fn covers(&self, product_id: ProductId) -> bool {
        self.start_id <= product_id && product_id <= self.end_id
    }
}

/// One product minted by a customs entry (`ProductAdded`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub product_id: ProductId,
    pub box_id: BoxId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub country_of_origin: String,
    pub manufacturer: String,
    pub price: u64,
    /// Number of products in the box this product was minted with.
    pub quantity: u64,
    pub imported_at: DateTime<Utc>,
    pub importer: Address,
    pub customs: Address,
    pub position: LogPosition,
}

/// A receiver confirmed delivery of a dispatch (`ProductAccepted`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceRecord {
    pub dispatch_id: DispatchId,
    pub product_id: ProductId,
    pub accepted_by: Address,
    pub accepted_at: DateTime<Utc>,
    /// Ledger status code after acceptance.
    pub status_code: u8,
    pub position: LogPosition,
}

/// A dispute report filed against a party for a product (`ReportForProduct`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub product_id: ProductId,
    pub description: String,
    pub report_by: Address,
    pub report_for: Address,
    pub reported_at: DateTime<Utc>,
    pub proof_hash: Option<String>,
    pub position: LogPosition,
}

/// Any normalized ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record")]
pub enum NormalizedEvent {
    Entry(EntryRecord),
    Dispatch(DispatchRecord),
    Acceptance(AcceptanceRecord),
    Report(ReportRecord),
}

impl NormalizedEvent {
    pub fn position(&self) -> LogPosition {
        match self {
            NormalizedEvent::Entry(r) => r.position,
            NormalizedEvent::Dispatch(r) => r.position,
            NormalizedEvent::Acceptance(r) => r.position,
            NormalizedEvent::Report(r) => r.position,
        }
    }
}

impl Event for NormalizedEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NormalizedEvent::Entry(_) => "ProductAdded",
            NormalizedEvent::Dispatch(r) => match r.kind {
                DispatchKind::Single => "ProductDispatched",
                DispatchKind::Multi => "MultiProductDispatched",
            },
            NormalizedEvent::Acceptance(_) => "ProductAccepted",
            NormalizedEvent::Report(_) => "ReportForProduct",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            NormalizedEvent::Entry(r) => r.imported_at,
            NormalizedEvent::Dispatch(r) => r.timestamp,
            NormalizedEvent::Acceptance(r) => r.accepted_at,
            NormalizedEvent::Report(r) => r.reported_at,
        }
    }
}
