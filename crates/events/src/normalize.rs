//! Event normalizer: raw ledger logs → uniform records.
//!
//! Pure mapping, no IO. A log that cannot be normalized is skipped and reported;
//! it never fails the batch it came in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use tracechain_core::{Address, BoxId, DispatchId, ProductId};

use crate::records::{
    AcceptanceRecord, DispatchKind, DispatchRecord, EntryRecord, NormalizedEvent, ReportRecord,
};
use crate::{LedgerEventKind, LogPosition, RawLedgerEvent};

/// Why a single log was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedEventError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` is not an integer: {value}")]
    NotAnInteger { field: String, value: String },

    #[error("field `{field}` does not fit in {target}: {value}")]
    Overflow {
        field: String,
        target: String,
        value: String,
    },

    #[error("field `{field}` is not a string")]
    NotAString { field: String },

    #[error("field `{field}` is not a valid address: {reason}")]
    InvalidAddress { field: String, reason: String },

    #[error("field `{field}` is not a representable timestamp: {value}")]
    InvalidTimestamp { field: String, value: i64 },

    #[error("field `{field}` is zero, which the ledger reserves for \"unset\"")]
    ZeroId { field: String },

    #[error("dispatch quantity must be positive, found {quantity}")]
    NonPositiveQuantity { quantity: i128 },

    #[error("dispatch range is inverted or inconsistent with its kind: {start}..={end}")]
    InvertedRange { start: u64, end: u64 },
}

/// A log the normalizer rejected, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEvent {
    pub kind: LedgerEventKind,
    pub position: LogPosition,
    pub tx_hash: String,
    pub error: MalformedEventError,
}

/// Output of [`normalize_batch`]: every input log lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedBatch {
    pub events: Vec<NormalizedEvent>,
    pub skipped: Vec<SkippedEvent>,
}

impl NormalizedBatch {
    pub fn entries(&self) -> impl Iterator<Item = &EntryRecord> {
        self.events.iter().filter_map(|e| match e {
            NormalizedEvent::Entry(r) => Some(r),
            _ => None,
        })
    }

    pub fn dispatches(&self) -> impl Iterator<Item = &DispatchRecord> {
        self.events.iter().filter_map(|e| match e {
            NormalizedEvent::Dispatch(r) => Some(r),
            _ => None,
        })
    }

    pub fn acceptances(&self) -> impl Iterator<Item = &AcceptanceRecord> {
        self.events.iter().filter_map(|e| match e {
            NormalizedEvent::Acceptance(r) => Some(r),
            _ => None,
        })
    }

    pub fn reports(&self) -> impl Iterator<Item = &ReportRecord> {
        self.events.iter().filter_map(|e| match e {
            NormalizedEvent::Report(r) => Some(r),
            _ => None,
        })
    }
}

/// Normalize a batch of logs, collecting failures instead of aborting.
///
/// Zero-quantity dispatches are routine (the ledger emits them for bookkeeping)
/// and are logged at debug; every other rejection is a warning.
pub fn normalize_batch<'a>(raw: impl IntoIterator<Item = &'a RawLedgerEvent>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for event in raw {
        match normalize(event) {
            Ok(record) => batch.events.push(record),
            Err(error) => {
                if matches!(error, MalformedEventError::NonPositiveQuantity { .. }) {
                    tracing::debug!(
                        kind = %event.kind(),
                        position = %event.position(),
                        "skipping non-actionable dispatch: {error}"
                    );
                } else {
                    tracing::warn!(
                        kind = %event.kind(),
                        position = %event.position(),
                        tx_hash = event.tx_hash(),
                        "skipping malformed ledger event: {error}"
                    );
                }
                batch.skipped.push(SkippedEvent {
                    kind: event.kind(),
                    position: event.position(),
                    tx_hash: event.tx_hash().to_string(),
                    error,
                });
            }
        }
    }

    batch
}

/// Normalize one raw log.
pub fn normalize(event: &RawLedgerEvent) -> Result<NormalizedEvent, MalformedEventError> {
    let args = Args(event);
    match event.kind() {
        LedgerEventKind::ProductAdded => Ok(NormalizedEvent::Entry(EntryRecord {
            product_id: args.product_id("id")?,
            box_id: BoxId::new(args.non_zero("boxId")?),
            name: args.text("name")?,
            description: args.text("description")?,
            category: args.text("category")?,
            country_of_origin: args.text("countryOfOrigin")?,
            manufacturer: args.text("manufacturer")?,
            price: args.u64("price")?,
            quantity: args.u64("quantity")?,
            imported_at: args.timestamp("importedDate")?,
            importer: args.address("importerAddr")?,
            customs: args.address("customsAddr")?,
            position: event.position(),
        })),
        LedgerEventKind::ProductDispatched => {
            let product_id = args.product_id("productId")?;
            dispatch_record(&args, DispatchKind::Single, product_id, product_id)
        }
        LedgerEventKind::MultiProductDispatched => {
            let start_id = args.product_id("startId")?;
            // Contracts deployed before bulk dispatch existed omit `endId`.
            let end_id = match args.optional("endId") {
                Some(_) => args.product_id("endId")?,
                None => start_id,
            };
            dispatch_record(&args, DispatchKind::Multi, start_id, end_id)
        }
        LedgerEventKind::ProductAccepted => Ok(NormalizedEvent::Acceptance(AcceptanceRecord {
            dispatch_id: DispatchId::new(args.non_zero("dispatchId")?),
            product_id: args.product_id("productId")?,
            accepted_by: args.address("acceptedBy")?,
            accepted_at: args.timestamp("acceptedOn")?,
            status_code: args.u8("status")?,
            position: event.position(),
        })),
        LedgerEventKind::ReportForProduct => {
            let id_field = if args.optional("productID").is_some() { "productID" } else { "productId" };
            Ok(NormalizedEvent::Report(ReportRecord {
                product_id: args.product_id(id_field)?,
                description: args.text("reportDesc")?,
                report_by: args.address("reportBy")?,
                report_for: args.address("reportFor")?,
                reported_at: args.timestamp("reportedOn")?,
                proof_hash: args.optional_text("ipfsProofHash")?,
                position: event.position(),
            }))
        }
    }
}

fn dispatch_record(
    args: &Args<'_>,
    kind: DispatchKind,
    start_id: ProductId,
    end_id: ProductId,
) -> Result<NormalizedEvent, MalformedEventError> {
    let quantity = args.integer("quantity")?;
    if quantity <= 0 {
        return Err(MalformedEventError::NonPositiveQuantity { quantity });
    }
    let quantity = narrow::<u64>("quantity", quantity, "u64")?;

    let record = DispatchRecord::new(
        DispatchId::new(args.non_zero("dispatchId")?),
        kind,
        start_id,
        end_id,
        args.address("from")?,
        args.address("to")?,
        args.timestamp("dispatchedOn")?,
        quantity,
        args.optional_text("ipfsDocHash")?,
        args.0.position(),
    )?;
    Ok(NormalizedEvent::Dispatch(record))
}

struct Args<'a>(&'a RawLedgerEvent);

impl Args<'_> {
    fn optional(&self, field: &str) -> Option<&JsonValue> {
        self.0.arg(field).filter(|v| !v.is_null())
    }

    fn required(&self, field: &str) -> Result<&JsonValue, MalformedEventError> {
        self.optional(field).ok_or_else(|| MalformedEventError::MissingField {
            field: field.to_string(),
        })
    }

    /// Read a ledger integer at full width. Anything wider than `i128` is an
    /// overflow, not a parse failure.
    fn integer(&self, field: &str) -> Result<i128, MalformedEventError> {
        let value = self.required(field)?;
        match value {
            JsonValue::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from))
                .ok_or_else(|| MalformedEventError::NotAnInteger {
                    field: field.to_string(),
                    value: n.to_string(),
                }),
            JsonValue::String(s) => parse_wide_integer(field, s),
            other => Err(MalformedEventError::NotAnInteger {
                field: field.to_string(),
                value: other.to_string(),
            }),
        }
    }

    fn u64(&self, field: &str) -> Result<u64, MalformedEventError> {
        narrow(field, self.integer(field)?, "u64")
    }

    fn u8(&self, field: &str) -> Result<u8, MalformedEventError> {
        narrow(field, self.integer(field)?, "u8")
    }

    fn non_zero(&self, field: &str) -> Result<u64, MalformedEventError> {
        let value = self.u64(field)?;
        if value == 0 {
            return Err(MalformedEventError::ZeroId {
                field: field.to_string(),
            });
        }
        Ok(value)
    }

    fn product_id(&self, field: &str) -> Result<ProductId, MalformedEventError> {
        self.non_zero(field).map(ProductId::new)
    }

    fn timestamp(&self, field: &str) -> Result<DateTime<Utc>, MalformedEventError> {
        let secs: i64 = narrow(field, self.integer(field)?, "i64")?;
        DateTime::from_timestamp(secs, 0).ok_or_else(|| MalformedEventError::InvalidTimestamp {
            field: field.to_string(),
            value: secs,
        })
    }

    fn text(&self, field: &str) -> Result<String, MalformedEventError> {
        match self.required(field)? {
            JsonValue::String(s) => Ok(s.clone()),
            _ => Err(MalformedEventError::NotAString {
                field: field.to_string(),
            }),
        }
    }

    fn optional_text(&self, field: &str) -> Result<Option<String>, MalformedEventError> {
        match self.optional(field) {
            None => Ok(None),
            Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(MalformedEventError::NotAString {
                field: field.to_string(),
            }),
        }
    }

    fn address(&self, field: &str) -> Result<Address, MalformedEventError> {
        let raw = self.text(field)?;
        Address::parse(&raw).map_err(|e| MalformedEventError::InvalidAddress {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

fn parse_wide_integer(field: &str, raw: &str) -> Result<i128, MalformedEventError> {
    let s = raw.trim();
    let (negative, magnitude) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (digits, radix) = match magnitude.strip_prefix("0x").or_else(|| magnitude.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (magnitude, 10),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(MalformedEventError::NotAnInteger {
            field: field.to_string(),
            value: raw.to_string(),
        });
    }

    let value = i128::from_str_radix(digits, radix).map_err(|_| MalformedEventError::Overflow {
        field: field.to_string(),
        target: "i128".to_string(),
        value: raw.to_string(),
    })?;

    Ok(if negative { -value } else { value })
}

fn narrow<T: TryFrom<i128>>(field: &str, value: i128, target: &str) -> Result<T, MalformedEventError> {
    T::try_from(value).map_err(|_| MalformedEventError::Overflow {
        field: field.to_string(),
        target: target.to_string(),
        value: value.to_string(),
    })
}
