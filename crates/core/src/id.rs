//! Ledger-assigned identifiers.
//!
//! Every identifier is a counter handed out by the ledger (products, boxes and
//! dispatches each have their own sequence starting at 1). Zero is reserved by
//! the ledger to mean "unset", so it never names a real record.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a single product unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

/// Identifier of a box: the batch of products minted by one entry call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxId(u64);

/// Identifier of a dispatch. Single and multi-item dispatches share this sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchId(u64);

macro_rules! impl_counter_id {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Reject the ledger's "unset" sentinel.
            pub fn non_zero(value: u64) -> Result<Self, DomainError> {
                if value == 0 {
                    return Err(DomainError::invalid_id(concat!($name, " cannot be 0")));
                }
                Ok(Self(value))
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Self::non_zero(value)
            }
        }
    };
}

impl_counter_id!(ProductId, "ProductId");
impl_counter_id!(BoxId, "BoxId");
impl_counter_id!(DispatchId, "DispatchId");

impl ProductId {
    /// Next id in the product sequence, or `None` on overflow.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}
