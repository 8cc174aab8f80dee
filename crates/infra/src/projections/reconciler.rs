//! Status reconciler: is a dispatch still waiting for its receiver?
//!
//! Events say what happened; the life-cycle snapshot says where each product is
//! now. A dispatch viewed from receiving stage `S` is **pending** iff, for the
//! life-cycle record consulted:
//!
//! 1. `S` has not dispatched the product onward yet,
//! 2. the current owner is still the dispatch's sender,
//! 3. the status is not already `InHouse(S)`.
//!
//! Both ends of the dispatched range are checked. When they disagree the
//! configured [`RangePolicy`] decides.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tracechain_core::ProductId;
use tracechain_events::DispatchRecord;
use tracechain_products::{Custodian, ProductStatus};

use crate::ledger::LifeCycleSnapshot;

/// What to do when the first and last product of a range disagree.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePolicy {
    /// Classify as invalid. Never offers a stale accept.
    #[default]
    Conservative,
    /// Classify as pending if either end is pending.
    Inclusive,
}

impl core::str::FromStr for RangePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RangePolicy::Conservative),
            "inclusive" => Ok(RangePolicy::Inclusive),
            other => Err(format!("unknown range policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidReason {
    /// The ledger has no life-cycle record for a product in the range.
    MissingLifeCycle { product_id: ProductId },
    /// The first and last product of the range disagree.
    RangeDisagreement { start_pending: bool, end_pending: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Classification {
    Pending,
    Completed,
    Invalid(InvalidReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedDispatch {
    pub record: DispatchRecord,
    pub classification: Classification,
}

impl ClassifiedDispatch {
    pub fn is_pending(&self) -> bool {
        self.classification == Classification::Pending
    }
}

/// Pending/completed classification for one receiving stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatusReconciler {
    stage: Custodian,
    policy: RangePolicy,
}

impl StatusReconciler {
    pub fn new(stage: Custodian, policy: RangePolicy) -> Self {
        Self { stage, policy }
    }

    pub fn stage(&self) -> Custodian {
        self.stage
    }

    pub fn policy(&self) -> RangePolicy {
        self.policy
    }

    /// The three-way check against one life-cycle record.
    pub fn is_pending(&self, record: &DispatchRecord, snapshot: &LifeCycleSnapshot) -> bool {
        snapshot.onward.get(self.stage).is_none()
            && &snapshot.owner == record.from()
            && snapshot.status != ProductStatus::InHouse(self.stage)
    }

    pub fn classify(
        &self,
        record: &DispatchRecord,
        snapshots: &HashMap<ProductId, LifeCycleSnapshot>,
    ) -> Classification {
        if record.is_sale() {
            return Classification::Completed;
        }

        let Some(start) = snapshots.get(&record.start_id()) else {
            return Classification::Invalid(InvalidReason::MissingLifeCycle {
                product_id: record.start_id(),
            });
        };
        let Some(end) = snapshots.get(&record.end_id()) else {
            return Classification::Invalid(InvalidReason::MissingLifeCycle {
                product_id: record.end_id(),
            });
        };

        let start_pending = self.is_pending(record, start);
        let end_pending = self.is_pending(record, end);

        match (start_pending, end_pending) {
            (true, true) => Classification::Pending,
            (false, false) => Classification::Completed,
            _ => match self.policy {
                RangePolicy::Inclusive => Classification::Pending,
                RangePolicy::Conservative => {
                    tracing::debug!(
                        dispatch_id = %record.dispatch_id(),
                        start_pending,
                        end_pending,
                        "range ends disagree"
                    );
                    Classification::Invalid(InvalidReason::RangeDisagreement {
                        start_pending,
                        end_pending,
                    })
                }
            },
        }
    }
}
