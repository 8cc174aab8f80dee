use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use tracechain_core::{Address, ProductId};
use tracechain_events::{AcceptanceRecord, DispatchRecord, NormalizedBatch, ReportRecord, SkippedEvent};
use tracechain_products::Custodian;

use super::dispatches::{
    accepted_by, dispatch_view, incoming_to, reports_by, sales_by, sent_by, track_product, AggregateError,
};
use super::entries::{entry_view, BoxEntry};
use super::reconciler::{Classification, ClassifiedDispatch, RangePolicy, StatusReconciler};
use crate::directory::{DisplayLabel, LabelResolver};
use crate::ledger::LifeCycleSnapshot;

/// Everything one panel shows, rebuilt from scratch on every refresh.
///
/// Built by [`ReconciliationState::build`], a pure function of the normalized
/// events, the life-cycle snapshots and the directory.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationState {
    pub viewer: Address,
    pub stage: Custodian,
    pub policy: RangePolicy,
    pub entries: Vec<BoxEntry>,
    /// Every dispatch, newest first.
    pub dispatches: Vec<DispatchRecord>,
    /// Dispatches addressed to the viewer, classified for its stage.
    pub incoming: Vec<ClassifiedDispatch>,
    pub sent: Vec<DispatchRecord>,
    pub sales: Vec<DispatchRecord>,
    pub deliveries: Vec<AcceptanceRecord>,
    pub reports: Vec<ReportRecord>,
    pub labels: BTreeMap<Address, DisplayLabel>,
    pub skipped: Vec<SkippedEvent>,
}

impl ReconciliationState {
    pub fn build(
        viewer: Address,
        stage: Custodian,
        policy: RangePolicy,
        batch: &NormalizedBatch,
        snapshots: &HashMap<ProductId, LifeCycleSnapshot>,
        directory: &impl LabelResolver,
    ) -> Result<Self, AggregateError> {
        let mut entries = entry_view(batch.entries())?;
        for entry in &mut entries {
            entry.status = entry
                .first_product()
                .and_then(|id| snapshots.get(&id))
                .map(|snapshot| snapshot.status);
        }
        let dispatches = dispatch_view(batch.dispatches())?;

        let reconciler = StatusReconciler::new(stage, policy);
        let incoming: Vec<ClassifiedDispatch> = incoming_to(&dispatches, &viewer)
            .into_iter()
            .map(|record| ClassifiedDispatch {
                classification: reconciler.classify(record, snapshots),
                record: record.clone(),
            })
            .collect();

        let sent = sent_by(&dispatches, &viewer).into_iter().cloned().collect();
        let sales = sales_by(&dispatches, &viewer).into_iter().cloned().collect();
        let deliveries = accepted_by(batch.acceptances(), &viewer);
        let reports = reports_by(batch.reports(), &viewer);

        let mut labels = BTreeMap::new();
        let mut label = |address: &Address| {
            if !address.is_burn() && !labels.contains_key(address) {
                labels.insert(address.clone(), directory.resolve(address));
            }
        };
        label(&viewer);
        for entry in &entries {
            label(&entry.importer);
            label(&entry.customs);
        }
        for record in &dispatches {
            label(record.from());
            label(record.to());
        }
        for report in &reports {
            label(&report.report_for);
        }

        tracing::debug!(
            viewer = %viewer,
            stage = %stage,
            dispatches = dispatches.len(),
            incoming = incoming.len(),
            skipped = batch.skipped.len(),
            "reconciliation state rebuilt"
        );

        Ok(Self {
            viewer,
            stage,
            policy,
            entries,
            dispatches,
            incoming,
            sent,
            sales,
            deliveries,
            reports,
            labels,
            skipped: batch.skipped.clone(),
        })
    }

    pub fn pending(&self) -> impl Iterator<Item = &ClassifiedDispatch> {
        self.incoming.iter().filter(|d| d.is_pending())
    }

    pub fn completed(&self) -> impl Iterator<Item = &ClassifiedDispatch> {
        self.incoming
            .iter()
            .filter(|d| d.classification == Classification::Completed)
    }

    pub fn invalid(&self) -> impl Iterator<Item = &ClassifiedDispatch> {
        self.incoming
            .iter()
            .filter(|d| matches!(d.classification, Classification::Invalid(_)))
    }

    /// Boxes the viewer entered (customs) or imports (importer).
    pub fn own_entries(&self) -> impl Iterator<Item = &BoxEntry> {
        self.entries
            .iter()
            .filter(|e| e.customs == self.viewer || e.importer == self.viewer)
    }

    pub fn track(&self, product_id: ProductId) -> Vec<&DispatchRecord> {
        track_product(&self.dispatches, product_id)
    }

    pub fn label(&self, address: &Address) -> DisplayLabel {
        self.labels.get(address).cloned().unwrap_or_else(DisplayLabel::unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use tracechain_core::{BoxId, DispatchId};
    use tracechain_events::{DispatchKind, EntryRecord, LogPosition, MalformedEventError, NormalizedEvent};
    use tracechain_products::{OnwardPointers, ProductStatus};

    use crate::directory::{DirectoryCache, DirectoryError, RoleDirectoryEntry};

    fn addr(tail: &str) -> Address {
        Address::parse(&format!("0x{tail:0>40}")).unwrap()
    }

    fn dispatch(id: u64, start: u64, end: u64, from: Address, to: Address) -> NormalizedEvent {
        NormalizedEvent::Dispatch(
            DispatchRecord::new(
                DispatchId::new(id),
                if start == end { DispatchKind::Single } else { DispatchKind::Multi },
                ProductId::new(start),
                ProductId::new(end),
                from,
                to,
                DateTime::from_timestamp(1_700_000_000 + id as i64, 0).unwrap(),
                end - start + 1,
                None,
                LogPosition { block_number: id, log_index: 0 },
            )
            .unwrap(),
        )
    }

    fn snapshot(id: u64, owner: Address, status: ProductStatus) -> (ProductId, LifeCycleSnapshot) {
        (
            ProductId::new(id),
            LifeCycleSnapshot {
                product_id: ProductId::new(id),
                owner,
                status,
                onward: OnwardPointers::default(),
                in_transit: None,
            },
        )
    }

    fn batch() -> NormalizedBatch {
        NormalizedBatch {
            events: vec![
                dispatch(1, 1, 2, addr("c1"), addr("a1")),
                dispatch(2, 3, 3, addr("c1"), addr("a1")),
                dispatch(3, 4, 4, addr("a1"), Address::burn()),
            ],
            skipped: vec![SkippedEvent {
                kind: tracechain_events::LedgerEventKind::ProductDispatched,
                position: LogPosition { block_number: 9, log_index: 0 },
                tx_hash: "0x09".to_string(),
                error: MalformedEventError::NonPositiveQuantity { quantity: 0 },
            }],
        }
    }

    #[test]
    fn builds_the_importer_panel() {
        let snapshots: HashMap<_, _> = [
            snapshot(1, addr("c1"), ProductStatus::Dispatched(Custodian::Customs)),
            snapshot(2, addr("c1"), ProductStatus::Dispatched(Custodian::Customs)),
            snapshot(3, addr("a1"), ProductStatus::InHouse(Custodian::Importer)),
        ]
        .into_iter()
        .collect();
        let directory = DirectoryCache::from_entries([RoleDirectoryEntry::new(addr("c1"), "Port Authority", "CUSTOMS")]);

        let state = ReconciliationState::build(
            addr("a1"),
            Custodian::Importer,
            RangePolicy::Conservative,
            &batch(),
            &snapshots,
            &directory,
        )
        .unwrap();

        let pending: Vec<_> = state.pending().map(|d| d.record.dispatch_id().get()).collect();
        let completed: Vec<_> = state.completed().map(|d| d.record.dispatch_id().get()).collect();
        assert_eq!(pending, vec![1]);
        assert_eq!(completed, vec![2]);
        assert_eq!(state.sales.len(), 1);
        assert!(state.sent.is_empty());
        assert_eq!(state.skipped.len(), 1);

        assert_eq!(state.label(&addr("c1")).as_str(), "Port Authority (CUSTOMS)");
        assert!(state.label(&addr("a1")).is_unknown());
        assert!(!state.labels.contains_key(&Address::burn()));
    }

    #[test]
    fn directory_failure_degrades_labels_only() {
        let directory = DirectoryCache::failed(DirectoryError::Http("refused".to_string()));
        let state = ReconciliationState::build(
            addr("a1"),
            Custodian::Importer,
            RangePolicy::Inclusive,
            &batch(),
            &HashMap::new(),
            &directory,
        )
        .unwrap();

        assert!(state.labels.values().all(DisplayLabel::is_unknown));
        // No snapshots: every non-sale incoming dispatch is invalid.
        assert_eq!(state.invalid().count(), 2);
    }

    #[test]
    fn entries_carry_the_status_of_their_first_product() {
        let mut batch = batch();
        for id in [5, 6] {
            batch.events.push(NormalizedEvent::Entry(EntryRecord {
                product_id: ProductId::new(id),
                box_id: BoxId::new(2),
                name: "Tea".to_string(),
                description: "green".to_string(),
                category: "food".to_string(),
                country_of_origin: "LK".to_string(),
                manufacturer: "Estate".to_string(),
                price: 40,
                quantity: 2,
                imported_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                importer: addr("a1"),
                customs: addr("c1"),
                position: LogPosition { block_number: 1, log_index: id as u32 },
            }));
        }
        let snapshots: HashMap<_, _> = [
            snapshot(5, addr("a1"), ProductStatus::InHouse(Custodian::Importer)),
            snapshot(6, addr("c1"), ProductStatus::Dispatched(Custodian::Customs)),
        ]
        .into_iter()
        .collect();

        let state = ReconciliationState::build(
            addr("a1"),
            Custodian::Importer,
            RangePolicy::Conservative,
            &batch,
            &snapshots,
            &DirectoryCache::default(),
        )
        .unwrap();

        let own: Vec<_> = state.own_entries().collect();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].status, Some(ProductStatus::InHouse(Custodian::Importer)));
    }

    #[test]
    fn duplicate_dispatch_ids_fail_the_build() {
        let mut batch = batch();
        batch.events.push(dispatch(1, 7, 7, addr("c1"), addr("a1")));
        let err = ReconciliationState::build(
            addr("a1"),
            Custodian::Importer,
            RangePolicy::Conservative,
            &batch,
            &HashMap::new(),
            &DirectoryCache::default(),
        )
        .unwrap_err();
        assert_eq!(err, AggregateError::DuplicateDispatchId { dispatch_id: DispatchId::new(1) });
    }
}
