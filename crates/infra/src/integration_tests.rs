//! Integration tests for the full dashboard pipeline.
//!
//! Tests: Action → Ledger → raw logs → Normalizer → Aggregator → Reconciler → panel state
//!
//! Verifies:
//! - Confirmed actions show up in every affected panel after refresh
//! - Pending classification follows custody, not just events
//! - Bad logs and a dead directory degrade the panel instead of breaking it

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Map};

    use tracechain_core::{Address, ProductId};
    use tracechain_events::{LedgerEventKind, MalformedEventError};
    use tracechain_products::{Custodian, ProductEntry, ProductStatus};

    use crate::directory::{DirectoryError, RoleDirectoryEntry, RolesSource};
    use crate::ledger::{InMemoryLedger, LedgerClient};
    use crate::projections::{Classification, InvalidReason, RangePolicy};
    use crate::session::PanelSession;
    use crate::submitter::{ActionSubmitter, Outcome, SubmitError};

    fn addr(tail: &str) -> Address {
        Address::parse(&format!("0x{tail:0>40}")).unwrap()
    }

    fn customs() -> Address {
        addr("c05")
    }

    fn importer() -> Address {
        addr("abc")
    }

    fn distributor() -> Address {
        addr("d15")
    }

    struct Directory;

    #[async_trait]
    impl RolesSource for Directory {
        async fn fetch_roles(&self) -> Result<Vec<RoleDirectoryEntry>, DirectoryError> {
            Ok(vec![
                RoleDirectoryEntry::new(customs(), "Harbour Customs", "CUSTOMS"),
                RoleDirectoryEntry::new(importer(), "Acme Imports", "IMPORTER"),
                RoleDirectoryEntry::new(distributor(), "Delta Distribution", "DISTRIBUTOR"),
            ])
        }
    }

    struct DeadDirectory;

    #[async_trait]
    impl RolesSource for DeadDirectory {
        async fn fetch_roles(&self) -> Result<Vec<RoleDirectoryEntry>, DirectoryError> {
            Err(DirectoryError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        }
    }

    fn entry(quantity: u64) -> ProductEntry {
        ProductEntry {
            name: "Espresso beans".to_string(),
            description: "Single origin".to_string(),
            category: "Food".to_string(),
            country_of_origin: "ET".to_string(),
            manufacturer: "Sidamo Coop".to_string(),
            price: 1_200,
            quantity,
            importer: importer(),
        }
    }

    fn submitter(ledger: &Arc<InMemoryLedger>, account: Address) -> ActionSubmitter<InMemoryLedger> {
        ActionSubmitter::new(Arc::clone(ledger), account, Duration::from_secs(30))
    }

    async fn importer_panel(ledger: &Arc<InMemoryLedger>, policy: RangePolicy) -> PanelSession<InMemoryLedger> {
        PanelSession::mount(Arc::clone(ledger), &Directory, importer(), Custodian::Importer, policy)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn entry_of_n_products_lands_in_one_box() {
        let ledger = Arc::new(InMemoryLedger::new());
        let entered = submitter(&ledger, customs()).enter_product(entry(7)).await.unwrap();

        let panel = PanelSession::mount(Arc::clone(&ledger), &Directory, customs(), Custodian::Customs, RangePolicy::default())
            .await
            .unwrap();
        let boxes: Vec<_> = panel.state().own_entries().collect();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].box_id, entered.value.box_id);
        assert_eq!(boxes[0].product_ids, (1..=7).map(ProductId::new).collect::<Vec<_>>());
        assert_eq!(boxes[0].status, Some(ProductStatus::InHouse(Custodian::Customs)));
    }

    #[tokio::test]
    async fn box_status_follows_its_first_product() {
        let ledger = Arc::new(InMemoryLedger::new());
        let customs_side = submitter(&ledger, customs());
        customs_side.enter_product(entry(3)).await.unwrap();
        customs_side
            .dispatch(ProductId::new(1), ProductId::new(3), importer(), None)
            .await
            .unwrap();

        let panel = importer_panel(&ledger, RangePolicy::Conservative).await;
        let boxes: Vec<_> = panel.state().own_entries().collect();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].status, Some(ProductStatus::Dispatched(Custodian::Customs)));
    }

    #[tokio::test]
    async fn dispatch_then_confirm_moves_custody_one_stage() {
        let ledger = Arc::new(InMemoryLedger::new());
        let customs_side = submitter(&ledger, customs());
        customs_side.enter_product(entry(14)).await.unwrap();
        let dispatched = customs_side
            .dispatch(ProductId::new(10), ProductId::new(14), importer(), Some("QmBillOfLading".to_string()))
            .await
            .unwrap();
        let dispatch_id = dispatched.value.dispatch_id();

        let mut panel = importer_panel(&ledger, RangePolicy::Conservative).await;
        let pending: Vec<_> = panel.state().pending().map(|d| d.record.dispatch_id()).collect();
        assert_eq!(pending, vec![dispatch_id]);
        assert_eq!(panel.state().label(&customs()).as_str(), "Harbour Customs (CUSTOMS)");

        let outcome = submitter(&ledger, importer()).confirm_delivery(dispatch_id).await;
        panel.settle(&outcome).await.unwrap();
        outcome.unwrap();

        for id in 10..=14 {
            let lc = ledger.product_life_cycle(ProductId::new(id)).await.unwrap().unwrap();
            assert_eq!(lc.owner, importer());
            assert_eq!(lc.status, ProductStatus::InHouse(Custodian::Importer));
        }
        let state = panel.state();
        assert_eq!(state.pending().count(), 0);
        assert_eq!(state.completed().map(|d| d.record.dispatch_id()).collect::<Vec<_>>(), vec![dispatch_id]);
        assert_eq!(state.deliveries.len(), 1);
        assert_eq!(state.deliveries[0].product_id, ProductId::new(10));

        let delivered = panel.delivered_products().await.unwrap();
        assert_eq!(delivered.len(), 5);
        assert!(delivered.iter().all(|p| p.owner == importer()));
    }

    #[tokio::test]
    async fn sold_products_are_never_pending() {
        let ledger = Arc::new(InMemoryLedger::new());
        let customs_side = submitter(&ledger, customs());
        customs_side.enter_product(entry(2)).await.unwrap();
        let shipped = customs_side
            .dispatch(ProductId::new(1), ProductId::new(2), importer(), None)
            .await
            .unwrap();
        let importer_side = submitter(&ledger, importer());
        importer_side.confirm_delivery(shipped.value.dispatch_id()).await.unwrap();

        let sale = importer_side.sell(ProductId::new(2), 1_500).await.unwrap();
        assert_eq!(sale.value.slip.name, "Espresso beans");

        let lc = ledger.product_life_cycle(ProductId::new(2)).await.unwrap().unwrap();
        assert_eq!(lc.status, ProductStatus::Sold);
        assert!(lc.owner.is_burn());

        let panel = importer_panel(&ledger, RangePolicy::Inclusive).await;
        assert_eq!(panel.state().pending().count(), 0);
        assert_eq!(panel.state().sales.len(), 1);
        assert_eq!(panel.state().sales[0].memo(), Some("1500"));
        assert!(panel.state().sent.is_empty());
    }

    #[tokio::test]
    async fn report_by_non_owner_is_refused_before_submission() {
        let ledger = Arc::new(InMemoryLedger::new());
        submitter(&ledger, customs()).enter_product(entry(1)).await.unwrap();
        let submitted = ledger.submission_count().unwrap();

        let err = submitter(&ledger, distributor())
            .report_product(ProductId::new(1), "seal broken".to_string(), customs(), "QmPhoto".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Precondition(_)));
        assert_eq!(ledger.submission_count().unwrap(), submitted);

        // The owner may.
        submitter(&ledger, customs())
            .report_product(ProductId::new(1), "seal broken".to_string(), importer(), "QmPhoto".to_string())
            .await
            .unwrap();
        let panel = PanelSession::mount(Arc::clone(&ledger), &Directory, customs(), Custodian::Customs, RangePolicy::default())
            .await
            .unwrap();
        assert_eq!(panel.state().reports.len(), 1);
        assert_eq!(panel.state().reports[0].proof_hash.as_deref(), Some("QmPhoto"));
    }

    #[tokio::test]
    async fn dead_directory_degrades_labels_only() {
        let ledger = Arc::new(InMemoryLedger::new());
        let customs_side = submitter(&ledger, customs());
        customs_side.enter_product(entry(1)).await.unwrap();
        customs_side
            .dispatch(ProductId::new(1), ProductId::new(1), importer(), None)
            .await
            .unwrap();

        let panel = PanelSession::mount(Arc::clone(&ledger), &DeadDirectory, importer(), Custodian::Importer, RangePolicy::default())
            .await
            .unwrap();
        assert!(panel.directory().load_error().is_some());
        assert!(panel.state().label(&customs()).is_unknown());
        assert_eq!(panel.state().label(&customs()).as_str(), "Unknown Role");
        assert_eq!(panel.state().pending().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_confirmation_blocks_resubmission_until_retried() {
        let ledger = Arc::new(InMemoryLedger::new());
        let customs_side = submitter(&ledger, customs());
        customs_side.enter_product(entry(3)).await.unwrap();
        let dispatch_id = customs_side
            .dispatch(ProductId::new(1), ProductId::new(3), importer(), None)
            .await
            .unwrap()
            .value
            .dispatch_id();

        let importer_side = submitter(&ledger, importer());
        ledger.pause_confirmations().unwrap();
        let err = importer_side.confirm_delivery(dispatch_id).await.unwrap_err();
        let key = match err {
            SubmitError::TimedOut { key, .. } => key,
            other => panic!("expected a timeout, got {other:?}"),
        };

        let blocked = importer_side.confirm_delivery(dispatch_id).await.unwrap_err();
        assert_eq!(blocked, SubmitError::InFlight { dispatch_id, key: Some(key) });
        assert_eq!(blocked.key(), Some(key));

        ledger.resume_confirmations().unwrap();
        let accepted = importer_side.retry(key).await.unwrap();
        assert!(matches!(accepted.value, Outcome::Accepted(_)));
        assert_eq!(ledger.submission_count().unwrap(), 3);

        let panel = importer_panel(&ledger, RangePolicy::Conservative).await;
        assert_eq!(panel.state().pending().count(), 0);
    }

    #[tokio::test]
    async fn malformed_logs_are_skipped_not_fatal() {
        let ledger = Arc::new(InMemoryLedger::new());
        let customs_side = submitter(&ledger, customs());
        customs_side.enter_product(entry(1)).await.unwrap();
        customs_side
            .dispatch(ProductId::new(1), ProductId::new(1), importer(), None)
            .await
            .unwrap();

        let mut zero_quantity = Map::new();
        zero_quantity.insert("dispatchId".into(), json!("40"));
        zero_quantity.insert("productId".into(), json!("1"));
        zero_quantity.insert("from".into(), json!(customs().as_str()));
        zero_quantity.insert("to".into(), json!(importer().as_str()));
        zero_quantity.insert("dispatchedOn".into(), json!("1704067200"));
        zero_quantity.insert("quantity".into(), json!("0"));
        ledger
            .append_raw_log(LedgerEventKind::ProductDispatched, zero_quantity)
            .unwrap();

        let mut bad_address = Map::new();
        bad_address.insert("dispatchId".into(), json!("41"));
        bad_address.insert("productId".into(), json!("1"));
        bad_address.insert("acceptedBy".into(), json!("0xnot-an-address"));
        bad_address.insert("acceptedOn".into(), json!("1704067200"));
        bad_address.insert("status".into(), json!("2"));
        ledger
            .append_raw_log(LedgerEventKind::ProductAccepted, bad_address)
            .unwrap();

        let panel = importer_panel(&ledger, RangePolicy::Conservative).await;
        let state = panel.state();
        assert_eq!(state.skipped.len(), 2);
        assert!(state
            .skipped
            .iter()
            .any(|s| s.error == MalformedEventError::NonPositiveQuantity { quantity: 0 }));
        assert_eq!(state.dispatches.len(), 1);
        assert_eq!(state.pending().count(), 1);
    }

    #[tokio::test]
    async fn range_disagreement_follows_the_configured_policy() {
        let ledger = Arc::new(InMemoryLedger::new());
        let customs_side = submitter(&ledger, customs());
        customs_side.enter_product(entry(2)).await.unwrap();

        // Product 2 goes elsewhere and is accepted there.
        let elsewhere = customs_side
            .dispatch(ProductId::new(2), ProductId::new(2), distributor(), None)
            .await
            .unwrap();
        submitter(&ledger, distributor())
            .confirm_delivery(elsewhere.value.dispatch_id())
            .await
            .unwrap();

        // A log claiming 1..=2 went to the importer: only product 1 still agrees.
        let mut args = Map::new();
        args.insert("dispatchId".into(), json!("9"));
        args.insert("startId".into(), json!("1"));
        args.insert("endId".into(), json!("2"));
        args.insert("from".into(), json!(customs().as_str()));
        args.insert("to".into(), json!(importer().as_str()));
        args.insert("dispatchedOn".into(), json!("1704070000"));
        args.insert("quantity".into(), json!("2"));
        ledger
            .append_raw_log(LedgerEventKind::MultiProductDispatched, args)
            .unwrap();

        let conservative = importer_panel(&ledger, RangePolicy::Conservative).await;
        let row = &conservative.state().incoming[0];
        assert_eq!(
            row.classification,
            Classification::Invalid(InvalidReason::RangeDisagreement {
                start_pending: true,
                end_pending: false
            })
        );

        let inclusive = importer_panel(&ledger, RangePolicy::Inclusive).await;
        assert_eq!(inclusive.state().incoming[0].classification, Classification::Pending);
    }
}
