//! One panel session: a viewer, its stage, and the state it sees.
//!
//! The directory is loaded once at mount. The reconciliation state is rebuilt
//! from a full event read on every refresh and after every confirmed action.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use tracechain_core::{Address, BoxId, DispatchId, ProductId};
use tracechain_events::{normalize_batch, LedgerEventKind, NormalizedBatch};
use tracechain_products::{Custodian, Product, ProductStatus};

use crate::directory::{DirectoryCache, RoleDirectoryEntry, RolesSource};
use crate::ledger::{LedgerClient, LedgerError, LifeCycleSnapshot};
use crate::projections::{AggregateError, RangePolicy, ReconciliationState};
use crate::submitter::{Confirmed, SubmitError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// A product the viewer accepted, with where it is now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveredProduct {
    pub product: Product,
    pub dispatch_id: DispatchId,
    pub accepted_at: DateTime<Utc>,
    pub owner: Address,
    pub status: ProductStatus,
}

pub struct PanelSession<L: ?Sized> {
    ledger: Arc<L>,
    viewer: Address,
    stage: Custodian,
    policy: RangePolicy,
    directory: DirectoryCache,
    state: ReconciliationState,
}

impl<L> PanelSession<L>
where
    L: LedgerClient + ?Sized,
{
    pub async fn mount<S>(
        ledger: Arc<L>,
        roles: &S,
        viewer: Address,
        stage: Custodian,
        policy: RangePolicy,
    ) -> Result<Self, SessionError>
    where
        S: RolesSource + ?Sized,
    {
        let directory = DirectoryCache::load(roles).await;
        let state = rebuild(&*ledger, &viewer, stage, policy, &directory).await?;
        tracing::info!(viewer = %viewer, stage = %stage, "panel session mounted");

        Ok(Self {
            ledger,
            viewer,
            stage,
            policy,
            directory,
            state,
        })
    }

    pub fn viewer(&self) -> &Address {
        &self.viewer
    }

    pub fn stage(&self) -> Custodian {
        self.stage
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn directory(&self) -> &DirectoryCache {
        &self.directory
    }

    pub async fn refresh(&mut self) -> Result<&ReconciliationState, SessionError> {
        self.state = rebuild(&*self.ledger, &self.viewer, self.stage, self.policy, &self.directory).await?;
        Ok(&self.state)
    }

    /// Refresh after a confirmed action. Failures leave the state untouched.
    pub async fn settle<T>(&mut self, outcome: &Result<Confirmed<T>, SubmitError>) -> Result<(), SessionError> {
        if outcome.is_ok() {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Registered parties holding `role`, read from the ledger.
    pub async fn list_parties(&self, role: &str) -> Result<Vec<RoleDirectoryEntry>, SessionError> {
        self.parties_where(|entry| entry.has_role(role)).await
    }

    /// Parties of the next stage: who this panel can dispatch to.
    /// Empty for the retailer, who only sells.
    pub async fn recipients(&self) -> Result<Vec<RoleDirectoryEntry>, SessionError> {
        let Some(next) = self.stage.next() else {
            return Ok(Vec::new());
        };
        self.parties_where(|entry| entry.custodian() == Some(next)).await
    }

    async fn parties_where(
        &self,
        keep: impl Fn(&RoleDirectoryEntry) -> bool,
    ) -> Result<Vec<RoleDirectoryEntry>, SessionError> {
        let mut parties = Vec::new();
        for address in self.ledger.others_party().await? {
            match self.ledger.roles_data(&address).await? {
                Some(entry) if keep(&entry) => parties.push(entry),
                Some(_) => {}
                None => tracing::debug!(address = %address, "party has no roles data"),
            }
        }
        parties.sort_by(|a, b| a.address_registered.cmp(&b.address_registered));
        Ok(parties)
    }

    /// Every product the viewer accepted, newest delivery first.
    pub async fn delivered_products(&self) -> Result<Vec<DeliveredProduct>, SessionError> {
        let mut out = Vec::new();
        for accepted in &self.state.deliveries {
            let Some(item) = self.ledger.dispatch_item(accepted.dispatch_id, 0).await? else {
                tracing::warn!(dispatch_id = %accepted.dispatch_id, "accepted dispatch has no items");
                continue;
            };
            for raw_id in item.start_id.get()..=item.end_id.get() {
                let product_id = ProductId::new(raw_id);
                let (Some(product), Some(life_cycle)) = (
                    self.ledger.product(product_id).await?,
                    self.ledger.product_life_cycle(product_id).await?,
                ) else {
                    continue;
                };
                out.push(DeliveredProduct {
                    product,
                    dispatch_id: accepted.dispatch_id,
                    accepted_at: accepted.accepted_at,
                    owner: life_cycle.owner,
                    status: life_cycle.status,
                });
            }
        }
        Ok(out)
    }
}

async fn rebuild<L>(
    ledger: &L,
    viewer: &Address,
    stage: Custodian,
    policy: RangePolicy,
    directory: &DirectoryCache,
) -> Result<ReconciliationState, SessionError>
where
    L: LedgerClient + ?Sized,
{
    let mut raw = Vec::new();
    for kind in LedgerEventKind::ALL {
        raw.extend(ledger.query_events(kind).await?);
    }
    let batch = normalize_batch(&raw);
    let snapshots = panel_snapshots(ledger, viewer, &batch).await?;

    Ok(ReconciliationState::build(
        viewer.clone(),
        stage,
        policy,
        &batch,
        &snapshots,
        directory,
    )?)
}

/// Life-cycle snapshots of both range ends of every dispatch addressed to
/// `viewer`, plus the first product of every box the viewer entered or imports.
async fn panel_snapshots<L>(
    ledger: &L,
    viewer: &Address,
    batch: &NormalizedBatch,
) -> Result<HashMap<ProductId, LifeCycleSnapshot>, LedgerError>
where
    L: LedgerClient + ?Sized,
{
    let mut ids: BTreeSet<ProductId> = batch
        .dispatches()
        .filter(|r| r.to() == viewer && !r.is_sale())
        .flat_map(|r| [r.start_id(), r.end_id()])
        .collect();

    let mut first_of_box: BTreeMap<BoxId, ProductId> = BTreeMap::new();
    for r in batch.entries().filter(|r| &r.customs == viewer || &r.importer == viewer) {
        first_of_box
            .entry(r.box_id)
            .and_modify(|id| *id = (*id).min(r.product_id))
            .or_insert(r.product_id);
    }
    ids.extend(first_of_box.into_values());

    let mut snapshots = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(snapshot) = ledger.product_life_cycle(id).await? {
            snapshots.insert(id, snapshot);
        }
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::directory::DirectoryError;
    use crate::ledger::{InMemoryLedger, LedgerCall};

    fn addr(tail: &str) -> Address {
        Address::parse(&format!("0x{tail:0>40}")).unwrap()
    }

    struct Roles(Vec<RoleDirectoryEntry>);

    #[async_trait]
    impl RolesSource for Roles {
        async fn fetch_roles(&self) -> Result<Vec<RoleDirectoryEntry>, DirectoryError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn lists_parties_by_role_from_the_ledger() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_party(RoleDirectoryEntry::new(addr("a2"), "Beta Imports", "IMPORTER")).unwrap();
        ledger.register_party(RoleDirectoryEntry::new(addr("a1"), "Alpha Imports", "importer")).unwrap();
        ledger.register_party(RoleDirectoryEntry::new(addr("d1"), "Delta", "DISTRIBUTOR")).unwrap();
        ledger.register_party(RoleDirectoryEntry::new(addr("f1"), "Root", "ADMIN")).unwrap();

        let session = PanelSession::mount(
            Arc::clone(&ledger),
            &Roles(Vec::new()),
            addr("c1"),
            Custodian::Customs,
            RangePolicy::default(),
        )
        .await
        .unwrap();

        let importers: Vec<_> = session
            .list_parties("IMPORTER")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(importers, vec!["Alpha Imports", "Beta Imports"]);
        assert!(session.list_parties("ADMIN").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recipients_are_the_next_stage() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_party(RoleDirectoryEntry::new(addr("a1"), "Alpha Imports", "IMPORTER")).unwrap();
        ledger.register_party(RoleDirectoryEntry::new(addr("d1"), "Delta", "distributor")).unwrap();
        ledger.register_party(RoleDirectoryEntry::new(addr("e1"), "Echo Retail", "RETAILER")).unwrap();

        let roles = Roles(Vec::new());

        let importer = PanelSession::mount(Arc::clone(&ledger), &roles, addr("a1"), Custodian::Importer, RangePolicy::default())
            .await
            .unwrap();
        let names: Vec<_> = importer.recipients().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Delta"]);

        let retailer = PanelSession::mount(Arc::clone(&ledger), &roles, addr("e1"), Custodian::Retailer, RangePolicy::default())
            .await
            .unwrap();
        assert!(retailer.recipients().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_picks_up_new_events() {
        let ledger = Arc::new(InMemoryLedger::new());
        let importer = addr("a1");
        let customs = addr("c1");
        let mut session = PanelSession::mount(
            Arc::clone(&ledger),
            &Roles(vec![RoleDirectoryEntry::new(customs.clone(), "Port", "CUSTOMS")]),
            importer.clone(),
            Custodian::Importer,
            RangePolicy::Conservative,
        )
        .await
        .unwrap();
        assert!(session.state().incoming.is_empty());

        let entry = tracechain_products::ProductEntry {
            name: "Tea".to_string(),
            description: "Green".to_string(),
            category: "Food".to_string(),
            country_of_origin: "CN".to_string(),
            manufacturer: "Leaf".to_string(),
            price: 40,
            quantity: 2,
            importer: importer.clone(),
        };
        for call in [
            LedgerCall::BulkProductEntry { entry, customs: customs.clone() },
            LedgerCall::Dispatch {
                start_id: ProductId::new(1),
                end_id: ProductId::new(2),
                to: importer.clone(),
                memo: None,
            },
        ] {
            let tx = ledger.submit(&customs, call).await.unwrap();
            assert!(ledger.wait_for_receipt(&tx).await.unwrap().is_success());
        }

        let state = session.refresh().await.unwrap();
        assert_eq!(state.pending().count(), 1);
        assert_eq!(state.label(&customs).as_str(), "Port (CUSTOMS)");
        assert_eq!(state.entries.len(), 1);
    }
}
