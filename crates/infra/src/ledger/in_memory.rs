use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::watch;

use tracechain_core::{Address, Aggregate, BoxId, DispatchId, ProductId};
use tracechain_events::{LedgerEventKind, LogPosition, RawLedgerEvent};
use tracechain_products::{
    AcceptDelivery, DispatchProduct, LifeCycleCommand, MintProduct, Product, ProductEntry,
    ProductLifeCycle,
};

use super::r#trait::{
    DispatchItem, LedgerCall, LedgerClient, LedgerError, LifeCycleSnapshot, Receipt, ReceiptStatus,
    TxHash,
};
use crate::directory::RoleDirectoryEntry;

/// Largest box a single entry may mint.
const MAX_ENTRY_QUANTITY: u64 = 10_000;

/// 2024-01-01T00:00:00Z; block time advances one minute per block.
const GENESIS_UNIX: i64 = 1_704_067_200;

#[derive(Debug, Clone)]
struct PendingTx {
    tx_hash: TxHash,
    from: Address,
    call: LedgerCall,
}

type EmittedLogs = Vec<(LedgerEventKind, Map<String, JsonValue>)>;

#[derive(Debug)]
struct LedgerState {
    products: BTreeMap<ProductId, Product>,
    life_cycles: BTreeMap<ProductId, ProductLifeCycle>,
    dispatches: BTreeMap<DispatchId, Vec<DispatchItem>>,
    roles: BTreeMap<Address, RoleDirectoryEntry>,
    logs: Vec<RawLedgerEvent>,
    receipts: HashMap<TxHash, Receipt>,
    pending: Vec<PendingTx>,
    product_counter: u64,
    box_counter: u64,
    dispatch_counter: u64,
    tx_counter: u64,
    block_number: u64,
    clock: DateTime<Utc>,
    auto_mine: bool,
    fail_next: Option<String>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            products: BTreeMap::new(),
            life_cycles: BTreeMap::new(),
            dispatches: BTreeMap::new(),
            roles: BTreeMap::new(),
            logs: Vec::new(),
            receipts: HashMap::new(),
            pending: Vec::new(),
            product_counter: 0,
            box_counter: 0,
            dispatch_counter: 0,
            tx_counter: 0,
            block_number: 0,
            clock: DateTime::from_timestamp(GENESIS_UNIX, 0).unwrap_or_default(),
            auto_mine: true,
            fail_next: None,
        }
    }
}

/// In-memory traceability ledger.
///
/// Intended for tests/dev. Executes the contract's rules through the
/// [`ProductLifeCycle`] aggregate, mines one transaction per block, and emits the
/// same raw logs a node would (integer arguments as decimal strings).
///
/// Reverted calls leave state untouched. Confirmations can be paused to
/// simulate a slow chain: submissions then queue until
/// [`InMemoryLedger::resume_confirmations`].
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    mined: watch::Sender<u64>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        let (mined, _) = watch::channel(0);
        Self {
            state: Mutex::new(LedgerState::default()),
            mined,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Unavailable("lock poisoned".to_string()))
    }

    fn notify_mined(&self) {
        self.mined.send_modify(|n| *n += 1);
    }

    /// Register a party in `rolesData`.
    pub fn register_party(&self, entry: RoleDirectoryEntry) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        state.roles.insert(entry.address_registered.clone(), entry);
        Ok(())
    }

    /// Stop mining. Submissions are accepted but stay pending.
    pub fn pause_confirmations(&self) -> Result<(), LedgerError> {
        self.lock()?.auto_mine = false;
        Ok(())
    }

    /// Mine everything pending, in submission order, and resume mining.
    pub fn resume_confirmations(&self) -> Result<(), LedgerError> {
        {
            let mut state = self.lock()?;
            state.auto_mine = true;
            let pending = std::mem::take(&mut state.pending);
            for tx in pending {
                state.mine(tx);
            }
        }
        self.notify_mined();
        Ok(())
    }

    /// Make the next submission fail at the node, before it gets a hash.
    pub fn fail_next_submission(&self, reason: impl Into<String>) -> Result<(), LedgerError> {
        self.lock()?.fail_next = Some(reason.into());
        Ok(())
    }

    /// Number of transactions the node has accepted so far.
    pub fn submission_count(&self) -> Result<u64, LedgerError> {
        Ok(self.lock()?.tx_counter)
    }

    /// Append a log verbatim, bypassing the contract rules.
    pub fn append_raw_log(
        &self,
        kind: LedgerEventKind,
        args: Map<String, JsonValue>,
    ) -> Result<LogPosition, LedgerError> {
        let mut state = self.lock()?;
        state.block_number += 1;
        let position = LogPosition {
            block_number: state.block_number,
            log_index: 0,
        };
        let tx_hash = format!("0xraw{}", state.block_number);
        state.logs.push(RawLedgerEvent::new(kind, position, tx_hash, args));
        Ok(position)
    }
}

impl LedgerState {
    fn mine(&mut self, tx: PendingTx) {
        self.block_number += 1;
        self.clock += Duration::minutes(1);
        let at = self.clock;

        let status = match self.execute(&tx.from, &tx.call, at) {
            Ok(logs) => {
                for (idx, (kind, args)) in logs.into_iter().enumerate() {
                    let position = LogPosition {
                        block_number: self.block_number,
                        log_index: idx as u32,
                    };
                    self.logs
                        .push(RawLedgerEvent::new(kind, position, tx.tx_hash.as_str(), args));
                }
                ReceiptStatus::Success
            }
            Err(reason) => {
                tracing::debug!(tx = %tx.tx_hash, call = tx.call.name(), "transaction reverted: {reason}");
                ReceiptStatus::Reverted { reason }
            }
        };

        self.receipts.insert(
            tx.tx_hash.clone(),
            Receipt {
                tx_hash: tx.tx_hash,
                block_number: self.block_number,
                status,
            },
        );
    }

    fn execute(&mut self, from: &Address, call: &LedgerCall, at: DateTime<Utc>) -> Result<EmittedLogs, String> {
        match call {
            LedgerCall::BulkProductEntry { entry, customs } => self.bulk_entry(from, entry, customs, at),
            LedgerCall::Dispatch {
                start_id,
                end_id,
                to,
                memo,
            } => self.dispatch(from, *start_id, *end_id, to, memo.as_deref(), at),
            LedgerCall::ConfirmDelivery { dispatch_id } => self.confirm_delivery(from, *dispatch_id, at),
            LedgerCall::ReportProduct {
                product_id,
                description,
                report_for,
                proof_hash,
            } => self.report(from, *product_id, description, report_for, proof_hash, at),
            LedgerCall::UpdatePrice { box_id, price } => self.update_price(from, *box_id, *price),
        }
    }

    fn bulk_entry(
        &mut self,
        from: &Address,
        entry: &ProductEntry,
        customs: &Address,
        at: DateTime<Utc>,
    ) -> Result<EmittedLogs, String> {
        entry.validate().map_err(|e| e.to_string())?;
        if from != customs {
            return Err("caller is not the customs officer of this entry".to_string());
        }
        if entry.quantity > MAX_ENTRY_QUANTITY {
            return Err(format!("quantity exceeds the per-entry limit of {MAX_ENTRY_QUANTITY}"));
        }

        let box_id = BoxId::new(self.box_counter + 1);
        let first = self.product_counter + 1;
        let last = self.product_counter + entry.quantity;

        let mut minted = Vec::with_capacity(entry.quantity as usize);
        let mut logs = Vec::with_capacity(entry.quantity as usize);
        for raw_id in first..=last {
            let product_id = ProductId::new(raw_id);
            let product = Product::from_entry(product_id, box_id, entry, customs.clone(), at);

            let mut life_cycle = ProductLifeCycle::empty(product_id);
            life_cycle
                .execute(&LifeCycleCommand::Mint(MintProduct {
                    product_id,
                    customs: customs.clone(),
                    at,
                }))
                .map_err(|e| e.to_string())?;

            logs.push((LedgerEventKind::ProductAdded, product_added_args(&product)));
            minted.push((product, life_cycle));
        }

        self.box_counter = box_id.get();
        self.product_counter = last;
        for (product, life_cycle) in minted {
            self.life_cycles.insert(product.product_id, life_cycle);
            self.products.insert(product.product_id, product);
        }
        Ok(logs)
    }

    fn dispatch(
        &mut self,
        from: &Address,
        start_id: ProductId,
        end_id: ProductId,
        to: &Address,
        memo: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<EmittedLogs, String> {
        if start_id > end_id {
            return Err(format!("invalid range {start_id}..={end_id}"));
        }

        let dispatch_id = DispatchId::new(self.dispatch_counter + 1);
        let mut updated = Vec::new();
        for raw_id in start_id.get()..=end_id.get() {
            let product_id = ProductId::new(raw_id);
            let mut life_cycle = self
                .life_cycles
                .get(&product_id)
                .cloned()
                .ok_or_else(|| format!("product {product_id} does not exist"))?;
            life_cycle
                .execute(&LifeCycleCommand::Dispatch(DispatchProduct {
                    product_id,
                    dispatch_id,
                    from: from.clone(),
                    to: to.clone(),
                    at,
                }))
                .map_err(|e| e.to_string())?;
            updated.push(life_cycle);
        }

        let item = DispatchItem {
            dispatch_id,
            start_id,
            end_id,
            from: from.clone(),
            to: to.clone(),
            quantity: end_id.get() - start_id.get() + 1,
            memo: memo.map(str::to_string),
            dispatched_at: at,
        };

        self.dispatch_counter = dispatch_id.get();
        for life_cycle in updated {
            self.life_cycles.insert(life_cycle.product_id(), life_cycle);
        }
        let log = dispatch_log(&item);
        self.dispatches.insert(dispatch_id, vec![item]);
        Ok(vec![log])
    }

    fn confirm_delivery(
        &mut self,
        from: &Address,
        dispatch_id: DispatchId,
        at: DateTime<Utc>,
    ) -> Result<EmittedLogs, String> {
        let item = self
            .dispatches
            .get(&dispatch_id)
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| format!("dispatch {dispatch_id} does not exist"))?;

        let mut updated = Vec::new();
        for raw_id in item.start_id.get()..=item.end_id.get() {
            let product_id = ProductId::new(raw_id);
            let mut life_cycle = self
                .life_cycles
                .get(&product_id)
                .cloned()
                .ok_or_else(|| format!("product {product_id} does not exist"))?;
            life_cycle
                .execute(&LifeCycleCommand::Accept(AcceptDelivery {
                    product_id,
                    dispatch_id,
                    by: from.clone(),
                    at,
                }))
                .map_err(|e| e.to_string())?;
            updated.push(life_cycle);
        }

        let status_code = updated.first().map(|lc| lc.status().code()).unwrap_or_default();
        for life_cycle in updated {
            self.life_cycles.insert(life_cycle.product_id(), life_cycle);
        }

        let mut args = Map::new();
        args.insert("dispatchId".into(), json!(dispatch_id.get().to_string()));
        args.insert("productId".into(), json!(item.start_id.get().to_string()));
        args.insert("acceptedBy".into(), json!(from.as_str()));
        args.insert("acceptedOn".into(), json!(at.timestamp().to_string()));
        args.insert("status".into(), json!(status_code.to_string()));
        Ok(vec![(LedgerEventKind::ProductAccepted, args)])
    }

    fn report(
        &mut self,
        from: &Address,
        product_id: ProductId,
        description: &str,
        report_for: &Address,
        proof_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<EmittedLogs, String> {
        if !self.products.contains_key(&product_id) {
            return Err(format!("product {product_id} does not exist"));
        }
        if description.trim().is_empty() {
            return Err("report description cannot be empty".to_string());
        }

        let mut args = Map::new();
        args.insert("productID".into(), json!(product_id.get().to_string()));
        args.insert("reportDesc".into(), json!(description));
        args.insert("reportBy".into(), json!(from.as_str()));
        args.insert("reportFor".into(), json!(report_for.as_str()));
        args.insert("reportedOn".into(), json!(at.timestamp().to_string()));
        args.insert("ipfsProofHash".into(), json!(proof_hash));
        Ok(vec![(LedgerEventKind::ReportForProduct, args)])
    }

    fn update_price(&mut self, from: &Address, box_id: BoxId, price: u64) -> Result<EmittedLogs, String> {
        if price == 0 {
            return Err("price must be positive".to_string());
        }
        let in_box: Vec<ProductId> = self
            .products
            .values()
            .filter(|p| p.box_id == box_id)
            .map(|p| p.product_id)
            .collect();
        let Some(first) = in_box.first().and_then(|id| self.products.get(id)) else {
            return Err(format!("box {box_id} does not exist"));
        };
        if &first.importer != from {
            return Err("only the importer of a box may update its price".to_string());
        }

        for id in in_box {
            if let Some(product) = self.products.get_mut(&id) {
                product.price = price;
            }
        }
        Ok(Vec::new())
    }
}

fn product_added_args(p: &Product) -> Map<String, JsonValue> {
    let mut args = Map::new();
    args.insert("id".into(), json!(p.product_id.get().to_string()));
    args.insert("boxId".into(), json!(p.box_id.get().to_string()));
    args.insert("name".into(), json!(p.name));
    args.insert("description".into(), json!(p.description));
    args.insert("category".into(), json!(p.category));
    args.insert("countryOfOrigin".into(), json!(p.country_of_origin));
    args.insert("manufacturer".into(), json!(p.manufacturer));
    args.insert("price".into(), json!(p.price.to_string()));
    args.insert("quantity".into(), json!(p.quantity.to_string()));
    args.insert("importedDate".into(), json!(p.imported_at.timestamp().to_string()));
    args.insert("importerAddr".into(), json!(p.importer.as_str()));
    args.insert("customsAddr".into(), json!(p.customs.as_str()));
    args
}

fn dispatch_log(item: &DispatchItem) -> (LedgerEventKind, Map<String, JsonValue>) {
    let mut args = Map::new();
    args.insert("dispatchId".into(), json!(item.dispatch_id.get().to_string()));
    let kind = if item.start_id == item.end_id {
        args.insert("productId".into(), json!(item.start_id.get().to_string()));
        LedgerEventKind::ProductDispatched
    } else {
        args.insert("startId".into(), json!(item.start_id.get().to_string()));
        args.insert("endId".into(), json!(item.end_id.get().to_string()));
        LedgerEventKind::MultiProductDispatched
    };
    args.insert("from".into(), json!(item.from.as_str()));
    args.insert("to".into(), json!(item.to.as_str()));
    args.insert("dispatchedOn".into(), json!(item.dispatched_at.timestamp().to_string()));
    args.insert("quantity".into(), json!(item.quantity.to_string()));
    args.insert("ipfsDocHash".into(), json!(item.memo.clone().unwrap_or_default()));
    (kind, args)
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn product_life_cycle(&self, id: ProductId) -> Result<Option<LifeCycleSnapshot>, LedgerError> {
        Ok(self.lock()?.life_cycles.get(&id).map(LifeCycleSnapshot::from))
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, LedgerError> {
        Ok(self.lock()?.products.get(&id).cloned())
    }

    async fn product_counter(&self) -> Result<u64, LedgerError> {
        Ok(self.lock()?.product_counter)
    }

    async fn dispatch_length(&self, dispatch_id: DispatchId) -> Result<u64, LedgerError> {
        Ok(self
            .lock()?
            .dispatches
            .get(&dispatch_id)
            .map(|items| items.len() as u64)
            .unwrap_or(0))
    }

    async fn dispatch_item(&self, dispatch_id: DispatchId, index: u64) -> Result<Option<DispatchItem>, LedgerError> {
        let state = self.lock()?;
        let item = usize::try_from(index)
            .ok()
            .and_then(|i| state.dispatches.get(&dispatch_id).and_then(|items| items.get(i)))
            .cloned();
        Ok(item)
    }

    async fn roles_data(&self, address: &Address) -> Result<Option<RoleDirectoryEntry>, LedgerError> {
        Ok(self.lock()?.roles.get(address).cloned())
    }

    async fn others_party(&self) -> Result<Vec<Address>, LedgerError> {
        Ok(self
            .lock()?
            .roles
            .values()
            .filter(|e| !e.has_role("ADMIN"))
            .map(|e| e.address_registered.clone())
            .collect())
    }

    async fn query_events(&self, kind: LedgerEventKind) -> Result<Vec<RawLedgerEvent>, LedgerError> {
        Ok(self
            .lock()?
            .logs
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect())
    }

    async fn submit(&self, from: &Address, call: LedgerCall) -> Result<TxHash, LedgerError> {
        let (tx_hash, mined) = {
            let mut state = self.lock()?;
            if let Some(reason) = state.fail_next.take() {
                return Err(LedgerError::Unavailable(reason));
            }

            state.tx_counter += 1;
            let tx_hash = TxHash::new(format!("0x{:064x}", state.tx_counter));
            let tx = PendingTx {
                tx_hash: tx_hash.clone(),
                from: from.clone(),
                call,
            };

            if state.auto_mine {
                state.mine(tx);
                (tx_hash, true)
            } else {
                state.pending.push(tx);
                (tx_hash, false)
            }
        };

        if mined {
            self.notify_mined();
        }
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<Receipt, LedgerError> {
        let mut mined = self.mined.subscribe();
        loop {
            {
                let state = self.lock()?;
                if let Some(receipt) = state.receipts.get(tx) {
                    return Ok(receipt.clone());
                }
                if !state.pending.iter().any(|p| &p.tx_hash == tx) {
                    return Err(LedgerError::UnknownTransaction(tx.clone()));
                }
            }
            mined
                .changed()
                .await
                .map_err(|_| LedgerError::Unavailable("ledger shut down".to_string()))?;
        }
    }
}
