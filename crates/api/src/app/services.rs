use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tracechain_core::Address;
use tracechain_infra::{
    directory::RolesSource,
    ledger::LedgerClient,
    projections::RangePolicy,
    submitter::{PrintError, SaleSlip, SlipPrinter},
    ActionSubmitter, PanelSession, SessionError, SubmitError, TraceConfig,
};
use tracechain_products::Custodian;

pub type Submitter = ActionSubmitter<dyn LedgerClient>;
pub type Session = PanelSession<dyn LedgerClient>;

/// Writes sale slips to the log. The server has no printer attached.
#[derive(Debug, Default)]
pub struct LogSlipPrinter;

impl SlipPrinter for LogSlipPrinter {
    fn print(&self, slip: &SaleSlip) -> Result<(), PrintError> {
        tracing::info!(
            product_id = %slip.product_id,
            dispatch_id = %slip.dispatch_id,
            price = slip.price,
            seller = %slip.seller,
            "sale slip"
        );
        Ok(())
    }
}

/// Shared wiring behind every handler.
///
/// Submitters are created lazily, one per acting account, so their journals
/// and in-flight sets survive between requests. Once `max_submitters` are
/// cached, idle ones (nothing unresolved, no request holding them) are
/// evicted before a new one is added.
pub struct AppServices {
    ledger: Arc<dyn LedgerClient>,
    roles: Arc<dyn RolesSource>,
    range_policy: RangePolicy,
    confirmation_timeout: Duration,
    journal_retention: usize,
    max_submitters: usize,
    printer: Arc<dyn SlipPrinter>,
    submitters: Mutex<HashMap<Address, Arc<Submitter>>>,
}

impl AppServices {
    pub fn new(ledger: Arc<dyn LedgerClient>, roles: Arc<dyn RolesSource>, config: &TraceConfig) -> Self {
        Self {
            ledger,
            roles,
            range_policy: config.range_policy,
            confirmation_timeout: config.confirmation_timeout,
            journal_retention: config.journal_retention,
            max_submitters: config.max_submitters,
            printer: Arc::new(LogSlipPrinter),
            submitters: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_printer(mut self, printer: Arc<dyn SlipPrinter>) -> Self {
        self.printer = printer;
        self
    }

    pub fn range_policy(&self) -> RangePolicy {
        self.range_policy
    }

    /// The submitter acting as `account`.
    pub fn submitter(&self, account: &Address) -> Result<Arc<Submitter>, SubmitError> {
        let mut submitters = self
            .submitters
            .lock()
            .map_err(|_| SubmitError::Unavailable("lock poisoned".to_string()))?;

        if let Some(existing) = submitters.get(account) {
            return Ok(Arc::clone(existing));
        }
        if submitters.len() >= self.max_submitters {
            evict_idle(&mut submitters);
        }

        tracing::debug!(account = %account, "creating submitter");
        let submitter = Arc::new(
            ActionSubmitter::new(Arc::clone(&self.ledger), account.clone(), self.confirmation_timeout)
                .with_journal_retention(self.journal_retention)
                .with_printer(Arc::clone(&self.printer)),
        );
        submitters.insert(account.clone(), Arc::clone(&submitter));
        Ok(submitter)
    }

    /// Mount a fresh panel session for `viewer` at `stage`.
    pub async fn mount(&self, viewer: Address, stage: Custodian) -> Result<Session, SessionError> {
        PanelSession::mount(
            Arc::clone(&self.ledger),
            &*self.roles,
            viewer,
            stage,
            self.range_policy,
        )
        .await
    }
}

/// Drop submitters no request holds and whose journal has nothing unresolved.
fn evict_idle(submitters: &mut HashMap<Address, Arc<Submitter>>) {
    let before = submitters.len();
    submitters.retain(|_, s| Arc::strong_count(s) > 1 || !s.is_idle().unwrap_or(false));
    tracing::debug!(
        evicted = before - submitters.len(),
        kept = submitters.len(),
        "evicted idle submitters"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracechain_infra::{config::MAX_SUBMITTERS, directory::HttpRolesDirectory, ledger::InMemoryLedger};

    fn addr(tail: &str) -> Address {
        Address::parse(&format!("0x{tail:0>40}")).unwrap()
    }

    fn services(max_submitters: &str) -> AppServices {
        let config = TraceConfig::from_lookup(|key| (key == MAX_SUBMITTERS).then(|| max_submitters.to_string())).unwrap();
        let roles = HttpRolesDirectory::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        AppServices::new(Arc::new(InMemoryLedger::new()), Arc::new(roles), &config)
    }

    fn cached(services: &AppServices) -> Vec<Address> {
        let mut accounts: Vec<_> = services.submitters.lock().unwrap().keys().cloned().collect();
        accounts.sort();
        accounts
    }

    #[test]
    fn same_account_reuses_its_submitter() {
        let services = services("4");
        let first = services.submitter(&addr("a1")).unwrap();
        let again = services.submitter(&addr("a1")).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cached(&services).len(), 1);
    }

    #[test]
    fn idle_submitters_are_evicted_at_capacity() {
        let services = services("2");
        let held = services.submitter(&addr("a1")).unwrap();
        services.submitter(&addr("b1")).unwrap();

        services.submitter(&addr("c1")).unwrap();
        assert_eq!(cached(&services), vec![addr("a1"), addr("c1")]);
        assert!(Arc::ptr_eq(&held, &services.submitter(&addr("a1")).unwrap()));

        drop(held);
        services.submitter(&addr("d1")).unwrap();
        assert_eq!(cached(&services), vec![addr("d1")]);
    }
}
