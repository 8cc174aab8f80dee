use tracechain_core::Address;

/// The wallet account a request acts as.
///
/// Present on every panel and action route. Reads are filtered by it and
/// writes are signed as it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    account: Address,
}

impl AccountContext {
    pub fn new(account: Address) -> Self {
        Self { account }
    }

    pub fn account(&self) -> &Address {
        &self.account
    }
}
