//! Portfolio valuator - keeps a valued copy of every ledger current

use crate::error::Result;
use crate::feed::Quote;
use crate::finance::{value_ledger, ValuedLedger};
use crate::store::LedgerStore;
use crate::types::{AccountId, Price};
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Revalues ledgers after every publish and every trade
pub struct PortfolioValuator {
    store: Arc<dyn LedgerStore>,
    cache: RwLock<HashMap<AccountId, ValuedLedger>>,
}

impl PortfolioValuator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Value one account with `price_of` and cache the result
    pub fn revalue<F>(&self, account: &str, price_of: F) -> Result<Option<ValuedLedger>>
    where
        F: Fn(&str) -> Option<Price>,
    {
        let Some(ledger) = self.store.load_ledger(account)? else {
            self.cache.write().remove(account);
            return Ok(None);
        };
        let valued = value_ledger(&ledger, price_of);
        self.cache.write().insert(account.to_string(), valued.clone());
        Ok(Some(valued))
    }

    /// Revalue every stored account against a published batch
    pub fn on_publish(&self, quotes: &[Quote]) {
        let prices: HashMap<&str, Price> = quotes
            .iter()
            .filter_map(|q| q.price().map(|p| (q.symbol(), p)))
            .collect();

        let accounts = match self.store.accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                log::error!("Valuation skipped, cannot list accounts: {}", e);
                return;
            }
        };

        for account in &accounts {
            if let Err(e) = self.revalue(account, |symbol| prices.get(symbol).copied()) {
                log::error!("Valuation of {} failed: {}", account, e);
            }
        }
        log::debug!("Revalued {} accounts", accounts.len());
    }

    /// Most recent valuation of `account`
    pub fn cached(&self, account: &str) -> Option<ValuedLedger> {
        self.cache.read().get(account).cloned()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }
}
